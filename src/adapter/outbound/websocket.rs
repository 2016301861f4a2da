//! WebSocket transport adapter.
//!
//! Implements the [`Connector`]/[`Transport`] ports on top of
//! `tokio-tungstenite`. Connections use TLS when the address scheme is
//! `wss://`.
//!
//! # Frame Mapping
//!
//! - **Text / Binary**: surfaced as [`Inbound::Message`]
//! - **Ping**: surfaced as [`Inbound::Ping`] so the supervisor counts it as
//!   activity; tungstenite queues the echoing Pong itself and flushes it on
//!   the next read or write
//! - **Pong**: surfaced as [`Inbound::Pong`] (probe reply)
//! - **Close**: surfaced as [`Inbound::Closed`]; a missing close frame maps
//!   to code 1005 (no status received)
//! - **Raw frames**: ignored

use std::borrow::Cow;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use crate::domain::Payload;
use crate::error::Result;
use crate::port::outbound::transport::{Connector, Inbound, Transport};

/// Close code reported when the peer sent a close frame without a status.
const NO_STATUS_RECEIVED: u16 = 1005;

/// Opens WebSocket connections.
///
/// Stateless; one instance is shared by every supervisor.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, address: &str) -> Result<Box<dyn Transport>> {
        debug!(address, "Connecting to WebSocket");

        let (stream, response) = connect_async(address).await?;

        info!(address, status = %response.status(), "WebSocket connected");

        Ok(Box::new(WebSocketTransport::new(stream)))
    }
}

/// An open WebSocket connection.
pub struct WebSocketTransport<S = MaybeTlsStream<TcpStream>> {
    stream: WebSocketStream<S>,
}

impl<S> WebSocketTransport<S> {
    /// Wrap an already negotiated WebSocket stream.
    pub const fn new(stream: WebSocketStream<S>) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl<S> Transport for WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, payload: Payload) -> Result<()> {
        let message = match payload {
            Payload::Text(text) => Message::Text(text),
            Payload::Binary(bytes) => Message::Binary(bytes),
        };
        self.stream.send(message).await?;
        Ok(())
    }

    async fn probe(&mut self, payload: Vec<u8>) -> Result<()> {
        self.stream.send(Message::Ping(payload)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<Inbound>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(e.into())),
            };

            match message {
                Message::Text(text) => return Some(Ok(Inbound::Message(Payload::Text(text)))),
                Message::Binary(bytes) => {
                    return Some(Ok(Inbound::Message(Payload::Binary(bytes))))
                }
                // No await after a frame is taken; the reply Pong is queued
                // by tungstenite.
                Message::Ping(_) => return Some(Ok(Inbound::Ping)),
                Message::Pong(data) => return Some(Ok(Inbound::Pong(data))),
                Message::Close(frame) => {
                    let (code, reason) = match frame {
                        Some(frame) => (u16::from(frame.code), frame.reason.into_owned()),
                        None => (NO_STATUS_RECEIVED, String::new()),
                    };
                    return Some(Ok(Inbound::Closed { code, reason }));
                }
                Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<()> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: Cow::Owned(reason.to_owned()),
        };
        self.stream.close(Some(frame)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::DuplexStream;
    use tokio_tungstenite::tungstenite::protocol::Role;

    async fn pair() -> (WebSocketTransport<DuplexStream>, WebSocketStream<DuplexStream>) {
        let (client, server) = tokio::io::duplex(4096);
        let client = WebSocketStream::from_raw_socket(client, Role::Client, None).await;
        let server = WebSocketStream::from_raw_socket(server, Role::Server, None).await;
        (WebSocketTransport::new(client), server)
    }

    #[tokio::test]
    async fn test_ping_is_surfaced_and_answered() {
        let (mut transport, mut peer) = pair().await;

        peer.send(Message::Ping(b"beat".to_vec())).await.unwrap();
        assert!(matches!(transport.recv().await, Some(Ok(Inbound::Ping))));

        peer.send(Message::Text("after".into())).await.unwrap();
        let next = transport.recv().await;
        assert!(matches!(
            next,
            Some(Ok(Inbound::Message(Payload::Text(ref text)))) if text == "after"
        ));

        let reply = peer.next().await.unwrap().unwrap();
        assert_eq!(reply, Message::Pong(b"beat".to_vec()));
    }

    #[tokio::test]
    async fn test_pong_and_close_mapping() {
        let (mut transport, mut peer) = pair().await;

        peer.send(Message::Pong(vec![7])).await.unwrap();
        assert!(matches!(
            transport.recv().await,
            Some(Ok(Inbound::Pong(ref data))) if data == &[7]
        ));

        peer.send(Message::Close(None)).await.unwrap();
        assert!(matches!(
            transport.recv().await,
            Some(Ok(Inbound::Closed { code: NO_STATUS_RECEIVED, .. }))
        ));
    }
}
