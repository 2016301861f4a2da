//! Transport port for long-lived bidirectional connections.
//!
//! A [`Connector`] opens a [`Transport`] to one address. The transport is
//! owned by exactly one supervisor and replaced on every reconnect; dropping
//! it releases the underlying connection.

use async_trait::async_trait;

use crate::domain::Payload;
use crate::error::Result;

/// A frame observed on an open transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Application data.
    Message(Payload),
    /// Reply to a liveness probe, echoing the probe payload.
    Pong(Vec<u8>),
    /// Peer-initiated ping (already answered by the adapter).
    Ping,
    /// Peer closed the connection.
    Closed { code: u16, reason: String },
}

/// An open, exclusively owned connection.
#[async_trait]
pub trait Transport: Send {
    /// Send an application payload.
    async fn send(&mut self, payload: Payload) -> Result<()>;

    /// Send a liveness probe carrying `payload`.
    async fn probe(&mut self, payload: Vec<u8>) -> Result<()>;

    /// Wait for the next inbound frame.
    ///
    /// Returns `None` when the stream ended without a close frame.
    async fn recv(&mut self) -> Option<Result<Inbound>>;

    /// Close the connection with `code` and `reason`.
    async fn close(&mut self, code: u16, reason: &str) -> Result<()>;
}

/// Opens transports to endpoint addresses.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a transport to `address`.
    ///
    /// Implementations need not enforce a deadline; the supervisor bounds
    /// every call with its connect timeout and drops the future on expiry.
    async fn connect(&self, address: &str) -> Result<Box<dyn Transport>>;
}
