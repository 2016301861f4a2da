//! In-memory [`Connector`] and [`Transport`] for testing.
//!
//! - [`ScriptedConnector`]: per-address queue of connect outcomes
//!   (accept, refuse, hang) with a fallback default, recording every
//!   attempt with its instant.
//! - [`LinkHandle`]: external control of one accepted connection: push
//!   inbound frames, fail or end the stream, stall writes, inspect what the
//!   supervisor sent, probed and closed with.
//!
//! No real network I/O; works under paused Tokio time.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::domain::Payload;
use crate::error::Result;
use crate::port::outbound::transport::{Connector, Inbound, Transport};

/// How a scripted connect attempt resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Accept,
    Refuse,
    /// Never resolves; the supervisor's connect timeout applies.
    Hang,
}

#[derive(Default)]
struct ConnectorState {
    scripts: HashMap<String, VecDeque<Outcome>>,
    defaults: HashMap<String, Outcome>,
    attempts: Vec<(String, Instant)>,
    links: Vec<LinkHandle>,
}

/// A connector whose outcomes are scripted per address.
///
/// Cloning shares the script and the recorded attempts, so a test can keep
/// one clone while the manager owns another.
#[derive(Clone)]
pub struct ScriptedConnector {
    state: Arc<Mutex<ConnectorState>>,
    fallback: Outcome,
    auto_pong: bool,
}

impl ScriptedConnector {
    /// Accept every connection unless scripted otherwise.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ConnectorState::default())),
            fallback: Outcome::Accept,
            auto_pong: false,
        }
    }

    /// Refuse every connection unless scripted otherwise.
    pub fn refusing() -> Self {
        Self {
            fallback: Outcome::Refuse,
            ..Self::new()
        }
    }

    /// Accepted links answer every probe with a pong echoing its payload.
    pub fn with_auto_pong(mut self) -> Self {
        self.auto_pong = true;
        self
    }

    /// Queue outcomes for the next attempts to `address`.
    pub fn script(&self, address: &str, outcomes: impl IntoIterator<Item = Outcome>) {
        self.state
            .lock()
            .scripts
            .entry(address.to_owned())
            .or_default()
            .extend(outcomes);
    }

    /// Outcome for `address` once its script is exhausted.
    pub fn set_default(&self, address: &str, outcome: Outcome) {
        self.state
            .lock()
            .defaults
            .insert(address.to_owned(), outcome);
    }

    /// Every connect attempt so far, in order.
    pub fn attempts(&self) -> Vec<(String, Instant)> {
        self.state.lock().attempts.clone()
    }

    /// Attempts made to one address.
    pub fn attempts_to(&self, address: &str) -> Vec<Instant> {
        self.state
            .lock()
            .attempts
            .iter()
            .filter(|(a, _)| a == address)
            .map(|(_, at)| *at)
            .collect()
    }

    /// Handles for every accepted connection, oldest first.
    pub fn links(&self) -> Vec<LinkHandle> {
        self.state.lock().links.clone()
    }

    pub fn last_link(&self) -> Option<LinkHandle> {
        self.state.lock().links.last().cloned()
    }

    fn next_outcome(&self, address: &str) -> Outcome {
        let mut state = self.state.lock();
        state.attempts.push((address.to_owned(), Instant::now()));
        if let Some(outcome) = state.scripts.get_mut(address).and_then(VecDeque::pop_front) {
            return outcome;
        }
        state
            .defaults
            .get(address)
            .copied()
            .unwrap_or(self.fallback)
    }
}

impl Default for ScriptedConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, address: &str) -> Result<Box<dyn Transport>> {
        match self.next_outcome(address) {
            Outcome::Accept => {
                let (transport, link) = channel_link(address, self.auto_pong);
                self.state.lock().links.push(link);
                Ok(Box::new(transport))
            }
            Outcome::Refuse => Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )
            .into()),
            Outcome::Hang => std::future::pending().await,
        }
    }
}

enum Frame {
    Inbound(Inbound),
    Fail(String),
    End,
}

#[derive(Default)]
struct LinkState {
    sent: Vec<Payload>,
    probes: Vec<Vec<u8>>,
    closed_with: Option<(u16, String)>,
    fail_sends: bool,
    stall_writes: bool,
}

/// Channel-backed transport created by [`ScriptedConnector`].
pub struct ChannelTransport {
    frames: mpsc::UnboundedReceiver<Frame>,
    loopback: mpsc::UnboundedSender<Frame>,
    shared: Arc<Mutex<LinkState>>,
    auto_pong: bool,
}

/// Control handle for one [`ChannelTransport`].
#[derive(Clone)]
pub struct LinkHandle {
    address: String,
    frames: mpsc::UnboundedSender<Frame>,
    shared: Arc<Mutex<LinkState>>,
}

fn channel_link(address: &str, auto_pong: bool) -> (ChannelTransport, LinkHandle) {
    let (tx, rx) = mpsc::unbounded_channel();
    let shared = Arc::new(Mutex::new(LinkState::default()));
    (
        ChannelTransport {
            frames: rx,
            loopback: tx.clone(),
            shared: Arc::clone(&shared),
            auto_pong,
        },
        LinkHandle {
            address: address.to_owned(),
            frames: tx,
            shared,
        },
    )
}

impl LinkHandle {
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Deliver an inbound frame.
    pub fn push(&self, inbound: Inbound) {
        let _ = self.frames.send(Frame::Inbound(inbound));
    }

    pub fn push_text(&self, text: &str) {
        self.push(Inbound::Message(Payload::from(text)));
    }

    /// Peer closes with `code`.
    pub fn close(&self, code: u16, reason: &str) {
        self.push(Inbound::Closed {
            code,
            reason: reason.to_owned(),
        });
    }

    /// Next receive fails with a transport error.
    pub fn fail(&self, reason: &str) {
        let _ = self.frames.send(Frame::Fail(reason.to_owned()));
    }

    /// Stream ends without a close frame.
    pub fn end(&self) {
        let _ = self.frames.send(Frame::End);
    }

    /// Make every subsequent send fail.
    pub fn fail_sends(&self) {
        self.shared.lock().fail_sends = true;
    }

    /// Make every subsequent send and probe block forever, as a peer that
    /// stopped reading would.
    pub fn stall_writes(&self) {
        self.shared.lock().stall_writes = true;
    }

    pub fn sent(&self) -> Vec<Payload> {
        self.shared.lock().sent.clone()
    }

    pub fn probes(&self) -> Vec<Vec<u8>> {
        self.shared.lock().probes.clone()
    }

    /// Code and reason the local side closed with, if it did.
    pub fn closed_with(&self) -> Option<(u16, String)> {
        self.shared.lock().closed_with.clone()
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&mut self, payload: Payload) -> Result<()> {
        {
            let mut shared = self.shared.lock();
            if shared.fail_sends {
                return Err(
                    std::io::Error::new(std::io::ErrorKind::BrokenPipe, "broken pipe").into(),
                );
            }
            if !shared.stall_writes {
                shared.sent.push(payload);
                return Ok(());
            }
        }
        std::future::pending().await
    }

    async fn probe(&mut self, payload: Vec<u8>) -> Result<()> {
        let stalled = {
            let mut shared = self.shared.lock();
            shared.probes.push(payload.clone());
            shared.stall_writes
        };
        if stalled {
            return std::future::pending().await;
        }
        if self.auto_pong {
            let _ = self.loopback.send(Frame::Inbound(Inbound::Pong(payload)));
        }
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<Inbound>> {
        match self.frames.recv().await? {
            Frame::Inbound(inbound) => Some(Ok(inbound)),
            Frame::Fail(reason) => Some(Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                reason,
            )
            .into())),
            Frame::End => None,
        }
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<()> {
        self.shared.lock().closed_with = Some((code, reason.to_owned()));
        Ok(())
    }
}
