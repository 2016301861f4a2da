//! Observer-facing events.

use crate::error::ConnectionError;

use super::snapshot::MetricsSnapshot;

/// Opaque application payload carried by a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    /// Text content, if this is a text payload.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(bytes)
    }
}

/// Events emitted by the resilience manager.
///
/// Events for one endpoint are delivered in the order they occurred; no
/// ordering holds across endpoints.
#[derive(Debug, Clone, PartialEq)]
pub enum ResilienceEvent {
    /// A transport opened (primary, backup or recovery).
    Connected { endpoint: String, address: String },
    /// A live transport ended.
    Disconnected {
        endpoint: String,
        code: u16,
        reason: String,
    },
    /// Application frame, forwarded verbatim.
    Message { endpoint: String, payload: Payload },
    /// Endpoint-local failure.
    Error {
        endpoint: String,
        error: ConnectionError,
    },
    /// Periodic aggregated metrics.
    Metrics(MetricsSnapshot),
}

impl ResilienceEvent {
    /// Endpoint the event belongs to; `None` for aggregate metrics.
    #[must_use]
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::Connected { endpoint, .. }
            | Self::Disconnected { endpoint, .. }
            | Self::Message { endpoint, .. }
            | Self::Error { endpoint, .. } => Some(endpoint),
            Self::Metrics(_) => None,
        }
    }

    /// Short name used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Disconnected { .. } => "disconnected",
            Self::Message { .. } => "message",
            Self::Error { .. } => "error",
            Self::Metrics(_) => "metrics",
        }
    }
}
