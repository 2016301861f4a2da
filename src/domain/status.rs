//! Connection lifecycle status.
//!
//! # State Transitions
//! ```text
//! Idle → Connecting: start() or scheduled retry
//! Connecting → Open: transport open event
//! Connecting → Connecting: connect failure with attempts remaining
//! Connecting → FallbackPending: max attempts exhausted
//! FallbackPending → Connecting: trying a fallback address
//! FallbackPending → Degraded: every fallback address failed
//! Open → Closed(Normal): close with code 1000 or stop()
//! Open → Closed(Abnormal) → Connecting: any other close, error or stale
//! Degraded → Connecting: recovery timer fired
//! ```

use std::fmt;

use serde::Serialize;

/// WebSocket close codes the core distinguishes.
pub mod close_code {
    /// Normal closure; never retried.
    pub const NORMAL: u16 = 1000;
    /// Endpoint going away; used when remediating a stale connection.
    pub const GOING_AWAY: u16 = 1001;
    /// No close frame was received (transport error or stream ended).
    pub const ABNORMAL: u16 = 1006;
}

/// How a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseKind {
    Normal,
    Abnormal,
}

impl CloseKind {
    /// Classify a close code.
    #[must_use]
    pub const fn from_code(code: u16) -> Self {
        if code == close_code::NORMAL {
            Self::Normal
        } else {
            Self::Abnormal
        }
    }
}

/// Lifecycle status of one endpoint's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Idle,
    Connecting,
    Open,
    Closed(CloseKind),
    FallbackPending,
    Degraded,
}

impl ConnectionStatus {
    /// `start()` is a no-op in these states.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }

    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed(CloseKind::Normal) => "closed",
            Self::Closed(CloseKind::Abnormal) => "closed (abnormal)",
            Self::FallbackPending => "fallback pending",
            Self::Degraded => "degraded",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_code_1000_is_normal() {
        assert_eq!(CloseKind::from_code(1000), CloseKind::Normal);
        assert_eq!(CloseKind::from_code(1001), CloseKind::Abnormal);
        assert_eq!(CloseKind::from_code(1006), CloseKind::Abnormal);
        assert_eq!(CloseKind::from_code(4000), CloseKind::Abnormal);
    }

    #[test]
    fn active_states() {
        assert!(ConnectionStatus::Connecting.is_active());
        assert!(ConnectionStatus::Open.is_active());
        assert!(!ConnectionStatus::Degraded.is_active());
        assert!(!ConnectionStatus::Closed(CloseKind::Normal).is_active());
        assert!(!ConnectionStatus::Idle.is_active());
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&ConnectionStatus::FallbackPending).unwrap();
        assert_eq!(json, "\"fallback_pending\"");
    }
}
