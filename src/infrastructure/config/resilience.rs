//! Reconnection, heartbeat and fallback configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigError, Result};

/// Retry policy for the primary connect cycle.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectionConfig {
    /// Consecutive failed attempts before escalating to fallback.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay after the first failed attempt (milliseconds).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Multiplier applied to the delay after each failed attempt.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Upper bound on any single delay (milliseconds).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

const fn default_max_attempts() -> u32 {
    10
}

const fn default_initial_delay_ms() -> u64 {
    1000 // 1 second
}

const fn default_backoff_multiplier() -> f64 {
    1.5
}

const fn default_max_delay_ms() -> u64 {
    30_000 // 30 seconds
}

impl Default for ReconnectionConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Liveness probing for open connections.
#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default = "default_heartbeat_enabled")]
    pub enabled: bool,
    /// Probe interval (milliseconds).
    #[serde(default = "default_heartbeat_interval_ms")]
    pub interval_ms: u64,
    /// A connection silent for `stale_multiple × interval_ms` is stale.
    #[serde(default = "default_stale_multiple")]
    pub stale_multiple: u32,
    /// How often staleness is checked (milliseconds).
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,
}

const fn default_heartbeat_enabled() -> bool {
    true
}

const fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

const fn default_stale_multiple() -> u32 {
    2
}

const fn default_check_interval_ms() -> u64 {
    10_000
}

impl HeartbeatConfig {
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    #[must_use]
    pub const fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    /// Silence threshold after which a connection is considered stale.
    #[must_use]
    pub fn stale_after(&self) -> Duration {
        self.interval().saturating_mul(self.stale_multiple)
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: default_heartbeat_enabled(),
            interval_ms: default_heartbeat_interval_ms(),
            stale_multiple: default_stale_multiple(),
            check_interval_ms: default_check_interval_ms(),
        }
    }
}

/// Degraded-mode behavior once every address has failed.
#[derive(Debug, Clone, Deserialize)]
pub struct FallbackConfig {
    /// Fixed period between recovery passes (milliseconds).
    #[serde(default = "default_recovery_interval_ms")]
    pub recovery_interval_ms: u64,
}

const fn default_recovery_interval_ms() -> u64 {
    60_000 // 1 minute
}

impl FallbackConfig {
    #[must_use]
    pub const fn recovery_interval(&self) -> Duration {
        Duration::from_millis(self.recovery_interval_ms)
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            recovery_interval_ms: default_recovery_interval_ms(),
        }
    }
}

/// Settings shared by every supervised endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ResilienceConfig {
    /// Bound on each connect attempt, primary or backup (milliseconds).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Period of the aggregated `metrics` event (milliseconds).
    #[serde(default = "default_metrics_interval_ms")]
    pub metrics_interval_ms: u64,
    /// Capacity of the event broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    #[serde(default)]
    pub reconnection: ReconnectionConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
}

const fn default_connect_timeout_ms() -> u64 {
    10_000
}

const fn default_metrics_interval_ms() -> u64 {
    10_000
}

const fn default_event_capacity() -> usize {
    1024
}

impl ResilienceConfig {
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    #[must_use]
    pub const fn metrics_interval(&self) -> Duration {
        Duration::from_millis(self.metrics_interval_ms)
    }

    /// Validate value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let invalid = |field: &'static str, reason: &str| -> crate::error::Error {
            ConfigError::InvalidValue {
                field,
                reason: reason.to_string(),
            }
            .into()
        };

        let reconnection = &self.reconnection;
        if reconnection.max_attempts == 0 {
            return Err(invalid("reconnection.max_attempts", "must be > 0"));
        }
        if reconnection.initial_delay_ms == 0 {
            return Err(invalid("reconnection.initial_delay_ms", "must be > 0"));
        }
        if !reconnection.backoff_multiplier.is_finite() || reconnection.backoff_multiplier <= 1.0 {
            return Err(invalid(
                "reconnection.backoff_multiplier",
                "must be a finite number > 1",
            ));
        }
        if reconnection.max_delay_ms < reconnection.initial_delay_ms {
            return Err(invalid(
                "reconnection.max_delay_ms",
                "must be >= initial_delay_ms",
            ));
        }

        let heartbeat = &self.heartbeat;
        if heartbeat.interval_ms == 0 {
            return Err(invalid("heartbeat.interval_ms", "must be > 0"));
        }
        if heartbeat.stale_multiple < 2 {
            return Err(invalid("heartbeat.stale_multiple", "must be >= 2"));
        }
        if heartbeat.check_interval_ms == 0 {
            return Err(invalid("heartbeat.check_interval_ms", "must be > 0"));
        }

        if self.fallback.recovery_interval_ms == 0 {
            return Err(invalid("fallback.recovery_interval_ms", "must be > 0"));
        }
        if self.connect_timeout_ms == 0 {
            return Err(invalid("connect_timeout_ms", "must be > 0"));
        }
        if self.metrics_interval_ms == 0 {
            return Err(invalid("metrics_interval_ms", "must be > 0"));
        }
        if self.event_capacity == 0 {
            return Err(invalid("event_capacity", "must be > 0"));
        }
        Ok(())
    }
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            metrics_interval_ms: default_metrics_interval_ms(),
            event_capacity: default_event_capacity(),
            reconnection: ReconnectionConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            fallback: FallbackConfig::default(),
        }
    }
}
