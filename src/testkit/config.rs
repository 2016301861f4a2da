//! Canonical test configurations.
//!
//! Single source of truth for config structs used across tests.
//! Avoids each test module defining its own slightly-different defaults.

use crate::infrastructure::config::{
    FallbackConfig, HeartbeatConfig, ReconnectionConfig, ResilienceConfig,
};

/// Fast reconnection: 3 attempts, 100ms doubling to at most 1s.
pub fn reconnection() -> ReconnectionConfig {
    ReconnectionConfig {
        max_attempts: 3,
        initial_delay_ms: 100,
        backoff_multiplier: 2.0,
        max_delay_ms: 1000,
    }
}

/// Resilience settings with heartbeats off and short timeouts.
///
/// Recovery keeps the documented 60s period; under paused time it costs
/// nothing to wait for.
pub fn resilience() -> ResilienceConfig {
    ResilienceConfig {
        connect_timeout_ms: 1000,
        metrics_interval_ms: 10_000,
        event_capacity: 1024,
        reconnection: reconnection(),
        heartbeat: HeartbeatConfig {
            enabled: false,
            ..HeartbeatConfig::default()
        },
        fallback: FallbackConfig::default(),
    }
}

/// [`resilience`] with heartbeats probing every `interval_ms` and checking
/// at a quarter of that.
pub fn with_heartbeat(interval_ms: u64) -> ResilienceConfig {
    ResilienceConfig {
        heartbeat: HeartbeatConfig {
            enabled: true,
            interval_ms,
            stale_multiple: 2,
            check_interval_ms: (interval_ms / 4).max(1),
        },
        ..resilience()
    }
}
