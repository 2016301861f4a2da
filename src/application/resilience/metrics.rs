//! Process-wide resilience counters.
//!
//! Counters are append-only and updated atomically by the supervisors that
//! own the events they count. Observers only ever read them through a
//! [`MetricsSnapshot`](crate::domain::MetricsSnapshot).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Shared counters, one instance per manager.
#[derive(Debug, Default)]
pub struct Metrics {
    connection_attempts: AtomicU64,
    successful_connections: AtomicU64,
    failed_connections: AtomicU64,
    reconnections: AtomicU64,
    heartbeat_failures: AtomicU64,
    fallback_activations: AtomicU64,
    /// Uptime of connections that have already closed.
    closed_uptime_ms: AtomicU64,
}

/// Plain copy of the counters at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub connection_attempts: u64,
    pub successful_connections: u64,
    pub failed_connections: u64,
    pub reconnections: u64,
    pub heartbeat_failures: u64,
    pub fallback_activations: u64,
    pub closed_uptime_ms: u64,
}

impl Metrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&self) {
        self.connection_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.successful_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnection(&self) {
        self.reconnections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_heartbeat_failure(&self) {
        self.heartbeat_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback(&self) {
        self.fallback_activations.fetch_add(1, Ordering::Relaxed);
    }

    /// Accrue the lifetime of a connection that just ended.
    pub fn record_uptime(&self, span: Duration) {
        let ms = u64::try_from(span.as_millis()).unwrap_or(u64::MAX);
        self.closed_uptime_ms.fetch_add(ms, Ordering::Relaxed);
    }

    #[must_use]
    pub fn counters(&self) -> Counters {
        Counters {
            connection_attempts: self.connection_attempts.load(Ordering::Relaxed),
            successful_connections: self.successful_connections.load(Ordering::Relaxed),
            failed_connections: self.failed_connections.load(Ordering::Relaxed),
            reconnections: self.reconnections.load(Ordering::Relaxed),
            heartbeat_failures: self.heartbeat_failures.load(Ordering::Relaxed),
            fallback_activations: self.fallback_activations.load(Ordering::Relaxed),
            closed_uptime_ms: self.closed_uptime_ms.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counters_start_at_zero() {
        assert_eq!(Metrics::new().counters(), Counters::default());
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let metrics = Arc::new(Metrics::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        metrics.record_attempt();
                        metrics.record_uptime(Duration::from_millis(2));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let counters = metrics.counters();
        assert_eq!(counters.connection_attempts, 4000);
        assert_eq!(counters.closed_uptime_ms, 8000);
    }
}
