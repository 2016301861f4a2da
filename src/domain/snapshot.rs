//! Immutable metric snapshots handed to observers.

use serde::Serialize;

use super::status::ConnectionStatus;

/// Point-in-time view of one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointSnapshot {
    pub name: String,
    pub priority: u32,
    pub status: ConnectionStatus,
    /// Address of the live or in-flight connection, if any.
    pub address: Option<String>,
    /// Current attempt number within the active connect cycle.
    pub attempt: u32,
    /// Round-trip time of the most recent probe reply.
    pub last_latency_ms: Option<u64>,
}

/// Aggregated counters and gauges plus per-endpoint status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub connection_attempts: u64,
    pub successful_connections: u64,
    pub failed_connections: u64,
    pub reconnections: u64,
    pub heartbeat_failures: u64,
    pub fallback_activations: u64,
    /// Total time endpoints have spent open, including live connections.
    pub cumulative_uptime_ms: u64,
    pub healthy_connections: usize,
    pub total_endpoints: usize,
    pub health_percentage: f64,
    pub endpoints: Vec<EndpointSnapshot>,
}

impl MetricsSnapshot {
    /// Look up one endpoint by name.
    #[must_use]
    pub fn endpoint(&self, name: &str) -> Option<&EndpointSnapshot> {
        self.endpoints.iter().find(|e| e.name == name)
    }
}

/// Percentage of open endpoints, rounded to one decimal place.
#[must_use]
pub fn health_percentage(healthy: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = healthy as f64 / total as f64 * 100.0;
    (pct * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_percentage_rounds_to_one_decimal() {
        assert_eq!(health_percentage(2, 3), 66.7);
        assert_eq!(health_percentage(3, 3), 100.0);
        assert_eq!(health_percentage(0, 0), 0.0);
    }
}
