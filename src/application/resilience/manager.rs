//! Resilience manager façade.
//!
//! Owns one [`SupervisorHandle`] per named endpoint, the shared counters and
//! the event broadcast. Public operations never block on an endpoint's
//! connection outcome; endpoint-local failures only ever surface as
//! events, metrics and status.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::backoff::BackoffPolicy;
use super::metrics::Metrics;
use super::supervisor::{EndpointState, SupervisorContext, SupervisorHandle};
use crate::domain::snapshot::health_percentage;
use crate::domain::{
    ConnectionStatus, EndpointConfig, EndpointSnapshot, MetricsSnapshot, Payload, ResilienceEvent,
};
use crate::error::{Error, Result};
use crate::infrastructure::config::settings::validate_endpoint;
use crate::infrastructure::config::ResilienceConfig;
use crate::port::outbound::transport::Connector;

/// Supervises a set of named endpoints.
///
/// Must be created inside a Tokio runtime. Dropping the manager signals
/// every supervisor to stop; call [`shutdown`](Self::shutdown) to wait for
/// them.
pub struct ResilienceManager {
    ctx: SupervisorContext,
    supervisors: Arc<RwLock<BTreeMap<String, SupervisorHandle>>>,
    shutdown_tx: watch::Sender<bool>,
    shutting_down: AtomicBool,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl ResilienceManager {
    /// Create a manager with no endpoints.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` fails validation.
    pub fn new(config: ResilienceConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        config.validate()?;
        let backoff = BackoffPolicy::from_config(&config.reconnection)?;

        let (events, _) = broadcast::channel(config.event_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            ctx: SupervisorContext {
                config: Arc::new(config),
                backoff,
                connector,
                metrics: Arc::new(Metrics::new()),
                events,
                shutdown: shutdown_rx,
            },
            supervisors: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
            shutting_down: AtomicBool::new(false),
            monitor: Mutex::new(None),
        })
    }

    /// Register an endpoint. It stays idle until connected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateEndpoint`] if the name is taken,
    /// [`Error::ShutDown`] after shutdown, or a configuration error for an
    /// invalid descriptor.
    pub fn add_endpoint(&self, endpoint: EndpointConfig) -> Result<()> {
        if self.is_shut_down() {
            return Err(Error::ShutDown);
        }
        validate_endpoint(&endpoint)?;

        let mut supervisors = self.supervisors.write();
        if supervisors.contains_key(&endpoint.name) {
            return Err(Error::DuplicateEndpoint {
                name: endpoint.name,
            });
        }

        info!(
            endpoint = %endpoint.name,
            address = %endpoint.url,
            backups = endpoint.backup_urls.len(),
            priority = endpoint.priority,
            "Endpoint registered"
        );
        let name = endpoint.name.clone();
        let handle = SupervisorHandle::spawn(endpoint, self.ctx.clone());
        supervisors.insert(name, handle);
        Ok(())
    }

    /// Start every endpoint in priority order without waiting on any of them,
    /// and begin emitting periodic metrics.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShutDown`] after shutdown.
    pub fn connect_all(&self) -> Result<()> {
        if self.is_shut_down() {
            return Err(Error::ShutDown);
        }

        let supervisors = self.supervisors.read();
        let mut ordered: Vec<&SupervisorHandle> = supervisors.values().collect();
        ordered.sort_by_key(|handle| handle.priority());
        for handle in ordered {
            handle.start()?;
        }
        drop(supervisors);

        self.start_monitor();
        Ok(())
    }

    /// Start one endpoint. No-op if it is already connecting or open.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownEndpoint`] or [`Error::ShutDown`].
    pub fn connect(&self, name: &str) -> Result<()> {
        if self.is_shut_down() {
            return Err(Error::ShutDown);
        }
        self.with_handle(name, SupervisorHandle::start)
    }

    /// Close one endpoint normally. It stays registered and can be
    /// reconnected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownEndpoint`] or [`Error::ShutDown`].
    pub async fn disconnect(&self, name: &str) -> Result<()> {
        let handle = self.detached(name)?;
        handle.stop().await
    }

    /// Send a payload on an endpoint's live connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownEndpoint`], [`Error::NotConnected`] unless
    /// the endpoint is open, or the transport error if the send failed.
    pub async fn send(&self, name: &str, payload: impl Into<Payload>) -> Result<()> {
        let handle = self.detached(name)?;
        handle.send(payload.into()).await
    }

    /// Current status of one endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownEndpoint`].
    pub fn status(&self, name: &str) -> Result<ConnectionStatus> {
        self.with_handle(name, |handle| Ok(handle.state().status))
    }

    /// Stream of state changes for one endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownEndpoint`].
    pub fn watch(&self, name: &str) -> Result<watch::Receiver<EndpointState>> {
        self.with_handle(name, |handle| Ok(handle.watch()))
    }

    /// Subscribe to the event stream.
    ///
    /// Events for one endpoint arrive in the order they occurred. A slow
    /// subscriber that falls more than `event_capacity` events behind
    /// observes a lag error and skips ahead.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ResilienceEvent> {
        self.ctx.events.subscribe()
    }

    /// Names of registered endpoints, in priority order.
    #[must_use]
    pub fn endpoints(&self) -> Vec<String> {
        let supervisors = self.supervisors.read();
        let mut ordered: Vec<&SupervisorHandle> = supervisors.values().collect();
        ordered.sort_by_key(|handle| handle.priority());
        ordered.into_iter().map(|h| h.name().to_owned()).collect()
    }

    /// Immutable copy of the counters and every endpoint's status.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        build_snapshot(&self.ctx.metrics, &self.supervisors.read())
    }

    /// Stop everything: suppress further retries, close every endpoint
    /// normally and wait for the supervisors to exit.
    ///
    /// Idempotent. Once this returns no further events are emitted and no
    /// counter changes.
    pub async fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            debug!("Shutdown already requested");
            return;
        }
        info!("Shutting down resilience manager");

        self.shutdown_tx.send_replace(true);

        let monitor = self.monitor.lock().take();
        if let Some(monitor) = monitor {
            monitor.abort();
            let _ = monitor.await;
        }

        let tasks: Vec<(String, JoinHandle<()>)> = self
            .supervisors
            .write()
            .values_mut()
            .filter_map(|handle| Some((handle.name().to_owned(), handle.take_task()?)))
            .collect();
        for (name, task) in tasks {
            if let Err(e) = task.await {
                warn!(endpoint = %name, error = %e, "Supervisor task failed");
            }
        }

        info!("Resilience manager stopped");
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    fn start_monitor(&self) {
        let mut monitor = self.monitor.lock();
        if monitor.is_some() {
            return;
        }

        let period = self.ctx.config.metrics_interval();
        let metrics = Arc::clone(&self.ctx.metrics);
        let events = self.ctx.events.clone();
        let supervisors = Arc::clone(&self.supervisors);

        *monitor = Some(tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            loop {
                interval.tick().await;
                let snapshot = build_snapshot(&metrics, &supervisors.read());
                debug!(
                    healthy = snapshot.healthy_connections,
                    total = snapshot.total_endpoints,
                    health_percentage = snapshot.health_percentage,
                    "Metrics"
                );
                let _ = events.send(ResilienceEvent::Metrics(snapshot));
            }
        }));
    }

    fn with_handle<T>(
        &self,
        name: &str,
        f: impl FnOnce(&SupervisorHandle) -> Result<T>,
    ) -> Result<T> {
        let supervisors = self.supervisors.read();
        let handle = supervisors.get(name).ok_or_else(|| Error::UnknownEndpoint {
            name: name.to_owned(),
        })?;
        f(handle)
    }

    /// Mailbox copy of a handle so no lock is held across `.await`.
    fn detached(&self, name: &str) -> Result<SupervisorHandle> {
        self.with_handle(name, |handle| Ok(handle.detached()))
    }
}

impl Drop for ResilienceManager {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
        if let Some(monitor) = self.monitor.get_mut().take() {
            monitor.abort();
        }
    }
}

fn build_snapshot(
    metrics: &Metrics,
    supervisors: &BTreeMap<String, SupervisorHandle>,
) -> MetricsSnapshot {
    // BTreeMap iteration is by name; the stable sort keeps that as tie-break.
    let mut states: Vec<(String, u32, EndpointState)> = supervisors
        .values()
        .map(|h| (h.name().to_owned(), h.priority(), h.state()))
        .collect();
    states.sort_by_key(|(_, priority, _)| *priority);

    let counters = metrics.counters();
    let live_uptime_ms: u64 = states
        .iter()
        .map(|(_, _, state)| state.live_uptime().as_millis() as u64)
        .sum();

    let endpoints: Vec<EndpointSnapshot> = states
        .into_iter()
        .map(|(name, priority, state)| EndpointSnapshot {
            name,
            priority,
            status: state.status,
            address: state.address,
            attempt: state.attempt,
            last_latency_ms: state.last_latency.map(|d| d.as_millis() as u64),
        })
        .collect();

    let total = endpoints.len();
    let healthy = endpoints.iter().filter(|e| e.status.is_open()).count();

    MetricsSnapshot {
        connection_attempts: counters.connection_attempts,
        successful_connections: counters.successful_connections,
        failed_connections: counters.failed_connections,
        reconnections: counters.reconnections,
        heartbeat_failures: counters.heartbeat_failures,
        fallback_activations: counters.fallback_activations,
        cumulative_uptime_ms: counters.closed_uptime_ms.saturating_add(live_uptime_ms),
        healthy_connections: healthy,
        total_endpoints: total,
        health_percentage: health_percentage(healthy, total),
        endpoints,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{self, ScriptedConnector};

    fn manager() -> ResilienceManager {
        let connector = Arc::new(ScriptedConnector::new());
        ResilienceManager::new(testkit::config::resilience(), connector).unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_endpoint_rejected() {
        let manager = manager();
        manager
            .add_endpoint(EndpointConfig::new("pulse", "ws://localhost:3001"))
            .unwrap();
        let err = manager
            .add_endpoint(EndpointConfig::new("pulse", "ws://localhost:3009"))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateEndpoint { name } if name == "pulse"));
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_endpoint_rejected() {
        let manager = manager();
        assert!(matches!(
            manager.status("nope"),
            Err(Error::UnknownEndpoint { .. })
        ));
        assert!(matches!(
            manager.connect("nope"),
            Err(Error::UnknownEndpoint { .. })
        ));
        assert!(matches!(
            manager.send("nope", "x").await,
            Err(Error::UnknownEndpoint { .. })
        ));
    }

    #[tokio::test]
    async fn test_rejects_invalid_address() {
        let manager = manager();
        let err = manager
            .add_endpoint(EndpointConfig::new("pulse", "http://localhost:3001"))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_snapshot_orders_by_priority_then_name() {
        let manager = manager();
        for (name, priority) in [("voices", 2), ("seams", 1), ("pulse", 1)] {
            manager
                .add_endpoint(EndpointConfig::new(name, "ws://localhost:3001").with_priority(priority))
                .unwrap();
        }

        let snapshot = manager.snapshot();
        let names: Vec<&str> = snapshot.endpoints.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["pulse", "seams", "voices"]);
        assert_eq!(manager.endpoints(), ["pulse", "seams", "voices"]);
        assert_eq!(snapshot.total_endpoints, 3);
        assert_eq!(snapshot.healthy_connections, 0);
        assert_eq!(snapshot.health_percentage, 0.0);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_operations_after_shutdown_fail() {
        let manager = manager();
        manager
            .add_endpoint(EndpointConfig::new("pulse", "ws://localhost:3001"))
            .unwrap();
        manager.shutdown().await;

        assert!(manager.is_shut_down());
        assert!(matches!(manager.connect_all(), Err(Error::ShutDown)));
        assert!(matches!(
            manager.add_endpoint(EndpointConfig::new("seams", "ws://localhost:3002")),
            Err(Error::ShutDown)
        ));
        assert!(matches!(
            manager.send("pulse", "x").await,
            Err(Error::ShutDown)
        ));
    }
}
