//! Per-endpoint connection supervisor.
//!
//! Each endpoint is owned by one supervisor task. All of its state (the live
//! transport, the pending connect, heartbeat and timers) is mutated only
//! inside that task's `select!` loop, so no two handlers for the same
//! endpoint ever run concurrently. Callers talk to it through a
//! [`SupervisorHandle`] mailbox and observe it through a `watch` channel.
//!
//! # Retry Path
//!
//! 1. A fresh start targets the primary address
//! 2. Connect failures back off per [`BackoffPolicy`] up to `max_attempts`
//! 3. The exhausted address escalates to the [`FallbackCoordinator`], which
//!    walks the remaining addresses once
//! 4. If none opens, the endpoint is degraded and retried on a fixed
//!    recovery period until something opens or the supervisor stops
//!
//! An abnormal drop of an open connection restarts the cycle immediately
//! against the address that was live.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::backoff::BackoffPolicy;
use super::fallback::FallbackCoordinator;
use super::heartbeat::{self, HeartbeatMonitor, HeartbeatSignal};
use super::metrics::Metrics;
use super::timer::Timer;
use crate::domain::{
    close_code, CloseKind, ConnectionStatus, EndpointConfig, Payload, ResilienceEvent,
};
use crate::error::{ConnectionError, Error, Result};
use crate::infrastructure::config::ResilienceConfig;
use crate::port::outbound::transport::{Connector, Inbound, Transport};

/// Bound on a graceful close handshake before the transport is dropped.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

const STALE_REASON: &str = "heartbeat stale";

type ConnectFuture =
    Pin<Box<dyn Future<Output = std::result::Result<Box<dyn Transport>, ConnectionError>> + Send>>;

/// Observable state of one supervisor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointState {
    pub status: ConnectionStatus,
    /// Address of the live or in-flight connection.
    pub address: Option<String>,
    /// Attempt number within the current connect cycle (0 once open).
    pub attempt: u32,
    /// When the live connection opened.
    pub opened_at: Option<Instant>,
    /// Round-trip time of the most recent probe reply.
    pub last_latency: Option<Duration>,
}

impl EndpointState {
    /// Time spent open so far by the live connection.
    #[must_use]
    pub fn live_uptime(&self) -> Duration {
        self.opened_at.map_or(Duration::ZERO, |at| at.elapsed())
    }
}

pub(crate) enum Command {
    Start,
    Stop {
        done: oneshot::Sender<()>,
    },
    Send {
        payload: Payload,
        reply: oneshot::Sender<Result<()>>,
    },
}

/// Dependencies shared by every supervisor of one manager.
#[derive(Clone)]
pub(crate) struct SupervisorContext {
    pub(crate) config: Arc<ResilienceConfig>,
    pub(crate) backoff: BackoffPolicy,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) metrics: Arc<Metrics>,
    pub(crate) events: broadcast::Sender<ResilienceEvent>,
    pub(crate) shutdown: watch::Receiver<bool>,
}

/// Caller side of a running supervisor.
pub struct SupervisorHandle {
    name: String,
    priority: u32,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<EndpointState>,
    task: Option<JoinHandle<()>>,
}

impl SupervisorHandle {
    /// Spawn the supervisor task for `endpoint`. It stays idle until started.
    pub(crate) fn spawn(endpoint: EndpointConfig, ctx: SupervisorContext) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(EndpointState::default());
        let name = endpoint.name.clone();
        let priority = endpoint.priority;

        let shutdown = ctx.shutdown.clone();
        let supervisor = Supervisor::new(endpoint, ctx, state_tx);
        let task = tokio::spawn(supervisor.run(commands_rx, shutdown));

        Self {
            name,
            priority,
            commands: commands_tx,
            state: state_rx,
            task: Some(task),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn priority(&self) -> u32 {
        self.priority
    }

    /// Begin connecting. No-op while connecting or open.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShutDown`] if the supervisor task has exited.
    pub fn start(&self) -> Result<()> {
        self.commands
            .send(Command::Start)
            .map_err(|_| Error::ShutDown)
    }

    /// Close normally and release every timer; waits until done.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShutDown`] if the supervisor task has exited.
    pub async fn stop(&self) -> Result<()> {
        let (done, wait) = oneshot::channel();
        self.commands
            .send(Command::Stop { done })
            .map_err(|_| Error::ShutDown)?;
        wait.await.map_err(|_| Error::ShutDown)
    }

    /// Send a payload on the live connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] unless the connection is open, the
    /// transport error if the send fails, or [`Error::ShutDown`] if the
    /// supervisor task has exited.
    pub async fn send(&self, payload: Payload) -> Result<()> {
        let (reply, wait) = oneshot::channel();
        self.commands
            .send(Command::Send { payload, reply })
            .map_err(|_| Error::ShutDown)?;
        wait.await.map_err(|_| Error::ShutDown)?
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> EndpointState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<EndpointState> {
        self.state.clone()
    }

    pub(crate) fn take_task(&mut self) -> Option<JoinHandle<()>> {
        self.task.take()
    }

    /// A handle sharing this mailbox but not owning the task.
    pub(crate) fn detached(&self) -> Self {
        Self {
            name: self.name.clone(),
            priority: self.priority,
            commands: self.commands.clone(),
            state: self.state.clone(),
            task: None,
        }
    }
}

struct Supervisor {
    endpoint: EndpointConfig,
    config: Arc<ResilienceConfig>,
    backoff: BackoffPolicy,
    connector: Arc<dyn Connector>,
    metrics: Arc<Metrics>,
    events: broadcast::Sender<ResilienceEvent>,
    state: watch::Sender<EndpointState>,

    status: ConnectionStatus,
    attempt: u32,
    /// Address the retry loop targets.
    retry_index: usize,
    /// Address of the pending or live connection.
    current: Option<usize>,
    pending: Option<ConnectFuture>,
    transport: Option<Box<dyn Transport>>,
    heartbeat: Option<HeartbeatMonitor>,
    retry: Timer,
    fallback: FallbackCoordinator,
    opened_at: Option<Instant>,
    last_latency: Option<Duration>,
}

impl Supervisor {
    fn new(
        endpoint: EndpointConfig,
        ctx: SupervisorContext,
        state: watch::Sender<EndpointState>,
    ) -> Self {
        let fallback = FallbackCoordinator::new(ctx.config.fallback.recovery_interval());
        Self {
            endpoint,
            config: ctx.config,
            backoff: ctx.backoff,
            connector: ctx.connector,
            metrics: ctx.metrics,
            events: ctx.events,
            state,
            status: ConnectionStatus::Idle,
            attempt: 0,
            retry_index: 0,
            current: None,
            pending: None,
            transport: None,
            heartbeat: None,
            retry: Timer::idle(),
            fallback,
            opened_at: None,
            last_latency: None,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        if *shutdown.borrow() {
            return;
        }

        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    let stopping = changed.is_err() || *shutdown.borrow();
                    if stopping {
                        self.stop().await;
                        break;
                    }
                }
                command = commands.recv() => match command {
                    Some(Command::Start) => self.start(),
                    Some(Command::Stop { done }) => {
                        self.stop().await;
                        let _ = done.send(());
                    }
                    Some(Command::Send { payload, reply }) => {
                        let result = self.send(payload).await;
                        let _ = reply.send(result);
                    }
                    None => {
                        self.stop().await;
                        break;
                    }
                },
                outcome = connect_outcome(&mut self.pending) => self.on_connect_outcome(outcome),
                inbound = next_inbound(&mut self.transport) => self.on_inbound(inbound),
                signal = next_heartbeat(&mut self.heartbeat) => self.on_heartbeat(signal).await,
                () = self.retry.fired() => self.launch_retry(),
                () = self.fallback.recovery_due() => self.on_recovery_due(),
            }
        }

        debug!(endpoint = %self.endpoint.name, "Supervisor stopped");
    }

    fn start(&mut self) {
        if self.status.is_active() {
            debug!(endpoint = %self.endpoint.name, status = %self.status, "Already started");
            return;
        }

        self.retry.cancel();
        self.fallback.resolve();
        self.attempt = 0;
        self.retry_index = 0;
        self.launch_retry();
    }

    /// Next attempt of the retry loop against `retry_index`.
    fn launch_retry(&mut self) {
        self.attempt = self.attempt.saturating_add(1);
        self.launch(self.retry_index);
    }

    fn launch(&mut self, index: usize) {
        let Some(address) = self.endpoint.address(index).map(str::to_owned) else {
            return;
        };

        // At most one transport per endpoint.
        self.teardown();

        info!(
            endpoint = %self.endpoint.name,
            address = %address,
            attempt = self.attempt,
            "Connecting"
        );

        self.current = Some(index);
        self.metrics.record_attempt();

        let connector = Arc::clone(&self.connector);
        let timeout = self.config.connect_timeout();
        self.pending = Some(Box::pin(async move {
            let result = tokio::time::timeout(timeout, connector.connect(&address)).await;
            match result {
                Ok(Ok(transport)) => Ok(transport),
                Ok(Err(e)) => Err(ConnectionError::Connect {
                    address,
                    reason: e.to_string(),
                }),
                Err(_) => Err(ConnectionError::ConnectTimeout {
                    address,
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                }),
            }
        }));

        self.set_status(ConnectionStatus::Connecting);
    }

    fn on_connect_outcome(
        &mut self,
        outcome: std::result::Result<Box<dyn Transport>, ConnectionError>,
    ) {
        match outcome {
            Ok(transport) => self.on_open(transport),
            Err(error) => self.on_connect_failure(error),
        }
    }

    fn on_open(&mut self, transport: Box<dyn Transport>) {
        let index = self.current.unwrap_or(self.retry_index);
        let address = self.current_address().unwrap_or_default();
        let recovered = self.fallback.is_recovering();

        self.retry.cancel();
        self.fallback.resolve();
        self.attempt = 0;
        self.retry_index = index;
        self.transport = Some(transport);
        self.opened_at = Some(Instant::now());
        self.metrics.record_success();

        let heartbeat = &self.config.heartbeat;
        if heartbeat.enabled {
            self.heartbeat = Some(HeartbeatMonitor::new(heartbeat));
        }

        if recovered {
            info!(endpoint = %self.endpoint.name, address = %address, "Recovered from degraded mode");
        } else {
            info!(endpoint = %self.endpoint.name, address = %address, "Connected");
        }

        self.set_status(ConnectionStatus::Open);
        self.emit(ResilienceEvent::Connected {
            endpoint: self.endpoint.name.clone(),
            address,
        });
    }

    fn on_connect_failure(&mut self, error: ConnectionError) {
        self.metrics.record_failure();
        warn!(
            endpoint = %self.endpoint.name,
            attempt = self.attempt,
            error = %error,
            "Connection attempt failed"
        );
        self.emit_error(error);

        if self.fallback.in_progress() {
            self.advance_fallback();
            return;
        }

        let max_attempts = self.config.reconnection.max_attempts;
        if self.attempt < max_attempts {
            let delay = self.backoff.delay(self.attempt);
            debug!(
                endpoint = %self.endpoint.name,
                attempt = self.attempt,
                delay_ms = delay.as_millis() as u64,
                "Scheduling retry"
            );
            self.retry.arm(delay);
            return;
        }

        warn!(
            endpoint = %self.endpoint.name,
            attempts = self.attempt,
            "Retries exhausted, escalating to fallback"
        );
        self.set_status(ConnectionStatus::FallbackPending);
        self.fallback.escalate(
            self.retry_index,
            self.endpoint.address_count(),
            &self.metrics,
        );
        self.advance_fallback();
    }

    /// Try the next address in the fallback plan, or degrade.
    fn advance_fallback(&mut self) {
        if let Some(index) = self.fallback.next_address() {
            self.launch(index);
            return;
        }

        let escalation = !self.fallback.is_recovering();
        let attempted = self.fallback.attempted();
        self.fallback.enter_degraded();
        self.current = None;
        self.set_status(ConnectionStatus::Degraded);

        if escalation {
            error!(
                endpoint = %self.endpoint.name,
                attempted,
                retry_in_ms = self.config.fallback.recovery_interval_ms,
                "All addresses failed, entering degraded mode"
            );
            self.emit_error(ConnectionError::FallbackExhausted { attempted });
        } else {
            warn!(endpoint = %self.endpoint.name, "Recovery attempt failed");
        }
    }

    fn on_recovery_due(&mut self) {
        // A tick during a running pass is skipped.
        if !self.fallback.is_degraded() || self.pending.is_some() {
            return;
        }
        info!(endpoint = %self.endpoint.name, "Attempting recovery from degraded mode");
        self.fallback
            .begin_recovery(self.endpoint.address_count());
        self.advance_fallback();
    }

    fn on_inbound(&mut self, inbound: Option<Result<Inbound>>) {
        match inbound {
            Some(Ok(Inbound::Message(payload))) => {
                self.touch();
                if self.intercept_probe_reply(&payload) {
                    return;
                }
                self.emit(ResilienceEvent::Message {
                    endpoint: self.endpoint.name.clone(),
                    payload,
                });
            }
            Some(Ok(Inbound::Pong(data))) => {
                self.touch();
                let latency = self
                    .heartbeat
                    .as_ref()
                    .and_then(|monitor| monitor.observe_reply(&data));
                self.record_latency(latency);
            }
            Some(Ok(Inbound::Ping)) => self.touch(),
            Some(Ok(Inbound::Closed { code, reason })) => self.on_remote_close(code, reason),
            Some(Err(e)) => self.on_transport_error(e.to_string()),
            None => self.on_dropped(close_code::ABNORMAL, "connection lost".to_string()),
        }
    }

    fn intercept_probe_reply(&mut self, payload: &Payload) -> bool {
        let (Some(monitor), Some(text)) = (self.heartbeat.as_ref(), payload.as_text()) else {
            return false;
        };
        if !heartbeat::is_probe_reply(text) {
            return false;
        }
        let latency = monitor.observe_text_reply(text);
        self.record_latency(latency);
        true
    }

    fn touch(&mut self) {
        if let Some(monitor) = self.heartbeat.as_mut() {
            monitor.record_activity();
        }
    }

    fn record_latency(&mut self, latency: Option<Duration>) {
        let Some(latency) = latency else {
            return;
        };
        debug!(
            endpoint = %self.endpoint.name,
            latency_ms = latency.as_millis() as u64,
            "Heartbeat reply"
        );
        self.last_latency = Some(latency);
        self.publish();
    }

    fn on_remote_close(&mut self, code: u16, reason: String) {
        match CloseKind::from_code(code) {
            CloseKind::Normal => {
                self.teardown();
                self.retry.cancel();
                self.current = None;
                info!(endpoint = %self.endpoint.name, code, "Connection closed normally");
                self.set_status(ConnectionStatus::Closed(CloseKind::Normal));
                self.emit(ResilienceEvent::Disconnected {
                    endpoint: self.endpoint.name.clone(),
                    code,
                    reason,
                });
            }
            CloseKind::Abnormal => self.on_dropped(code, reason),
        }
    }

    fn on_transport_error(&mut self, reason: String) {
        warn!(endpoint = %self.endpoint.name, error = %reason, "Transport error");
        self.emit_error(ConnectionError::Transport(reason.clone()));
        self.on_dropped(close_code::ABNORMAL, reason);
    }

    /// Abnormal end of a live connection: report and reconnect at once.
    fn on_dropped(&mut self, code: u16, reason: String) {
        self.teardown();
        warn!(endpoint = %self.endpoint.name, code, reason = %reason, "Connection lost");
        self.set_status(ConnectionStatus::Closed(CloseKind::Abnormal));
        self.emit(ResilienceEvent::Disconnected {
            endpoint: self.endpoint.name.clone(),
            code,
            reason,
        });
        self.reconnect();
    }

    fn reconnect(&mut self) {
        self.metrics.record_reconnection();
        self.attempt = 0;
        self.launch_retry();
    }

    async fn on_heartbeat(&mut self, signal: HeartbeatSignal) {
        match signal {
            HeartbeatSignal::Probe(payload) => {
                if !self.status.is_open() {
                    return;
                }
                let Some(transport) = self.transport.as_mut() else {
                    return;
                };
                debug!(endpoint = %self.endpoint.name, "Sending heartbeat probe");
                let limit = self.config.connect_timeout();
                if let Err(reason) = bounded_write(limit, transport.probe(payload)).await {
                    self.on_transport_error(reason);
                }
            }
            HeartbeatSignal::Stale { silent_for } => {
                let silent_ms = u64::try_from(silent_for.as_millis()).unwrap_or(u64::MAX);
                warn!(
                    endpoint = %self.endpoint.name,
                    silent_ms,
                    "Connection stale, forcing reconnect"
                );
                self.metrics.record_heartbeat_failure();
                self.emit_error(ConnectionError::Stale { silent_ms });

                if let Some(mut transport) = self.transport.take() {
                    close_transport(&mut *transport, close_code::GOING_AWAY, STALE_REASON).await;
                }
                self.on_dropped(close_code::ABNORMAL, STALE_REASON.to_string());
            }
        }
    }

    async fn send(&mut self, payload: Payload) -> Result<()> {
        let not_connected = || Error::NotConnected {
            name: self.endpoint.name.clone(),
        };
        if !self.status.is_open() {
            return Err(not_connected());
        }
        let Some(transport) = self.transport.as_mut() else {
            return Err(not_connected());
        };

        let limit = self.config.connect_timeout();
        match bounded_write(limit, transport.send(payload)).await {
            Ok(()) => Ok(()),
            Err(reason) => {
                self.on_transport_error(reason.clone());
                Err(ConnectionError::Transport(reason).into())
            }
        }
    }

    /// Close normally from any state and release every timer.
    async fn stop(&mut self) {
        self.retry.cancel();
        self.fallback.resolve();
        // Abandon any in-flight connect; its result is never observed.
        self.pending = None;
        self.heartbeat = None;
        self.attempt = 0;
        self.current = None;

        let was_open = self.transport.is_some();
        if let Some(mut transport) = self.transport.take() {
            close_transport(&mut *transport, close_code::NORMAL, "client closed").await;
        }
        self.accrue_uptime();

        let closed = ConnectionStatus::Closed(CloseKind::Normal);
        if self.status != closed {
            info!(endpoint = %self.endpoint.name, "Connection stopped");
            self.set_status(closed);
        }
        if was_open {
            self.emit(ResilienceEvent::Disconnected {
                endpoint: self.endpoint.name.clone(),
                code: close_code::NORMAL,
                reason: "client closed".to_string(),
            });
        }
    }

    /// Drop the live transport and its heartbeat, accruing uptime.
    fn teardown(&mut self) {
        self.heartbeat = None;
        self.transport = None;
        self.accrue_uptime();
    }

    fn accrue_uptime(&mut self) {
        if let Some(opened_at) = self.opened_at.take() {
            self.metrics.record_uptime(opened_at.elapsed());
        }
    }

    fn current_address(&self) -> Option<String> {
        self.current
            .and_then(|index| self.endpoint.address(index))
            .map(str::to_owned)
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        self.status = status;
        debug_assert!(
            !(status == ConnectionStatus::Degraded && self.heartbeat.is_some()),
            "degraded endpoint must not run a heartbeat"
        );
        self.publish();
    }

    fn publish(&self) {
        self.state.send_replace(EndpointState {
            status: self.status,
            address: self.current_address(),
            attempt: self.attempt,
            opened_at: self.opened_at,
            last_latency: self.last_latency,
        });
    }

    fn emit(&self, event: ResilienceEvent) {
        debug!(endpoint = %self.endpoint.name, event = event.kind(), "Emitting event");
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    fn emit_error(&self, error: ConnectionError) {
        self.emit(ResilienceEvent::Error {
            endpoint: self.endpoint.name.clone(),
            error,
        });
    }
}

async fn close_transport(transport: &mut dyn Transport, code: u16, reason: &str) {
    match tokio::time::timeout(CLOSE_TIMEOUT, transport.close(code, reason)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "Close handshake failed"),
        Err(_) => debug!("Close handshake timed out"),
    }
}

/// Run one write on the live transport, giving up after `limit`.
///
/// A peer that stops reading would otherwise park the whole supervisor.
async fn bounded_write(
    limit: Duration,
    write: impl Future<Output = Result<()>>,
) -> std::result::Result<(), String> {
    match tokio::time::timeout(limit, write).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("write timed out after {}ms", limit.as_millis())),
    }
}

async fn connect_outcome(
    pending: &mut Option<ConnectFuture>,
) -> std::result::Result<Box<dyn Transport>, ConnectionError> {
    match pending.as_mut() {
        Some(future) => {
            let outcome = future.await;
            *pending = None;
            outcome
        }
        None => std::future::pending().await,
    }
}

async fn next_inbound(transport: &mut Option<Box<dyn Transport>>) -> Option<Result<Inbound>> {
    match transport.as_mut() {
        Some(transport) => transport.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_heartbeat(heartbeat: &mut Option<HeartbeatMonitor>) -> HeartbeatSignal {
    match heartbeat.as_mut() {
        Some(monitor) => monitor.next_signal().await,
        None => std::future::pending().await,
    }
}
