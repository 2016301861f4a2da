//! Connection resilience: backoff, heartbeats, fallback and supervision.
//!
//! [`ResilienceManager`] is the entry point. Each endpoint it manages runs
//! one supervisor task that owns the connection, its [`HeartbeatMonitor`]
//! and a [`FallbackCoordinator`]; all endpoints share one [`Metrics`].

pub mod backoff;
pub mod fallback;
pub mod heartbeat;
pub mod manager;
pub mod metrics;
pub mod supervisor;
pub mod timer;

pub use backoff::BackoffPolicy;
pub use fallback::FallbackCoordinator;
pub use heartbeat::{HeartbeatMonitor, HeartbeatSignal};
pub use manager::ResilienceManager;
pub use metrics::Metrics;
pub use supervisor::{EndpointState, SupervisorHandle};
pub use timer::Timer;
