//! Lifeline - resilient supervision of named WebSocket endpoints.
//!
//! Each registered endpoint gets its own supervisor task that connects with
//! a timeout, retries with exponential backoff, watches liveness through
//! heartbeat probes, escalates to backup addresses once retries run out and
//! falls back to a degraded state with periodic recovery when every address
//! has failed.
//!
//! # Modules
//!
//! - [`domain`] - Endpoint descriptors, lifecycle status, events and snapshots
//! - [`application::resilience`] - Backoff, heartbeat, supervisor, fallback
//!   and the [`ResilienceManager`](application::resilience::ResilienceManager)
//!   façade
//! - [`port`] - The `Connector`/`Transport` seam the core depends on
//! - [`adapter`] - WebSocket transport and the `lifeline` CLI
//! - [`infrastructure`] - TOML configuration and logging setup
//! - [`error`] - Error types for the crate
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use lifeline::adapter::outbound::WebSocketConnector;
//! use lifeline::application::resilience::ResilienceManager;
//! use lifeline::domain::EndpointConfig;
//! use lifeline::infrastructure::config::ResilienceConfig;
//!
//! # async fn demo() -> lifeline::error::Result<()> {
//! let manager = ResilienceManager::new(
//!     ResilienceConfig::default(),
//!     Arc::new(WebSocketConnector::new()),
//! )?;
//! manager.add_endpoint(EndpointConfig::new("pulse", "ws://localhost:3001"))?;
//! manager.connect_all()?;
//! manager.send("pulse", "hello").await?;
//! manager.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
