//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`connector`]: In-memory [`Connector`](crate::port::outbound::transport::Connector)
//!   with scripted outcomes and controllable links.
//! - [`config`]: Canonical test configurations (reconnection, heartbeat).

pub mod config;
pub mod connector;

pub use connector::{ChannelTransport, LinkHandle, Outcome, ScriptedConnector};
