//! Transport-agnostic domain types.
//!
//! Everything here is plain data: endpoint descriptors, lifecycle status,
//! inbound payloads, observer events and metric snapshots. Behavior lives in
//! [`crate::application::resilience`].

pub mod endpoint;
pub mod event;
pub mod snapshot;
pub mod status;

pub use endpoint::EndpointConfig;
pub use event::{Payload, ResilienceEvent};
pub use snapshot::{EndpointSnapshot, MetricsSnapshot};
pub use status::{close_code, CloseKind, ConnectionStatus};
