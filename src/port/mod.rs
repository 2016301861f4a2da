//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! The resilience core talks to the network exclusively through
//! [`outbound::transport::Connector`] and [`outbound::transport::Transport`],
//! so the WebSocket adapter and the in-memory testkit are interchangeable.

pub mod outbound;
