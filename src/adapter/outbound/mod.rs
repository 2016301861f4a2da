//! Outbound adapters implementing the transport port.

pub mod websocket;

pub use websocket::{WebSocketConnector, WebSocketTransport};
