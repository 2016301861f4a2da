use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Endpoint-local connection failures.
///
/// These never escape a public operation as a fault: they drive the
/// supervisor state machine and are reported through `error` events, which
/// is why the type is `Clone` and carries rendered reasons instead of
/// source errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("failed to connect to {address}: {reason}")]
    Connect { address: String, reason: String },

    #[error("connection to {address} timed out after {timeout_ms}ms")]
    ConnectTimeout { address: String, timeout_ms: u64 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("no activity for {silent_ms}ms")]
    Stale { silent_ms: u64 },

    #[error("all {attempted} fallback addresses failed")]
    FallbackExhausted { attempted: usize },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("endpoint '{name}' is already registered")]
    DuplicateEndpoint { name: String },

    #[error("unknown endpoint '{name}'")]
    UnknownEndpoint { name: String },

    #[error("endpoint '{name}' is not connected")]
    NotConnected { name: String },

    #[error("resilience manager is shut down")]
    ShutDown,

    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocket(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_failures_name_the_address() {
        let refused = ConnectionError::Connect {
            address: "ws://a".into(),
            reason: "refused".into(),
        };
        let timeout = ConnectionError::ConnectTimeout {
            address: "ws://a".into(),
            timeout_ms: 10,
        };
        assert!(refused.to_string().contains("ws://a"));
        assert!(timeout.to_string().contains("ws://a"));
    }

    #[test]
    fn caller_facing_errors_name_the_endpoint() {
        let err = Error::UnknownEndpoint {
            name: "pulse".into(),
        };
        assert_eq!(err.to_string(), "unknown endpoint 'pulse'");

        let err = Error::NotConnected {
            name: "seams".into(),
        };
        assert_eq!(err.to_string(), "endpoint 'seams' is not connected");
    }
}
