//! Application configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all settings.
//! Configuration is loaded once from a TOML file, merged with defaults by
//! serde, then validated semantically.
//!
//! # Example
//!
//! ```no_run
//! use lifeline::infrastructure::config::settings::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("lifeline.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use super::logging::LoggingConfig;
use super::resilience::ResilienceConfig;
use crate::domain::EndpointConfig;
use crate::error::{ConfigError, Result};

/// Periodic snapshot export to disk.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    /// File the JSON snapshot is written to (overwritten each time).
    pub path: PathBuf,
    /// Export period (milliseconds).
    #[serde(default = "default_export_interval_ms")]
    pub interval_ms: u64,
}

const fn default_export_interval_ms() -> u64 {
    60_000
}

impl ExportConfig {
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Main application configuration.
///
/// Load from a TOML file using [`Config::load`] or parse directly with
/// [`Config::parse_toml`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Logging and tracing configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Reconnection, heartbeat and fallback settings shared by all endpoints.
    #[serde(default)]
    pub resilience: ResilienceConfig,

    /// Optional metrics snapshot export.
    #[serde(default)]
    pub export: Option<ExportConfig>,

    /// Supervised endpoints.
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

impl Config {
    /// Parse configuration from TOML content.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML content is malformed or validation fails.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The TOML content is malformed
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Initialize the global tracing subscriber.
    pub fn init_logging(&self) {
        if !self.logging.init() {
            tracing::debug!("Tracing subscriber already installed");
        }
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<()> {
        self.logging.validate()?;
        self.resilience.validate()?;

        let mut names = HashSet::new();
        for endpoint in &self.endpoints {
            validate_endpoint(endpoint)?;
            if !names.insert(endpoint.name.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "endpoints.name",
                    reason: format!("duplicate endpoint '{}'", endpoint.name),
                }
                .into());
            }
        }

        if let Some(export) = &self.export {
            if export.path.as_os_str().is_empty() {
                return Err(ConfigError::MissingField {
                    field: "export.path",
                }
                .into());
            }
            if export.interval_ms == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "export.interval_ms",
                    reason: "must be > 0".to_string(),
                }
                .into());
            }
        }

        Ok(())
    }
}

/// Check that an endpoint has a name and only WebSocket addresses.
///
/// # Errors
///
/// Returns [`ConfigError`] describing the first problem found.
pub fn validate_endpoint(endpoint: &EndpointConfig) -> Result<()> {
    if endpoint.name.trim().is_empty() {
        return Err(ConfigError::MissingField {
            field: "endpoints.name",
        }
        .into());
    }

    for address in endpoint.addresses() {
        let parsed = Url::parse(address).map_err(|e| ConfigError::InvalidValue {
            field: "endpoints.url",
            reason: format!("'{address}' for endpoint '{}': {e}", endpoint.name),
        })?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(ConfigError::InvalidValue {
                field: "endpoints.url",
                reason: format!(
                    "'{address}' for endpoint '{}' must use ws:// or wss://",
                    endpoint.name
                ),
            }
            .into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const SAMPLE: &str = r#"
[logging]
level = "debug"
format = "json"

[resilience]
connect_timeout_ms = 5000

[resilience.reconnection]
max_attempts = 3
initial_delay_ms = 1000
backoff_multiplier = 2.0

[resilience.heartbeat]
interval_ms = 15000

[[endpoints]]
name = "pulse"
url = "ws://localhost:3001"
priority = 1

[[endpoints]]
name = "seams"
url = "ws://localhost:3002"
backup_urls = ["wss://backup.example.com/seams"]
priority = 2
"#;

    #[test]
    fn parses_full_document() {
        let config = Config::parse_toml(SAMPLE).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.resilience.connect_timeout_ms, 5000);
        assert_eq!(config.resilience.reconnection.max_attempts, 3);
        assert_eq!(config.resilience.reconnection.max_delay_ms, 30_000);
        assert_eq!(config.resilience.heartbeat.interval_ms, 15_000);
        assert_eq!(config.endpoints.len(), 2);
        assert_eq!(config.endpoints[1].backup_urls.len(), 1);
        assert!(config.export.is_none());
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::parse_toml("").unwrap();
        assert!(config.endpoints.is_empty());
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.resilience.fallback.recovery_interval_ms, 60_000);
    }

    #[test]
    fn rejects_duplicate_names() {
        let toml = r#"
[[endpoints]]
name = "pulse"
url = "ws://a"

[[endpoints]]
name = "pulse"
url = "ws://b"
"#;
        let err = Config::parse_toml(toml).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::InvalidValue {
                field: "endpoints.name",
                ..
            })
        ));
    }

    #[test]
    fn rejects_non_websocket_backup() {
        let toml = r#"
[[endpoints]]
name = "voices"
url = "ws://localhost:3003"
backup_urls = ["http://localhost:3003"]
"#;
        let err = Config::parse_toml(toml).unwrap_err();
        assert!(err.to_string().contains("ws:// or wss://"));
    }

    #[test]
    fn rejects_invalid_backoff() {
        let toml = "[resilience.reconnection]\nbackoff_multiplier = 0.5";
        assert!(Config::parse_toml(toml).is_err());
    }

    #[test]
    fn parses_export_section() {
        let toml = "[export]\npath = \"metrics.json\"";
        let config = Config::parse_toml(toml).unwrap();
        let export = config.export.unwrap();
        assert_eq!(export.path, PathBuf::from("metrics.json"));
        assert_eq!(export.interval(), Duration::from_secs(60));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = Config::parse_toml("[[endpoints]\nname =").unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::Parse(_))));
    }
}
