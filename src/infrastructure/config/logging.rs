//! Logging configuration and initialization.
//!
//! Logs go to stderr so that `lifeline run` can keep stdout for the event
//! stream (human lines or `--json` objects).

use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{ConfigError, Result};

const FORMATS: [&str; 3] = ["pretty", "compact", "json"];

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive (e.g. `info`, `lifeline=debug`).
    pub level: String,
    /// One of `pretty`, `compact` or `json`.
    pub format: String,
}

impl LoggingConfig {
    /// Reject unknown formats and unparseable filter directives.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if !FORMATS.contains(&self.format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "logging.format",
                reason: format!("'{}' is not one of {}", self.format, FORMATS.join(", ")),
            }
            .into());
        }
        EnvFilter::try_new(&self.level).map_err(|e| ConfigError::InvalidValue {
            field: "logging.level",
            reason: e.to_string(),
        })?;
        Ok(())
    }

    /// Install the global tracing subscriber.
    ///
    /// `RUST_LOG` takes precedence over the configured level. Returns
    /// `false` if a subscriber was already installed.
    pub fn init(&self) -> bool {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));
        let builder = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr);

        let installed = match self.format.as_str() {
            "json" => builder.json().try_init(),
            "compact" => builder.compact().try_init(),
            _ => builder.try_init(),
        };
        installed.is_ok()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn logging(level: &str, format: &str) -> LoggingConfig {
        LoggingConfig {
            level: level.into(),
            format: format.into(),
        }
    }

    #[test]
    fn test_accepts_known_formats_and_directives() {
        assert!(LoggingConfig::default().validate().is_ok());
        assert!(logging("lifeline=debug,warn", "json").validate().is_ok());
        assert!(logging("trace", "compact").validate().is_ok());
    }

    #[test]
    fn test_rejects_unknown_format() {
        let err = logging("info", "yaml").validate().unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::InvalidValue {
                field: "logging.format",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_bad_directive() {
        let err = logging("lifeline=loud", "pretty").validate().unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::InvalidValue {
                field: "logging.level",
                ..
            })
        ));
    }
}
