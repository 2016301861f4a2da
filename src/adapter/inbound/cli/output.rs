//! Operator-facing CLI output.
//!
//! Human-readable lines with colored status symbols, or one JSON object per
//! line in `--json` mode for scripting. Quiet mode suppresses everything but
//! warnings and errors.

use std::fmt::Display;
use std::sync::OnceLock;

use owo_colors::OwoColorize;
use parking_lot::RwLock;
use serde_json::json;

use crate::domain::{ConnectionStatus, ResilienceEvent};

/// Runtime output configuration shared by CLI handlers.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Emit machine-readable JSON output instead of human-readable text.
    pub json: bool,
    /// Suppress non-essential output.
    pub quiet: bool,
    /// Verbosity level (0 = normal, 1+ = increasingly verbose).
    pub verbose: u8,
}

impl OutputConfig {
    #[must_use]
    pub const fn new(json: bool, quiet: bool, verbose: u8) -> Self {
        Self {
            json,
            quiet,
            verbose,
        }
    }
}

static OUTPUT_CONFIG: OnceLock<RwLock<OutputConfig>> = OnceLock::new();

fn config_cell() -> &'static RwLock<OutputConfig> {
    OUTPUT_CONFIG.get_or_init(|| RwLock::new(OutputConfig::default()))
}

fn read_config() -> OutputConfig {
    *config_cell().read()
}

fn regular_output_suppressed(config: OutputConfig) -> bool {
    !config.json && config.quiet
}

fn emit_json_line(kind: &str, payload: serde_json::Value) {
    println!(
        "{}",
        json!({
            "type": kind,
            "payload": payload,
        })
    );
}

/// Apply output settings from global CLI flags.
pub fn configure(config: OutputConfig) {
    *config_cell().write() = config;
}

#[must_use]
pub fn is_json() -> bool {
    read_config().json
}

/// Verbosity level from `-v` flags.
#[must_use]
pub fn verbosity() -> u8 {
    read_config().verbose
}

/// Print the application header with name and version.
pub fn header(version: &str) {
    let config = read_config();
    if config.json {
        emit_json_line(
            "header",
            json!({
                "app": "lifeline",
                "version": version,
            }),
        );
        return;
    }
    if regular_output_suppressed(config) {
        return;
    }

    println!("{} {}", "lifeline".bold(), version.dimmed());
    println!();
}

/// Print a labeled value.
pub fn field(label: &str, value: impl Display) {
    let config = read_config();
    let value = value.to_string();

    if config.json {
        emit_json_line("field", json!({ "label": label, "value": value }));
        return;
    }
    if regular_output_suppressed(config) {
        return;
    }

    println!("  {:<12} {}", label.dimmed(), value);
}

pub fn success(message: &str) {
    let config = read_config();

    if config.json {
        emit_json_line("success", json!({ "message": message }));
        return;
    }
    if regular_output_suppressed(config) {
        return;
    }

    println!("  {} {}", "✓".green(), message);
}

pub fn warning(message: &str) {
    if read_config().json {
        emit_json_line("warning", json!({ "message": message }));
        return;
    }

    println!("  {} {}", "⚠".yellow(), message);
}

pub fn error(message: &str) {
    if read_config().json {
        eprintln!(
            "{}",
            json!({
                "type": "error",
                "payload": { "message": message },
            })
        );
        return;
    }

    eprintln!("  {} {}", "×".red(), message);
}

pub fn section(title: &str) {
    let config = read_config();

    if config.json {
        emit_json_line("section", json!({ "title": title }));
        return;
    }
    if regular_output_suppressed(config) {
        return;
    }

    println!();
    println!("{}", title.bold());
}

/// Print one resilience event as a streaming line.
///
/// Message payloads are only shown with `-v`; metrics only with `-vv`.
pub fn event(timestamp: &str, event: &ResilienceEvent) {
    let config = read_config();
    let endpoint = event.endpoint().unwrap_or("*");
    let message = describe(event);

    let verbose_only = match event {
        ResilienceEvent::Message { .. } => 1,
        ResilienceEvent::Metrics(_) => 2,
        _ => 0,
    };
    if config.verbose < verbose_only {
        return;
    }

    if config.json {
        emit_json_line(
            "event",
            json!({
                "timestamp": timestamp,
                "kind": event.kind(),
                "endpoint": endpoint,
                "message": message,
            }),
        );
        return;
    }
    if regular_output_suppressed(config) {
        return;
    }

    let label = match event {
        ResilienceEvent::Connected { .. } => event.kind().green().to_string(),
        ResilienceEvent::Disconnected { .. } => event.kind().yellow().to_string(),
        ResilienceEvent::Error { .. } => event.kind().red().to_string(),
        ResilienceEvent::Message { .. } | ResilienceEvent::Metrics(_) => {
            event.kind().cyan().to_string()
        }
    };
    println!(
        "  {} {:<12} {} {}",
        timestamp.dimmed(),
        label,
        endpoint.bold(),
        message
    );
}

fn describe(event: &ResilienceEvent) -> String {
    match event {
        ResilienceEvent::Connected { address, .. } => format!("via {address}"),
        ResilienceEvent::Disconnected { code, reason, .. } if reason.is_empty() => {
            format!("code {code}")
        }
        ResilienceEvent::Disconnected { code, reason, .. } => format!("code {code}: {reason}"),
        ResilienceEvent::Message { payload, .. } => match payload.as_text() {
            Some(text) => text.to_owned(),
            None => format!("<{} bytes>", payload.len()),
        },
        ResilienceEvent::Error { error, .. } => error.to_string(),
        ResilienceEvent::Metrics(snapshot) => format!(
            "{}/{} healthy ({}%), {} attempts, {} reconnections",
            snapshot.healthy_connections,
            snapshot.total_endpoints,
            snapshot.health_percentage,
            snapshot.connection_attempts,
            snapshot.reconnections
        ),
    }
}

/// Color a status label by severity.
#[must_use]
pub fn status(status: ConnectionStatus) -> String {
    let label = status.to_string();
    if is_json() {
        return label;
    }
    match status {
        ConnectionStatus::Open => label.green().to_string(),
        ConnectionStatus::Connecting | ConnectionStatus::FallbackPending => {
            label.yellow().to_string()
        }
        ConnectionStatus::Degraded | ConnectionStatus::Closed(_) => label.red().to_string(),
        ConnectionStatus::Idle => label.dimmed().to_string(),
    }
}

/// Format a dimmed/muted value.
#[must_use]
pub fn muted(value: impl Display) -> String {
    let value = value.to_string();
    if is_json() {
        return value;
    }
    value.dimmed().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MetricsSnapshot, Payload};
    use crate::error::ConnectionError;

    #[test]
    fn test_describe_disconnect_with_and_without_reason() {
        let event = ResilienceEvent::Disconnected {
            endpoint: "pulse".into(),
            code: 1006,
            reason: "heartbeat stale".into(),
        };
        assert_eq!(describe(&event), "code 1006: heartbeat stale");

        let event = ResilienceEvent::Disconnected {
            endpoint: "pulse".into(),
            code: 1005,
            reason: String::new(),
        };
        assert_eq!(describe(&event), "code 1005");
    }

    #[test]
    fn test_describe_binary_message_shows_size() {
        let event = ResilienceEvent::Message {
            endpoint: "seams".into(),
            payload: Payload::Binary(vec![0; 16]),
        };
        assert_eq!(describe(&event), "<16 bytes>");
    }

    #[test]
    fn test_describe_error_uses_display() {
        let event = ResilienceEvent::Error {
            endpoint: "voices".into(),
            error: ConnectionError::FallbackExhausted { attempted: 2 },
        };
        assert_eq!(describe(&event), "all 2 fallback addresses failed");
    }

    #[test]
    fn test_describe_metrics_summary() {
        let snapshot = MetricsSnapshot {
            connection_attempts: 7,
            successful_connections: 2,
            failed_connections: 5,
            reconnections: 1,
            heartbeat_failures: 0,
            fallback_activations: 1,
            cumulative_uptime_ms: 0,
            healthy_connections: 2,
            total_endpoints: 3,
            health_percentage: 66.7,
            endpoints: Vec::new(),
        };
        assert_eq!(
            describe(&ResilienceEvent::Metrics(snapshot)),
            "2/3 healthy (66.7%), 7 attempts, 1 reconnections"
        );
    }
}
