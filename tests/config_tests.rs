use std::io::Write;

use lifeline::error::{ConfigError, Error};
use lifeline::infrastructure::config::settings::Config;
use tempfile::NamedTempFile;

fn write_temp_config(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .prefix("lifeline-config-test-")
        .suffix(".toml")
        .tempfile()
        .expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

#[test]
fn config_loads_full_file() {
    let file = write_temp_config(
        r#"
[logging]
level = "debug"
format = "json"

[resilience]
connect_timeout_ms = 5000

[resilience.reconnection]
max_attempts = 3
initial_delay_ms = 1000
backoff_multiplier = 2.0
max_delay_ms = 30000

[resilience.heartbeat]
interval_ms = 30000
check_interval_ms = 10000

[resilience.fallback]
recovery_interval_ms = 60000

[export]
path = "metrics.json"

[[endpoints]]
name = "pulse"
url = "ws://localhost:3001"
priority = 1

[[endpoints]]
name = "voices"
url = "wss://voices.example.com/ws"
backup_urls = ["wss://voices-backup.example.com/ws"]
priority = 2
"#,
    );

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.resilience.connect_timeout_ms, 5000);
    assert_eq!(config.resilience.reconnection.max_attempts, 3);
    assert_eq!(config.resilience.heartbeat.stale_multiple, 2);
    assert_eq!(config.resilience.fallback.recovery_interval_ms, 60_000);

    let export = config.export.unwrap();
    assert_eq!(export.path.to_str(), Some("metrics.json"));
    assert_eq!(export.interval_ms, 60_000);

    assert_eq!(config.endpoints.len(), 2);
    assert_eq!(config.endpoints[1].address_count(), 2);
    assert_eq!(
        config.endpoints[1].address(1),
        Some("wss://voices-backup.example.com/ws")
    );
}

#[test]
fn config_rejects_duplicate_endpoint_names() {
    let file = write_temp_config(
        r#"
[[endpoints]]
name = "pulse"
url = "ws://localhost:3001"

[[endpoints]]
name = "pulse"
url = "ws://localhost:3002"
"#,
    );

    let err = Config::load(file.path()).unwrap_err();
    assert!(matches!(
        err,
        Error::Config(ConfigError::InvalidValue {
            field: "endpoints.name",
            ..
        })
    ));
}

#[test]
fn config_rejects_non_websocket_backup() {
    let file = write_temp_config(
        r#"
[[endpoints]]
name = "seams"
url = "ws://localhost:3002"
backup_urls = ["https://localhost:3002"]
"#,
    );

    let err = Config::load(file.path()).unwrap_err();
    assert!(err.to_string().contains("ws:// or wss://"), "{err}");
}

#[test]
fn config_rejects_multiplier_at_or_below_one() {
    let file = write_temp_config(
        r#"
[resilience.reconnection]
backoff_multiplier = 1.0
"#,
    );

    let err = Config::load(file.path()).unwrap_err();
    assert!(matches!(
        err,
        Error::Config(ConfigError::InvalidValue {
            field: "reconnection.backoff_multiplier",
            ..
        })
    ));
}

#[test]
fn config_missing_file_is_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::ReadFile(_))));
}
