use std::path::Path;

use crate::adapter::inbound::cli::output;
use crate::error::Result;
use crate::infrastructure::config::Config;

/// Validate a configuration file without connecting anything.
pub fn execute_config<P: AsRef<Path>>(config_path: P) -> Result<()> {
    let path = config_path.as_ref();
    let config = Config::load(path)?;

    output::section("Configuration Check");
    output::field("Config", path.display());
    output::success("Configuration file is valid");

    let resilience = &config.resilience;
    output::section("Resilience");
    output::field(
        "Retries",
        format!(
            "{} attempts, {}ms ×{} up to {}ms",
            resilience.reconnection.max_attempts,
            resilience.reconnection.initial_delay_ms,
            resilience.reconnection.backoff_multiplier,
            resilience.reconnection.max_delay_ms
        ),
    );
    if resilience.heartbeat.enabled {
        output::field(
            "Heartbeat",
            format!(
                "every {}ms, stale after {}ms",
                resilience.heartbeat.interval_ms,
                resilience.heartbeat.stale_after().as_millis()
            ),
        );
    } else {
        output::field("Heartbeat", "disabled");
    }
    output::field(
        "Recovery",
        format!("every {}ms", resilience.fallback.recovery_interval_ms),
    );
    output::field("Timeout", format!("{}ms", resilience.connect_timeout_ms));

    output::section("Endpoints");
    if config.endpoints.is_empty() {
        output::warning("No endpoints configured");
    }
    let mut endpoints: Vec<_> = config.endpoints.iter().collect();
    endpoints.sort_by(|a, b| (a.priority, &a.name).cmp(&(b.priority, &b.name)));
    for endpoint in endpoints {
        let backups = if endpoint.backup_urls.is_empty() {
            String::new()
        } else {
            output::muted(format!(" (+{} backup)", endpoint.backup_urls.len()))
        };
        output::field(&endpoint.name, format!("{}{backups}", endpoint.url));
        if output::verbosity() > 0 {
            for backup in &endpoint.backup_urls {
                output::field("", output::muted(format!("↳ {backup}")));
            }
        }
    }

    if let Some(export) = &config.export {
        output::field("Export", export.path.display());
    }

    output::success("Configuration check complete");
    Ok(())
}
