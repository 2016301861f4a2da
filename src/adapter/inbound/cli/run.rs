//! Handler for the `run` command.

use std::path::Path;
use std::sync::Arc;

use chrono::{Local, Utc};
use serde_json::json;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::adapter::inbound::cli::command::RunArgs;
use crate::adapter::inbound::cli::output;
use crate::adapter::outbound::WebSocketConnector;
use crate::application::resilience::ResilienceManager;
use crate::domain::MetricsSnapshot;
use crate::error::Result;
use crate::infrastructure::config::{Config, ExportConfig};

/// Execute the run command.
pub async fn execute(args: &RunArgs) -> Result<()> {
    let mut config = Config::load(&args.config)?;
    if let Some(level) = &args.log_level {
        config.logging.level.clone_from(level);
    }
    if args.json_logs || output::is_json() {
        config.logging.format = "json".to_string();
    }
    config.logging.validate()?;
    config.init_logging();

    output::header(env!("CARGO_PKG_VERSION"));
    output::field("Config", args.config.display());
    output::field("Endpoints", config.endpoints.len());
    if config.endpoints.is_empty() {
        output::warning("No endpoints configured; nothing to supervise");
    }

    let manager = Arc::new(ResilienceManager::new(
        config.resilience.clone(),
        Arc::new(WebSocketConnector::new()),
    )?);
    for endpoint in &config.endpoints {
        manager.add_endpoint(endpoint.clone())?;
    }

    let mut events = manager.subscribe();
    manager.connect_all()?;
    info!(endpoints = config.endpoints.len(), "lifeline starting");

    let exporter = config
        .export
        .clone()
        .map(|export| tokio::spawn(export_loop(Arc::clone(&manager), export)));

    let shutdown = signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received (Ctrl+C)");
                break;
            }
            event = events.recv() => match event {
                Ok(event) => output::event(&timestamp(), &event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event stream lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    if let Some(exporter) = exporter {
        exporter.abort();
    }
    manager.shutdown().await;

    let snapshot = manager.snapshot();
    if let Some(export) = &config.export {
        if let Err(e) = write_snapshot(&export.path, &snapshot).await {
            warn!(error = %e, path = %export.path.display(), "Final metrics export failed");
        }
    }
    print_summary(&snapshot);

    info!("lifeline stopped");
    Ok(())
}

async fn export_loop(manager: Arc<ResilienceManager>, export: ExportConfig) {
    let start = tokio::time::Instant::now() + export.interval();
    let mut interval = tokio::time::interval_at(start, export.interval());
    loop {
        interval.tick().await;
        if let Err(e) = write_snapshot(&export.path, &manager.snapshot()).await {
            warn!(error = %e, path = %export.path.display(), "Metrics export failed");
        }
    }
}

/// Overwrite `path` with a timestamped JSON rendering of `snapshot`.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub async fn write_snapshot(path: &Path, snapshot: &MetricsSnapshot) -> Result<()> {
    let document = json!({
        "timestamp": Utc::now().to_rfc3339(),
        "metrics": snapshot,
    });
    let content = serde_json::to_string_pretty(&document)?;
    tokio::fs::write(path, content).await?;
    Ok(())
}

fn timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

fn print_summary(snapshot: &MetricsSnapshot) {
    output::section("Summary");
    for endpoint in &snapshot.endpoints {
        output::field(&endpoint.name, output::status(endpoint.status));
    }
    output::field("Attempts", snapshot.connection_attempts);
    output::field("Connected", snapshot.successful_connections);
    output::field("Failed", snapshot.failed_connections);
    output::field("Reconnects", snapshot.reconnections);
    output::field("Stale", snapshot.heartbeat_failures);
    output::field("Fallbacks", snapshot.fallback_activations);
    output::field(
        "Uptime",
        format!("{:.1}s", snapshot.cumulative_uptime_ms as f64 / 1000.0),
    );
}
