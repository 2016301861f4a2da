use std::path::Path;

use tokio::time::timeout;

use crate::adapter::inbound::cli::output;
use crate::adapter::outbound::WebSocketConnector;
use crate::domain::close_code;
use crate::error::{ConnectionError, Result};
use crate::infrastructure::config::Config;
use crate::port::outbound::transport::Connector;

/// Try one bounded connection to every configured address.
///
/// Fails if any primary address is unreachable; unreachable backups only
/// warn.
pub async fn execute_connection<P: AsRef<Path>>(config_path: P) -> Result<()> {
    let config = Config::load(config_path.as_ref())?;
    let connector = WebSocketConnector::new();
    let limit = config.resilience.connect_timeout();

    output::section("Connection Check");
    output::field("Timeout", format!("{}ms", limit.as_millis()));

    let mut first_failure = None;
    for endpoint in &config.endpoints {
        output::section(&endpoint.name);
        for (index, address) in endpoint.addresses().enumerate() {
            let label = if index == 0 { "Primary" } else { "Backup" };
            match probe(&connector, address, limit).await {
                Ok(()) => output::success(&format!("{label} {address} reachable")),
                Err(e) if index == 0 => {
                    output::error(&format!("{label} {address}: {e}"));
                    first_failure.get_or_insert(e);
                }
                Err(e) => output::warning(&format!("{label} {address}: {e}")),
            }
        }
    }

    if let Some(e) = first_failure {
        return Err(e.into());
    }
    output::success("Connection checks passed");
    Ok(())
}

async fn probe(
    connector: &WebSocketConnector,
    address: &str,
    limit: std::time::Duration,
) -> std::result::Result<(), ConnectionError> {
    let mut transport = match timeout(limit, connector.connect(address)).await {
        Ok(Ok(transport)) => transport,
        Ok(Err(e)) => {
            return Err(ConnectionError::Connect {
                address: address.to_owned(),
                reason: e.to_string(),
            })
        }
        Err(_) => {
            return Err(ConnectionError::ConnectTimeout {
                address: address.to_owned(),
                timeout_ms: limit.as_millis() as u64,
            })
        }
    };
    // Best effort; reachability is already established.
    let _ = timeout(limit, transport.close(close_code::NORMAL, "check")).await;
    Ok(())
}
