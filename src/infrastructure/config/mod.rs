//! Configuration modules.

pub mod logging;
pub mod resilience;
pub mod settings;

pub use logging::LoggingConfig;
pub use resilience::{FallbackConfig, HeartbeatConfig, ReconnectionConfig, ResilienceConfig};
pub use settings::{Config, ExportConfig};
