pub mod config;
pub mod error;

pub use config::{
    ApiConfig, Config, ConfigIssue, ConfigReport, DisplayConfig, LocationConfig,
    TemperaturePreference,
};
pub use error::{ConfigError, NetworkError, ReqwestErrorExt};

use anyhow::Result;

/// Initialize logging for the application
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Challenge Charlie core initialized");
    Ok(())
}
