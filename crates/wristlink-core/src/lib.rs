pub mod config;
pub mod error;

pub use config::{
    Config, DeviceConfig, FixedCoordinates, LocationConfig, PlatformVariant, ValidationResult,
    WeatherConfig,
};
pub use error::{AppError, ConfigError};

use anyhow::Result;

/// Initialize the bridge's logging
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::info!("Wristlink core initialized");
    Ok(())
}
