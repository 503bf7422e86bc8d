use std::path::PathBuf;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use wristlink_bridge::Bridge;
use wristlink_core::{AppError, Config};
use wristlink_device::JsonLinesChannel;
use wristlink_weather::{FixedLocation, FreshFixCache, LocationProvider, UnavailableLocation};

/// Overrides the default config file location
const CONFIG_ENV: &str = "WRISTLINK_CONFIG";

#[tokio::main]
async fn main() -> Result<(), AppError> {
    wristlink_core::init()?;

    let result = start().await;
    if let Err(e) = &result {
        tracing::error!("{} ({})", e.user_message(), e);
    }
    result
}

async fn start() -> Result<(), AppError> {
    let config_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    let (config, _validation) = Config::load_validated(config_path.as_deref())?;

    match config.location.fixed {
        Some(fixed) => run(&config, FreshFixCache::new(FixedLocation::new(fixed.into()))).await,
        None => {
            tracing::warn!("No location source configured; every run will fail to locate");
            run(&config, UnavailableLocation).await
        }
    }
}

/// Fire the ready event, then treat every stdin line as a message from the watch.
async fn run<L: LocationProvider + 'static>(config: &Config, location: L) -> Result<(), AppError> {
    let bridge = Bridge::from_config(config, location, JsonLinesChannel::stdout())
        .context("Failed to set up weather provider")?;

    tracing::info!("Wristlink bridge started");
    let _ready = bridge.on_ready();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("Failed to read from stdin")? {
                    Some(line) => {
                        let payload = serde_json::from_str(&line)
                            .unwrap_or_else(|_| serde_json::Value::String(line));
                        let _run = bridge.on_app_message(payload);
                    }
                    None => {
                        bridge.drain().await;
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                bridge.shutdown().await;
                break;
            }
        }
    }

    tracing::info!("Wristlink bridge stopped");
    Ok(())
}
