//! Outbound channel to the paired watch.

use std::collections::BTreeMap;
use std::future::Future;

use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::message::{TupleValue, WeatherMessage};

/// Errors delivering a message to the watch
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Message rejected by device: {0}")]
    Nack(String),
    #[error("Device not connected")]
    Disconnected,
    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Message transport to the watch.
///
/// Each send resolves once the watch has acknowledged or refused the message.
pub trait DeviceChannel: Send + Sync {
    fn send_message(
        &self,
        message: WeatherMessage,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;

    fn send_timezone_offset(
        &self,
        offset_minutes: i32,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

/// Send a weather message and log the outcome. Failures are not retried.
pub async fn relay<C: DeviceChannel>(
    channel: &C,
    message: WeatherMessage,
) -> Result<(), DeliveryError> {
    for (key, value) in message.entries() {
        tracing::debug!("{} = {}", key.name(), value);
    }

    match channel.send_message(message).await {
        Ok(()) => {
            tracing::info!("Weather info sent to device successfully!");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Error sending weather info to device! {}", e);
            Err(e)
        }
    }
}

/// One line on the wire. Weather tuples are keyed by their numeric id.
#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Outbound {
    Weather { dictionary: BTreeMap<u32, TupleValue> },
    Timezone { offset_minutes: i32 },
}

impl Outbound {
    fn weather(message: &WeatherMessage) -> Self {
        let dictionary = message
            .entries()
            .into_iter()
            .map(|(key, value)| (key.id(), value))
            .collect();
        Outbound::Weather { dictionary }
    }
}

/// Writes every outbound message as one JSON line.
///
/// A successful write and flush counts as acknowledgement.
#[derive(Debug)]
pub struct JsonLinesChannel<W> {
    writer: Mutex<W>,
}

impl<W> JsonLinesChannel<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl JsonLinesChannel<tokio::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W: AsyncWrite + Unpin + Send> JsonLinesChannel<W> {
    async fn write_line(&self, outbound: &Outbound) -> Result<(), DeliveryError> {
        let mut line = serde_json::to_vec(outbound)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }
}

impl<W: AsyncWrite + Unpin + Send> DeviceChannel for JsonLinesChannel<W> {
    async fn send_message(&self, message: WeatherMessage) -> Result<(), DeliveryError> {
        self.write_line(&Outbound::weather(&message)).await
    }

    async fn send_timezone_offset(&self, offset_minutes: i32) -> Result<(), DeliveryError> {
        self.write_line(&Outbound::Timezone { offset_minutes }).await
    }
}
