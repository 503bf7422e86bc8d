//! Position acquisition.
//!
//! The host platform supplies a [`LocationProvider`]; [`acquire`] puts the
//! bounded wait around it. [`FreshFixCache`] adds the freshness allowance for
//! providers that cannot reuse a recent fix on their own.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use wristlink_core::LocationConfig;

use crate::types::{Coordinates, LocationError, Position};

/// Options for a one-shot position request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    /// How long to wait for a fix before giving up
    pub timeout: Duration,
    /// Oldest previously obtained fix that may be returned instead of a new one
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(15_000),
            maximum_age: Duration::from_millis(60_000),
        }
    }
}

impl From<&LocationConfig> for PositionOptions {
    fn from(config: &LocationConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.timeout_ms),
            maximum_age: Duration::from_millis(config.maximum_age_ms),
        }
    }
}

/// Source of position fixes on the host
pub trait LocationProvider: Send + Sync {
    fn current_position(
        &self,
        options: PositionOptions,
    ) -> impl Future<Output = Result<Position, LocationError>> + Send;
}

/// Request one fix, failing with [`LocationError::Timeout`] once `options.timeout` elapses.
pub async fn acquire<P: LocationProvider>(
    provider: &P,
    options: PositionOptions,
) -> Result<Position, LocationError> {
    let position = tokio::time::timeout(options.timeout, provider.current_position(options))
        .await
        .map_err(|_| LocationError::Timeout)??;

    tracing::info!(
        "Got location: {}, {}",
        position.coords.latitude,
        position.coords.longitude
    );
    Ok(position)
}

/// Always reports the same coordinates
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation {
    coords: Coordinates,
}

impl FixedLocation {
    pub fn new(coords: Coordinates) -> Self {
        Self { coords }
    }
}

impl LocationProvider for FixedLocation {
    async fn current_position(&self, _options: PositionOptions) -> Result<Position, LocationError> {
        Ok(Position::now(self.coords))
    }
}

/// For hosts with no location service at all
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableLocation;

impl LocationProvider for UnavailableLocation {
    async fn current_position(&self, _options: PositionOptions) -> Result<Position, LocationError> {
        Err(LocationError::ServiceUnavailable)
    }
}

/// Reuses the last fix while it is no older than `maximum_age`
#[derive(Debug)]
pub struct FreshFixCache<P> {
    inner: P,
    last: Mutex<Option<Position>>,
}

impl<P> FreshFixCache<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            last: Mutex::new(None),
        }
    }

    fn fresh_fix(&self, maximum_age: Duration) -> Option<Position> {
        let last = (*self.last.lock())?;
        let age = (Utc::now() - last.timestamp).to_std().unwrap_or_default();
        (age <= maximum_age).then_some(last)
    }
}

impl<P: LocationProvider> LocationProvider for FreshFixCache<P> {
    async fn current_position(&self, options: PositionOptions) -> Result<Position, LocationError> {
        if let Some(position) = self.fresh_fix(options.maximum_age) {
            tracing::debug!("Reusing fix from {}", position.timestamp);
            return Ok(position);
        }

        let position = self.inner.current_position(options).await?;
        *self.last.lock() = Some(position);
        Ok(position)
    }
}
