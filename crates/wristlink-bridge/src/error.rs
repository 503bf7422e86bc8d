use thiserror::Error;
use wristlink_device::DeliveryError;
use wristlink_weather::{LocationError, WeatherError};

/// Why a pipeline run ended without updating the watch
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Location error: {0}")]
    Location(#[from] LocationError),

    #[error("Weather error: {0}")]
    Weather(#[from] WeatherError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),
}

impl RunError {
    pub fn user_message(&self) -> &'static str {
        match self {
            RunError::Location(LocationError::PermissionDenied) => {
                "Location access is denied. Allow it to get local weather."
            }
            RunError::Location(LocationError::Timeout) => "Could not get a location fix in time.",
            RunError::Location(_) => "Your location is unavailable right now.",
            RunError::Weather(e) => e.user_message(),
            RunError::Delivery(_) => "The watch did not accept the weather update.",
        }
    }
}
