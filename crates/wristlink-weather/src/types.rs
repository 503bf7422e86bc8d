use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Geographic coordinates in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl From<wristlink_core::FixedCoordinates> for Coordinates {
    fn from(fixed: wristlink_core::FixedCoordinates) -> Self {
        Self::new(fixed.latitude, fixed.longitude)
    }
}

/// A position fix and the time it was taken
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub coords: Coordinates,
    pub timestamp: DateTime<Utc>,
}

impl Position {
    /// A fix taken now
    pub fn now(coords: Coordinates) -> Self {
        Self {
            coords,
            timestamp: Utc::now(),
        }
    }
}

/// What the watch gets out of one weather lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// Degrees Celsius, rounded
    pub temperature_c: i32,
    /// Place name exactly as the weather service reported it
    pub location_name: String,
}

/// Subset of the OpenWeatherMap current-weather response we read
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CurrentWeatherResponse {
    pub main: MainBlock,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct MainBlock {
    /// Kelvin
    pub temp: f64,
}

/// Location service errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location service unavailable")]
    ServiceUnavailable,
    #[error("Location request timed out")]
    Timeout,
    #[error("Location error: {0}")]
    Other(String),
}

/// Weather lookup errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Weather service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Malformed weather response: {0}")]
    MalformedResponse(String),
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl WeatherError {
    pub fn user_message(&self) -> &'static str {
        match self {
            WeatherError::Network(e) if e.is_timeout() => "The weather request timed out.",
            WeatherError::Network(_) => "Unable to reach the weather service.",
            WeatherError::Status { status: 401, .. } => "The weather API key was rejected.",
            WeatherError::Status { .. } => "The weather service returned an error.",
            WeatherError::MalformedResponse(_) => "Received an unexpected weather response.",
            WeatherError::InvalidEndpoint(_) => "The weather endpoint is misconfigured.",
        }
    }
}
