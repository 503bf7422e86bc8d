use crate::fetch::fetch_text;
use crate::types::{Coordinates, CurrentWeatherResponse, Observation, WeatherError};
use reqwest::{Client, Method};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;
use url::Url;
use wristlink_core::WeatherConfig;

const KELVIN_OFFSET: f64 = 273.15;

/// Convert Kelvin to whole degrees Celsius.
///
/// Halves round up (towards positive infinity), so -0.5 °C becomes 0.
/// Returns `None` when the result is not a finite `i32`.
pub fn kelvin_to_celsius(kelvin: f64) -> Option<i32> {
    round_half_up(kelvin - KELVIN_OFFSET)
}

fn round_half_up(value: f64) -> Option<i32> {
    let rounded = (value + 0.5).floor();
    if rounded.is_finite() && rounded >= f64::from(i32::MIN) && rounded <= f64::from(i32::MAX) {
        Some(rounded as i32)
    } else {
        None
    }
}

/// Client for the current-weather endpoint
#[derive(Debug, Clone)]
pub struct WeatherProvider {
    client: Arc<Client>,
    endpoint: Url,
    api_key: Option<String>,
}

impl WeatherProvider {
    pub fn new(
        endpoint: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, WeatherError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| WeatherError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client: Arc::new(client),
            endpoint,
            api_key,
        })
    }

    pub fn from_config(config: &WeatherConfig) -> Result<Self, WeatherError> {
        Self::new(
            &config.endpoint,
            config.effective_api_key(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Endpoint URL with `lat`, `lon` and (when configured) `appid` appended
    pub fn request_url(&self, coords: &Coordinates) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("lat", &coords.latitude.to_string())
                .append_pair("lon", &coords.longitude.to_string());
            if let Some(key) = &self.api_key {
                query.append_pair("appid", key);
            }
        }
        url
    }

    /// Fetch current conditions for the given coordinates.
    #[instrument(skip(self), level = "info")]
    pub async fn fetch(&self, coords: &Coordinates) -> Result<Observation, WeatherError> {
        let body = fetch_text(&self.client, Method::GET, self.request_url(coords)).await?;
        let observation = Observation::from_response_body(&body)?;

        tracing::info!(
            "Weather for {}: {}°C",
            observation.location_name,
            observation.temperature_c
        );
        Ok(observation)
    }
}

impl Observation {
    /// Parse a current-weather response body.
    ///
    /// Fails with [`WeatherError::MalformedResponse`] when the body is not JSON,
    /// lacks `main.temp` or `name`, or has a temperature that does not fit an `i32`.
    pub fn from_response_body(body: &str) -> Result<Self, WeatherError> {
        let response: CurrentWeatherResponse = serde_json::from_str(body)
            .map_err(|e| WeatherError::MalformedResponse(e.to_string()))?;

        let temperature_c = kelvin_to_celsius(response.main.temp).ok_or_else(|| {
            WeatherError::MalformedResponse(format!(
                "temperature out of range: {} K",
                response.main.temp
            ))
        })?;

        Ok(Self {
            temperature_c,
            location_name: response.name,
        })
    }
}
