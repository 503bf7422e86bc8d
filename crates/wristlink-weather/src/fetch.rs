//! Single-shot HTTP request returning the response body as text.

use reqwest::{Client, Method};
use tracing::instrument;
use url::Url;

use crate::types::WeatherError;

/// Issue one request and return the body once it has loaded.
///
/// Non-2xx statuses come back as [`WeatherError::Status`] with the body kept
/// for diagnostics. Connection failures and the client's timeout surface as
/// [`WeatherError::Network`]. Nothing is retried.
#[instrument(skip(client, url), fields(host = url.host_str().unwrap_or_default()), level = "debug")]
pub async fn fetch_text(client: &Client, method: Method, url: Url) -> Result<String, WeatherError> {
    let response = client.request(method, url).send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        tracing::debug!("Request failed with status {}", status);
        return Err(WeatherError::Status {
            status: status.as_u16(),
            body,
        });
    }

    tracing::debug!("Loaded {} bytes", body.len());
    Ok(body)
}
