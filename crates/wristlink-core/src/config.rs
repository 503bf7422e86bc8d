use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

/// Environment variable consulted when no API key is set in the config file
pub const API_KEY_ENV: &str = "OPENWEATHERMAP_API_KEY";

const DEFAULT_WEATHER_ENDPOINT: &str = "http://api.openweathermap.org/data/2.5/weather";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// All errors joined into one line
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Bridge configuration, read-only once the bridge is constructed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Weather service settings
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Location request settings
    #[serde(default)]
    pub location: LocationConfig,

    /// Paired device settings
    #[serde(default)]
    pub device: DeviceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Base URL of the current-weather endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// API key sent as the `appid` query parameter
    #[serde(default)]
    pub api_key: Option<String>,

    /// Upper bound on a single weather request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_endpoint() -> String {
    DEFAULT_WEATHER_ENDPOINT.to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl WeatherConfig {
    /// The configured key, falling back to `OPENWEATHERMAP_API_KEY`.
    pub fn effective_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()))
    }
}

/// Coordinates used by hosts without a location service
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedCoordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Bounded wait for a position fix
    #[serde(default = "default_location_timeout_ms")]
    pub timeout_ms: u64,

    /// How old a previously obtained fix may be and still be reused
    #[serde(default = "default_maximum_age_ms")]
    pub maximum_age_ms: u64,

    /// Static position, when the host has no location service
    #[serde(default)]
    pub fixed: Option<FixedCoordinates>,
}

fn default_location_timeout_ms() -> u64 {
    15_000
}

fn default_maximum_age_ms() -> u64 {
    60_000
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_location_timeout_ms(),
            maximum_age_ms: default_maximum_age_ms(),
            fixed: None,
        }
    }
}

/// Hardware class of the paired watch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlatformVariant {
    Aplite,
    #[default]
    Basalt,
    Chalk,
    Diorite,
    Emery,
}

impl PlatformVariant {
    /// Whether the bridge pushes the host's timezone offset on ready.
    ///
    /// Only aplite watches get it; newer platforms read the phone's timezone themselves.
    pub fn pushes_timezone(self) -> bool {
        matches!(self, PlatformVariant::Aplite)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlatformVariant::Aplite => "aplite",
            PlatformVariant::Basalt => "basalt",
            PlatformVariant::Chalk => "chalk",
            PlatformVariant::Diorite => "diorite",
            PlatformVariant::Emery => "emery",
        }
    }
}

impl std::fmt::Display for PlatformVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PlatformVariant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aplite" => Ok(PlatformVariant::Aplite),
            "basalt" => Ok(PlatformVariant::Basalt),
            "chalk" => Ok(PlatformVariant::Chalk),
            "diorite" => Ok(PlatformVariant::Diorite),
            "emery" => Ok(PlatformVariant::Emery),
            other => Err(ConfigError::Invalid(format!("unknown platform: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Platform of the paired watch
    #[serde(default)]
    pub platform: PlatformVariant,
}

impl Config {
    /// Load configuration from the default location, creating it if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = Self::default();
            config.save_to(&config_path)?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()).into());
        }

        let contents = std::fs::read_to_string(path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .map_err(ConfigError::from)
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Warnings are logged; errors fail the load.
    pub fn load_validated(path: Option<&Path>) -> Result<(Self, ValidationResult)> {
        let config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_url(&self.weather.endpoint, "weather.endpoint", &mut result);

        if self.weather.effective_api_key().is_none() {
            result.add_warning(
                "weather.api_key",
                format!("No API key configured (set it here or in {})", API_KEY_ENV),
            );
        }

        if self.weather.request_timeout_secs == 0 {
            result.add_error(
                "weather.request_timeout_secs",
                "Request timeout must be greater than 0",
            );
        }

        if self.location.timeout_ms == 0 {
            result.add_error("location.timeout_ms", "Location timeout must be greater than 0");
        }

        if let Some(fixed) = self.location.fixed {
            if !(-90.0..=90.0).contains(&fixed.latitude) {
                result.add_error("location.fixed.latitude", "Latitude must be within -90..=90");
            }
            if !(-180.0..=180.0).contains(&fixed.longitude) {
                result.add_error(
                    "location.fixed.longitude",
                    "Longitude must be within -180..=180",
                );
            }
        }

        result
    }

    fn validate_url(url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("wristlink");

        Ok(config_dir.join("config.toml"))
    }
}
