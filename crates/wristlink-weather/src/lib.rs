//! Weather lookup for the wristlink bridge
//!
//! Acquires a position fix from the host's location service, queries the
//! OpenWeatherMap current-weather endpoint for it, and reduces the response
//! to the two values the watch displays.

pub mod fetch;
pub mod location;
pub mod provider;
pub mod types;

pub use location::{
    acquire, FixedLocation, FreshFixCache, LocationProvider, PositionOptions, UnavailableLocation,
};
pub use provider::{kelvin_to_celsius, WeatherProvider};
pub use types::*;
