//! Host-to-watch messaging.
//!
//! The watch app understands exactly one inbound shape, [`WeatherMessage`],
//! plus a timezone offset pushed to older hardware on startup.

pub mod channel;
pub mod message;
pub mod timezone;

pub use channel::{relay, DeliveryError, DeviceChannel, JsonLinesChannel};
pub use message::{MessageKey, TupleValue, WeatherMessage};
pub use timezone::timezone_offset_minutes;
