use std::fmt;

use serde::Serialize;

/// Keys of the weather dictionary, as registered by the watch app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    Temperature,
    LocationName,
}

impl MessageKey {
    /// Numeric id the watch reads the tuple under
    pub const fn id(self) -> u32 {
        match self {
            MessageKey::Temperature => 0,
            MessageKey::LocationName => 1,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            MessageKey::Temperature => "KEY_TEMPERATURE",
            MessageKey::LocationName => "KEY_LOCATION_NAME",
        }
    }
}

/// Value of one dictionary tuple
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TupleValue {
    Int32(i32),
    CString(String),
}

impl fmt::Display for TupleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TupleValue::Int32(v) => write!(f, "{}", v),
            TupleValue::CString(s) => write!(f, "{:?}", s),
        }
    }
}

/// Weather update for the watch.
///
/// Both keys are always present; there is no way to build a message with
/// only one of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherMessage {
    /// Whole degrees Celsius
    pub temperature: i32,
    pub location_name: String,
}

impl WeatherMessage {
    pub fn new(temperature: i32, location_name: impl Into<String>) -> Self {
        Self {
            temperature,
            location_name: location_name.into(),
        }
    }

    /// The dictionary tuples in key order
    pub fn entries(&self) -> [(MessageKey, TupleValue); 2] {
        [
            (MessageKey::Temperature, TupleValue::Int32(self.temperature)),
            (
                MessageKey::LocationName,
                TupleValue::CString(self.location_name.clone()),
            ),
        ]
    }
}
