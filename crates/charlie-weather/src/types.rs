use charlie_core::{NetworkError, ReqwestErrorExt, TemperaturePreference};
use serde::{Deserialize, Serialize};

use crate::units::{to_celsius_display, to_fahrenheit_display};

/// Temperature unit preference for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    /// The other unit.
    pub fn toggle(self) -> Self {
        match self {
            Self::Celsius => Self::Fahrenheit,
            Self::Fahrenheit => Self::Celsius,
        }
    }

    /// Format a raw reading in this unit.
    pub fn display(self, temperature: f64) -> String {
        match self {
            Self::Celsius => to_celsius_display(temperature),
            Self::Fahrenheit => to_fahrenheit_display(temperature),
        }
    }
}

impl From<TemperaturePreference> for TemperatureUnit {
    fn from(pref: TemperaturePreference) -> Self {
        match pref {
            TemperaturePreference::Celsius => Self::Celsius,
            TemperaturePreference::Fahrenheit => Self::Fahrenheit,
        }
    }
}

/// Device-reported coordinates. Either half may be missing.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.latitude.is_none() && self.longitude.is_none()
    }
}

/// Resolved city/state pair for the user's position
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Location {
    pub city: Option<String>,
    pub state: Option<String>,
}

impl Location {
    pub fn new(city: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            city: Some(city.into()),
            state: Some(state.into()),
        }
    }

    /// City to fetch weather for, if it is known and non-blank.
    pub fn city(&self) -> Option<&str> {
        self.city.as_deref().filter(|c| !c.trim().is_empty())
    }
}

/// Current conditions, ready for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub temperature_raw: f64,
    pub temperature_c: String,
    pub temperature_f: String,
    pub humidity: f64,
    pub pressure: f64,
    pub icon: String,
    pub description: String,
    pub wind_degrees: f64,
    pub wind_speed: f64,
}

/// One forecast interval, ready for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub temperature_raw: f64,
    pub temperature_c: String,
    pub temperature_f: String,
    pub timestamp: String,
}

/// Entry of the municipality directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Municipality {
    pub id: u64,
    pub city: String,
    pub state: String,
}

/// Geolocation errors
#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location service unavailable")]
    ServiceUnavailable,
}

/// Coarse classification used at the session boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Nothing to resolve: no cached location and no coordinates
    Input,
    /// Network or parse failure from a provider
    Upstream,
    /// Provider does not recognise the city
    NotFound,
}

/// Weather provider errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Coordinates unavailable")]
    CoordinatesUnavailable,
    #[error("Upstream error: {0}")]
    Upstream(#[from] NetworkError),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("City not found: {0}")]
    CityNotFound(String),
    #[error("Cache error: {0}")]
    Cache(String),
}

impl From<reqwest::Error> for WeatherError {
    fn from(e: reqwest::Error) -> Self {
        Self::Upstream(e.into_network_error())
    }
}

impl WeatherError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CoordinatesUnavailable => ErrorKind::Input,
            Self::CityNotFound(_) => ErrorKind::NotFound,
            Self::Upstream(_) | Self::Parse(_) | Self::Cache(_) => ErrorKind::Upstream,
        }
    }

    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::CoordinatesUnavailable => "Your location could not be determined.",
            Self::Upstream(e) => e.user_message(),
            Self::Parse(_) => "Received an unexpected response. Please try again.",
            Self::CityNotFound(_) => "City not found!",
            Self::Cache(_) => "Saved location could not be stored.",
        }
    }
}
