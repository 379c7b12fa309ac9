//! Device position seam.

use async_trait::async_trait;
use charlie_core::LocationConfig;

use crate::types::{Coordinates, LocationError};

/// One-shot source of the device's coordinates.
///
/// Implementations answer a single request; callers apply no timeout.
#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn current_position(&self) -> Result<Coordinates, LocationError>;
}

/// Reports a fixed position, or no service at all when none is configured.
#[derive(Debug, Clone, Default)]
pub struct FixedGeolocator {
    coordinates: Option<Coordinates>,
}

impl FixedGeolocator {
    pub fn new(coordinates: Coordinates) -> Self {
        Self {
            coordinates: Some(coordinates),
        }
    }

    /// A geolocator with no position to report.
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn from_config(config: &LocationConfig) -> Self {
        let coordinates = Coordinates {
            latitude: config.latitude,
            longitude: config.longitude,
        };
        if coordinates.is_empty() {
            Self::unavailable()
        } else {
            Self::new(coordinates)
        }
    }
}

#[async_trait]
impl Geolocator for FixedGeolocator {
    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        self.coordinates.ok_or(LocationError::ServiceUnavailable)
    }
}
