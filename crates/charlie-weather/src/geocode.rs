//! Reverse geocoding: turn device coordinates into a city/state pair.
//! Cache-first; a fresh result is written back to the location store.

use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;

use crate::cache::{LocationStore, DEFAULT_LOCATION_TTL};
use crate::client::ProviderClient;
use crate::types::{Coordinates, Location, WeatherError};

const LOCATION_PATH: &str = "/api/location";

pub struct LocationResolver {
    client: ProviderClient,
    store: Arc<dyn LocationStore>,
    ttl: Duration,
}

impl LocationResolver {
    pub fn new(client: ProviderClient, store: Arc<dyn LocationStore>) -> Self {
        Self {
            client,
            store,
            ttl: DEFAULT_LOCATION_TTL,
        }
    }

    /// Override how long a freshly resolved location stays cached.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Resolve the user's location.
    ///
    /// A `cached` location is returned as-is without touching the network.
    /// Otherwise at least one coordinate is required.
    #[instrument(skip(self), level = "info")]
    pub async fn resolve(
        &self,
        cached: Option<Location>,
        coords: Coordinates,
    ) -> Result<Location, WeatherError> {
        if let Some(location) = cached {
            tracing::debug!("Using cached location {:?}", location.city);
            return Ok(location);
        }

        if coords.is_empty() {
            tracing::warn!("Longitude and latitude were not found");
            return Err(WeatherError::CoordinatesUnavailable);
        }

        let location = match self.reverse_geocode(coords).await {
            Ok(location) => location,
            Err(e) => {
                tracing::error!("Reverse geocode failed: {}", e);
                return Err(e);
            }
        };

        if let Err(e) = self.store.save(&location, self.ttl) {
            tracing::warn!("Failed to cache resolved location: {}", e);
        }

        tracing::info!(
            "Resolved location to {} / {}",
            location.city.as_deref().unwrap_or("?"),
            location.state.as_deref().unwrap_or("?")
        );
        Ok(location)
    }

    async fn reverse_geocode(&self, coords: Coordinates) -> Result<Location, WeatherError> {
        let query = [
            ("lon", coordinate_param(coords.longitude)),
            ("lat", coordinate_param(coords.latitude)),
        ];
        let response = self
            .client
            .get(&self.client.endpoint(LOCATION_PATH), &query)
            .await?;
        ProviderClient::handle_response(response).await
    }
}

// A missing half is sent as `null`, the same text the page produced.
fn coordinate_param(value: Option<f64>) -> String {
    value.map_or_else(|| "null".to_string(), |v| v.to_string())
}
