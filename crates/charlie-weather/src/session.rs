//! Session orchestration: location resolution, directory loading and
//! weather/forecast refreshes over a single owned state object.
//!
//! Consumers hold a cheap [`Session`] handle and observe state through
//! [`Session::snapshot`]. All writes go through `SessionState` setters; the
//! lock is never held across an `.await`.

use std::sync::Arc;
use std::time::Duration;

use charlie_core::Config;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::cache::{FileLocationStore, LocationStore, DEFAULT_LOCATION_TTL};
use crate::client::ProviderClient;
use crate::directory::Directory;
use crate::geocode::LocationResolver;
use crate::location::{FixedGeolocator, Geolocator};
use crate::types::{
    Coordinates, CurrentWeather, ForecastEntry, Location, Municipality,
    TemperatureUnit, WeatherError,
};

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Uninitialized,
    /// Waiting on the device position or the reverse geocoder
    Locating,
    /// A location has been adopted
    Ready,
}

/// Everything a page needs to render.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    phase: Phase,
    in_flight: usize,
    unit: TemperatureUnit,
    location: Option<Location>,
    weather: Option<CurrentWeather>,
    forecast: Option<Vec<ForecastEntry>>,
    directory: Option<Arc<Directory>>,
    notice: Option<String>,
}

impl SessionState {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// True while at least one weather or forecast fetch is in flight.
    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    pub fn temperature_unit(&self) -> TemperatureUnit {
        self.unit
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn weather(&self) -> Option<&CurrentWeather> {
        self.weather.as_ref()
    }

    pub fn forecast(&self) -> Option<&[ForecastEntry]> {
        self.forecast.as_deref()
    }

    /// `None` until the directory has loaded.
    pub fn directory(&self) -> Option<&Directory> {
        self.directory.as_deref()
    }

    pub fn city_names(&self) -> Option<&[String]> {
        self.directory().map(|d| d.names.as_slice())
    }

    pub fn municipalities(&self) -> Option<&[Municipality]> {
        self.directory().map(|d| d.municipalities.as_slice())
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Current temperature formatted in the preferred unit.
    pub fn temperature_display(&self) -> Option<&str> {
        self.weather.as_ref().map(|w| match self.unit {
            TemperatureUnit::Celsius => w.temperature_c.as_str(),
            TemperatureUnit::Fahrenheit => w.temperature_f.as_str(),
        })
    }

    fn set_phase(&mut self, phase: Phase) {
        tracing::debug!("Session phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    fn set_location(&mut self, location: Location) {
        self.location = Some(location);
        self.fill_missing_state();
        self.set_phase(Phase::Ready);
    }

    fn set_weather(&mut self, weather: CurrentWeather) {
        self.weather = Some(weather);
    }

    fn set_forecast(&mut self, forecast: Vec<ForecastEntry>) {
        self.forecast = Some(forecast);
    }

    fn set_directory(&mut self, directory: Directory) {
        self.directory = Some(Arc::new(directory));
        self.fill_missing_state();
    }

    /// Take the state from the directory when the geocoder left it out.
    fn fill_missing_state(&mut self) {
        let (Some(location), Some(directory)) = (self.location.as_mut(), self.directory.as_deref())
        else {
            return;
        };
        if location.state.is_some() {
            return;
        }
        if let Some(found) = location.city().and_then(|city| directory.find(city)) {
            tracing::debug!("Filled state {} for {}", found.state, found.city);
            location.state = Some(found.state.clone());
        }
    }

    fn set_notice(&mut self, notice: impl Into<String>) {
        self.notice = Some(notice.into());
    }

    fn toggle_unit(&mut self) -> TemperatureUnit {
        self.unit = self.unit.toggle();
        self.unit
    }

    fn begin_fetch(&mut self) {
        self.in_flight += 1;
    }

    fn end_fetch(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }
}

/// Clears its share of the loading flag however the fetch ends.
struct LoadingGuard<'a> {
    state: &'a RwLock<SessionState>,
}

impl<'a> LoadingGuard<'a> {
    fn begin(state: &'a RwLock<SessionState>) -> Self {
        state.write().begin_fetch();
        Self { state }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state.write().end_fetch();
    }
}

/// Tunables for a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub unit: TemperatureUnit,
    pub location_ttl: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            unit: TemperatureUnit::default(),
            location_ttl: DEFAULT_LOCATION_TTL,
        }
    }
}

struct SessionInner {
    client: ProviderClient,
    resolver: LocationResolver,
    store: Arc<dyn LocationStore>,
    geolocator: Arc<dyn Geolocator>,
    state: RwLock<SessionState>,
    directory_task: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to a weather session. Clones share the same state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    pub fn new(
        client: ProviderClient,
        store: Arc<dyn LocationStore>,
        geolocator: Arc<dyn Geolocator>,
        options: SessionOptions,
    ) -> Self {
        let resolver =
            LocationResolver::new(client.clone(), Arc::clone(&store)).with_ttl(options.location_ttl);
        let state = SessionState {
            unit: options.unit,
            ..SessionState::default()
        };

        Self {
            inner: Arc::new(SessionInner {
                client,
                resolver,
                store,
                geolocator,
                state: RwLock::new(state),
                directory_task: Mutex::new(None),
            }),
        }
    }

    /// Session backed by the on-disk location record and configured coordinates.
    pub fn from_config(config: &Config) -> Result<Self, WeatherError> {
        let client = ProviderClient::from_config(&config.api)?;
        let store = Arc::new(FileLocationStore::new(config.location_cache_path()));
        let geolocator = Arc::new(FixedGeolocator::from_config(&config.location));
        let options = SessionOptions {
            unit: config.display.temperature_unit.into(),
            location_ttl: Duration::from_secs(u64::from(config.location.cache_ttl_hours) * 3600),
        };

        Ok(Self::new(client, store, geolocator, options))
    }

    /// Kick off the directory load and resolve the location.
    ///
    /// Returns once the location step settles. If a location is adopted, the
    /// first weather and forecast refreshes have completed too. Without a
    /// position the session stays in [`Phase::Locating`].
    pub async fn start(&self) {
        {
            let mut state = self.inner.state.write();
            if state.phase() != Phase::Uninitialized {
                tracing::warn!("Session already started");
                return;
            }
            state.set_phase(Phase::Locating);
        }

        self.spawn_directory_load();

        let cached = self.inner.store.load();
        let coords = if cached.is_some() {
            Coordinates::default()
        } else {
            match self.inner.geolocator.current_position().await {
                Ok(coords) => coords,
                Err(e) => {
                    tracing::warn!("Device position unavailable: {}", e);
                    return;
                }
            }
        };

        match self.inner.resolver.resolve(cached, coords).await {
            Ok(location) => self.adopt_location(location).await,
            Err(e) => tracing::warn!("Location not resolved: {}", e),
        }
    }

    async fn adopt_location(&self, location: Location) {
        let city = location.city().map(str::to_owned);
        self.inner.state.write().set_location(location);

        match city {
            Some(city) => {
                tokio::join!(self.refresh_weather(&city), self.refresh_forecast(&city));
            }
            None => tracing::info!("Resolved location has no city; skipping weather"),
        }
    }

    fn spawn_directory_load(&self) {
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            match inner.client.load_directory().await {
                Ok(directory) => inner.state.write().set_directory(directory),
                Err(e) => tracing::error!("Failed to load municipality directory: {}", e),
            }
        });
        *self.inner.directory_task.lock() = Some(handle);
    }

    /// Wait for the background directory load started by [`Session::start`].
    pub async fn wait_for_directory(&self) {
        let handle = self.inner.directory_task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!("Directory task failed: {}", e);
            }
        }
    }

    /// Refresh current weather for `city`. Errors are logged and leave a
    /// user notice; they are never returned.
    ///
    /// Overlapping calls are not deduplicated; the last to finish wins.
    pub async fn refresh_weather(&self, city: &str) {
        let _loading = LoadingGuard::begin(&self.inner.state);

        match self.inner.client.fetch_weather(city).await {
            Ok(weather) => self.inner.state.write().set_weather(weather),
            Err(e) => {
                tracing::error!("Failed to refresh weather for {}: {}", city, e);
                self.inner.state.write().set_notice(e.user_message());
            }
        }
    }

    /// Refresh the forecast for `city`. Errors are logged, never returned.
    pub async fn refresh_forecast(&self, city: &str) {
        let _loading = LoadingGuard::begin(&self.inner.state);

        match self.inner.client.fetch_forecast(city).await {
            Ok(forecast) => self.inner.state.write().set_forecast(forecast),
            Err(e) => tracing::error!("Failed to refresh forecast for {}: {}", city, e),
        }
    }

    /// Flip the display unit. No data is refetched.
    pub fn toggle_temperature_unit(&self) -> TemperatureUnit {
        self.inner.state.write().toggle_unit()
    }

    /// Take the pending user notice, if any.
    pub fn take_notice(&self) -> Option<String> {
        self.inner.state.write().notice.take()
    }

    /// Autocomplete over the loaded directory; empty until it has loaded.
    pub fn suggest_cities(&self, query: &str, limit: usize) -> Vec<Municipality> {
        let directory = self.inner.state.read().directory.clone();
        directory
            .map(|d| d.suggest(query, limit).into_iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> SessionState {
        self.inner.state.read().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.read().is_loading()
    }

    pub fn phase(&self) -> Phase {
        self.inner.state.read().phase()
    }
}
