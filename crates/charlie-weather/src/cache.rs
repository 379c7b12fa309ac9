//! Persistence of the resolved location between sessions.
//!
//! The record is stored under a fixed key as a JSON-encoded [`Location`]
//! together with its expiry. Expired records read as absent; the resolver
//! never checks expiry itself.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::types::{Location, WeatherError};

/// Key the location record is stored under.
pub const LOCATION_CACHE_KEY: &str = "@challenge-charlie";

/// Default lifetime of a cached location.
pub const DEFAULT_LOCATION_TTL: Duration = Duration::from_secs(4 * 60 * 60);

/// Storage for the single cached location record.
pub trait LocationStore: Send + Sync {
    /// The cached location, if one exists and has not expired.
    fn load(&self) -> Option<Location>;

    /// Replace the cached location, valid for `ttl` from now.
    fn save(&self, location: &Location, ttl: Duration) -> Result<(), WeatherError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    key: String,
    /// JSON-encoded `Location`
    value: String,
    expires_at: DateTime<Utc>,
}

impl StoredRecord {
    fn new(location: &Location, ttl: Duration) -> Result<Self, WeatherError> {
        let value =
            serde_json::to_string(location).map_err(|e| WeatherError::Cache(e.to_string()))?;
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .ok_or_else(|| WeatherError::Cache(format!("location lifetime {:?} is out of range", ttl)))?;

        Ok(Self {
            key: LOCATION_CACHE_KEY.to_string(),
            value,
            expires_at,
        })
    }

    fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    fn location(&self) -> Option<Location> {
        if self.key != LOCATION_CACHE_KEY || self.is_expired() {
            return None;
        }
        match serde_json::from_str(&self.value) {
            Ok(location) => Some(location),
            Err(e) => {
                tracing::warn!("Discarding unreadable cached location: {}", e);
                None
            }
        }
    }
}

/// Location record kept in a JSON file.
#[derive(Debug)]
pub struct FileLocationStore {
    cache_path: PathBuf,
}

impl FileLocationStore {
    pub fn new(cache_path: impl Into<PathBuf>) -> Self {
        Self {
            cache_path: cache_path.into(),
        }
    }

    /// Store placed in `config_dir/location.json`.
    pub fn in_dir(config_dir: &Path) -> Self {
        Self::new(config_dir.join("location.json"))
    }

    pub fn path(&self) -> &Path {
        &self.cache_path
    }
}

impl LocationStore for FileLocationStore {
    fn load(&self) -> Option<Location> {
        let json = match std::fs::read_to_string(&self.cache_path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", self.cache_path.display(), e);
                return None;
            }
        };

        let record: StoredRecord = match serde_json::from_str(&json) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Cached location file is malformed: {}", e);
                return None;
            }
        };

        if record.is_expired() {
            tracing::debug!("Cached location expired at {}", record.expires_at);
        }
        record.location()
    }

    fn save(&self, location: &Location, ttl: Duration) -> Result<(), WeatherError> {
        let record = StoredRecord::new(location, ttl)?;

        if let Some(parent) = self.cache_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| WeatherError::Cache(e.to_string()))?;
        }

        let json = serde_json::to_string_pretty(&record)
            .map_err(|e| WeatherError::Cache(e.to_string()))?;
        std::fs::write(&self.cache_path, json).map_err(|e| WeatherError::Cache(e.to_string()))?;

        tracing::info!(
            "Cached location at {:?} until {}",
            self.cache_path,
            record.expires_at
        );
        Ok(())
    }
}

/// In-process location record, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryLocationStore {
    record: Mutex<Option<StoredRecord>>,
}

impl MemoryLocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a location valid for the default lifetime.
    pub fn with_location(location: &Location) -> Result<Self, WeatherError> {
        let store = Self::new();
        store.save(location, DEFAULT_LOCATION_TTL)?;
        Ok(store)
    }
}

impl LocationStore for MemoryLocationStore {
    fn load(&self) -> Option<Location> {
        self.record.lock().as_ref().and_then(StoredRecord::location)
    }

    fn save(&self, location: &Location, ttl: Duration) -> Result<(), WeatherError> {
        let record = StoredRecord::new(location, ttl)?;
        *self.record.lock() = Some(record);
        Ok(())
    }
}
