//! Weather session for Challenge Charlie
//!
//! Resolves the user's city from device coordinates (cached for a few
//! hours), fetches current conditions and the forecast for it, and loads the
//! municipality directory used for city search.

pub mod cache;
pub mod client;
pub mod directory;
pub mod forecast;
pub mod geocode;
pub mod location;
pub mod session;
pub mod types;
pub mod units;
pub mod weather;

pub use cache::{FileLocationStore, LocationStore, MemoryLocationStore, LOCATION_CACHE_KEY};
pub use client::ProviderClient;
pub use directory::Directory;
pub use forecast::dedup_intervals;
pub use geocode::LocationResolver;
pub use location::{FixedGeolocator, Geolocator};
pub use session::{Phase, Session, SessionOptions, SessionState};
pub use types::*;
pub use units::{normalize_city, to_celsius_display, to_fahrenheit_display};
