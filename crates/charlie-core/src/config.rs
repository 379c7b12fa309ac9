use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

const APP_DIR_NAME: &str = "challenge-charlie";
const DEFAULT_API_URL: &str = "http://localhost:3000";
const DEFAULT_DIRECTORY_URL: &str =
    "https://servicodados.ibge.gov.br/api/v1/localidades/municipios";
const DEFAULT_CACHE_TTL_HOURS: u32 = 4;

/// Upper bound for `location.cache_ttl_hours`: one year.
const MAX_CACHE_TTL_HOURS: u32 = 24 * 365;

/// One problem found in a config field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Outcome of [`Config::validate`]. Warnings never block a load.
#[derive(Debug, Clone, Default)]
pub struct ConfigReport {
    pub errors: Vec<ConfigIssue>,
    pub warnings: Vec<ConfigIssue>,
}

impl ConfigReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(ConfigIssue {
            field,
            message: message.into(),
        });
    }

    fn warn(&mut self, field: &'static str, message: impl Into<String>) {
        self.warnings.push(ConfigIssue {
            field,
            message: message.into(),
        });
    }

    /// All errors on one line, for the load failure.
    pub fn summary(&self) -> String {
        let issues: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        issues.join("; ")
    }
}

/// Provider endpoints must be absolute http(s) URLs.
fn endpoint_problem(raw: &str) -> Option<String> {
    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(e) => return Some(format!("Invalid URL: {}", e)),
    };
    if !matches!(url.scheme(), "http" | "https") {
        return Some(format!("URL must use http or https, got: {}", url.scheme()));
    }
    if url.host().is_none() {
        return Some("URL must have a host".to_string());
    }
    None
}

/// Preferred unit for the first render; the session can toggle it afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperaturePreference {
    #[default]
    Celsius,
    Fahrenheit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding config.toml and the cached location record
    pub config_dir: PathBuf,

    /// Provider endpoints
    #[serde(default)]
    pub api: ApiConfig,

    /// Location cache and fallback coordinates
    #[serde(default)]
    pub location: LocationConfig,

    /// Display preferences
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL serving /api/location, /api/weather and /api/forecast
    #[serde(default = "default_api_url")]
    pub base_url: String,

    /// Municipality registry endpoint
    #[serde(default = "default_directory_url")]
    pub directory_url: String,
}

fn default_api_url() -> String {
    std::env::var("CHARLIE_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string())
}

fn default_directory_url() -> String {
    DEFAULT_DIRECTORY_URL.to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            directory_url: default_directory_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Lifetime of the cached location record, in hours
    #[serde(default = "default_cache_ttl_hours")]
    pub cache_ttl_hours: u32,

    /// Coordinates reported as the device position, when known
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

fn default_cache_ttl_hours() -> u32 {
    DEFAULT_CACHE_TTL_HOURS
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            cache_ttl_hours: default_cache_ttl_hours(),
            latitude: None,
            longitude: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default)]
    pub temperature_unit: TemperaturePreference,
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME);

        Self {
            config_dir,
            api: ApiConfig::default(),
            location: LocationConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the user config directory, creating a default file if missing
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path, creating a default file if missing
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let mut config = Self::default();
            if let Some(parent) = config_path.parent() {
                config.config_dir = parent.to_path_buf();
            }
            config.save_to(config_path)?;
            tracing::info!("Wrote default configuration to {}", config_path.display());
            return Ok(config);
        }

        let contents =
            std::fs::read_to_string(config_path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Warnings are logged; any validation error fails the load.
    pub fn load_validated() -> Result<(Self, ConfigReport)> {
        let config = Self::load()?;
        let report = config.validate();

        if !report.is_valid() {
            return Err(ConfigError::Invalid(report.summary()).into());
        }

        for warning in &report.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, report))
    }

    /// Check endpoints, the cache lifetime and the configured coordinates.
    pub fn validate(&self) -> ConfigReport {
        let mut report = ConfigReport::default();

        for (field, raw) in [
            ("api.base_url", &self.api.base_url),
            ("api.directory_url", &self.api.directory_url),
        ] {
            if let Some(problem) = endpoint_problem(raw) {
                report.error(field, problem);
            }
        }

        match self.location.cache_ttl_hours {
            0 => report.error(
                "location.cache_ttl_hours",
                "Location cache lifetime must be greater than 0",
            ),
            hours if hours > MAX_CACHE_TTL_HOURS => report.error(
                "location.cache_ttl_hours",
                format!("Location cache lifetime must be at most {} hours", MAX_CACHE_TTL_HOURS),
            ),
            hours if hours > 24 => report.warn(
                "location.cache_ttl_hours",
                "Location cache lifetime is more than 24 hours",
            ),
            _ => {}
        }

        if let Some(lat) = self.location.latitude {
            if !(-90.0..=90.0).contains(&lat) {
                report.error("location.latitude", "Latitude must be within -90..=90");
            }
        }
        if let Some(lon) = self.location.longitude {
            if !(-180.0..=180.0).contains(&lon) {
                report.error("location.longitude", "Longitude must be within -180..=180");
            }
        }
        if self.location.latitude.is_some() != self.location.longitude.is_some() {
            report.warn(
                "location",
                "Only one coordinate is configured; the other will be sent as null",
            );
        }

        report
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Path of the cached location record
    pub fn location_cache_path(&self) -> PathBuf {
        self.config_dir.join("location.json")
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join(APP_DIR_NAME);

        Ok(config_dir.join("config.toml"))
    }
}
