//! Current conditions for a city.

use reqwest::StatusCode;
use serde::Deserialize;
use tracing::instrument;

use crate::client::ProviderClient;
use crate::types::{CurrentWeather, WeatherError};
use crate::units::{normalize_city, to_celsius_display, to_fahrenheit_display};

const WEATHER_PATH: &str = "/api/weather";

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    main: MainReadings,
    weather: Vec<ConditionSummary>,
    wind: WindReadings,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f64,
    humidity: f64,
    pressure: f64,
}

#[derive(Debug, Deserialize)]
struct ConditionSummary {
    icon: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct WindReadings {
    deg: f64,
    speed: f64,
}

/// Error body some providers return with a 200 status
#[derive(Debug, Deserialize)]
struct ProviderStatus {
    cod: Option<serde_json::Value>,
    message: Option<String>,
}

impl ProviderStatus {
    fn is_not_found(&self) -> bool {
        match &self.cod {
            Some(serde_json::Value::String(s)) => s == "404",
            Some(serde_json::Value::Number(n)) => n.as_u64() == Some(404),
            _ => false,
        }
    }
}

impl WeatherResponse {
    fn into_current(self) -> Result<CurrentWeather, WeatherError> {
        let condition = self
            .weather
            .into_iter()
            .next()
            .ok_or_else(|| WeatherError::Parse("weather list is empty".to_string()))?;

        Ok(CurrentWeather {
            temperature_raw: self.main.temp,
            temperature_c: to_celsius_display(self.main.temp),
            temperature_f: to_fahrenheit_display(self.main.temp),
            humidity: self.main.humidity,
            pressure: self.main.pressure,
            icon: condition.icon,
            description: condition.description,
            wind_degrees: self.wind.deg,
            wind_speed: self.wind.speed,
        })
    }
}

impl ProviderClient {
    /// Fetch current weather for `city`. Accents are stripped before the request.
    #[instrument(skip(self), level = "info")]
    pub async fn fetch_weather(&self, city: &str) -> Result<CurrentWeather, WeatherError> {
        let normalized = normalize_city(city);
        let response = self
            .get(&self.endpoint(WEATHER_PATH), &[("cidade", normalized.as_str())])
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(WeatherError::CityNotFound(normalized));
        }

        let body: serde_json::Value = Self::handle_response(response).await?;

        if let Ok(status) = serde_json::from_value::<ProviderStatus>(body.clone()) {
            if status.is_not_found() {
                tracing::debug!("Provider reported {:?}", status.message);
                return Err(WeatherError::CityNotFound(normalized));
            }
        }

        let payload: WeatherResponse = serde_json::from_value(body)
            .map_err(|e| WeatherError::Parse(format!("weather payload: {}", e)))?;
        payload.into_current()
    }
}
