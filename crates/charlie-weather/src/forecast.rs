//! Multi-day forecast for a city.

use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use tracing::instrument;

use crate::client::ProviderClient;
use crate::types::{ForecastEntry, WeatherError};
use crate::units::{normalize_city, to_celsius_display, to_fahrenheit_display};

const FORECAST_PATH: &str = "/api/forecast";

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    list: Vec<ForecastInterval>,
}

/// Raw interval as returned by the provider
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ForecastInterval {
    pub main: IntervalReadings,
    pub dt_txt: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IntervalReadings {
    pub temp: f64,
}

impl ForecastInterval {
    pub fn new(temp: f64, dt_txt: impl Into<String>) -> Self {
        Self {
            main: IntervalReadings { temp },
            dt_txt: dt_txt.into(),
        }
    }

    /// Calendar date of the interval, if the timestamp is recognisable.
    pub fn date(&self) -> Option<NaiveDate> {
        timestamp_date(&self.dt_txt)
    }

    fn into_entry(self) -> ForecastEntry {
        ForecastEntry {
            temperature_raw: self.main.temp,
            temperature_c: to_celsius_display(self.main.temp),
            temperature_f: to_fahrenheit_display(self.main.temp),
            timestamp: self.dt_txt,
        }
    }
}

fn timestamp_date(timestamp: &str) -> Option<NaiveDate> {
    let timestamp = timestamp.trim();
    NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.date())
        .or_else(|_| NaiveDate::parse_from_str(timestamp, "%Y-%m-%d"))
        .or_else(|_| NaiveDate::parse_from_str(timestamp, "%d/%m/%Y"))
        .ok()
}

/// Collapse repeated timestamps that fall on `today`.
///
/// An interval dated `today` is dropped when an earlier interval carries the
/// identical timestamp. Intervals on other dates are kept even when repeated.
pub fn dedup_intervals(list: Vec<ForecastInterval>, today: NaiveDate) -> Vec<ForecastInterval> {
    let mut kept: Vec<ForecastInterval> = Vec::with_capacity(list.len());
    let mut seen_today: Vec<String> = Vec::new();

    for interval in list {
        if interval.date() == Some(today) {
            if seen_today.contains(&interval.dt_txt) {
                tracing::trace!("Dropping repeated interval {}", interval.dt_txt);
                continue;
            }
            seen_today.push(interval.dt_txt.clone());
        }
        kept.push(interval);
    }

    kept
}

impl ProviderClient {
    /// Fetch the forecast for `city`, deduplicated against today's date.
    #[instrument(skip(self), level = "info")]
    pub async fn fetch_forecast(&self, city: &str) -> Result<Vec<ForecastEntry>, WeatherError> {
        self.fetch_forecast_on(city, Local::now().date_naive()).await
    }

    pub(crate) async fn fetch_forecast_on(
        &self,
        city: &str,
        today: NaiveDate,
    ) -> Result<Vec<ForecastEntry>, WeatherError> {
        let normalized = normalize_city(city);
        let response = self
            .get(&self.endpoint(FORECAST_PATH), &[("cidade", normalized.as_str())])
            .await?;
        let body: ForecastResponse = Self::handle_response(response).await?;

        let raw_len = body.list.len();
        let entries: Vec<ForecastEntry> = dedup_intervals(body.list, today)
            .into_iter()
            .map(ForecastInterval::into_entry)
            .collect();

        tracing::debug!("Forecast for {}: {} of {} intervals kept", normalized, entries.len(), raw_len);
        Ok(entries)
    }
}
