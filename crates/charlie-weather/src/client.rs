//! HTTP client shared by the location, weather, forecast and directory calls.

use charlie_core::{ApiConfig, NetworkError};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::types::WeatherError;

/// Thin wrapper around `reqwest::Client` holding the provider endpoints.
///
/// No request timeout is configured: provider calls run until they settle.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    client: Client,
    base_url: String,
    directory_url: String,
}

impl ProviderClient {
    pub fn new(base_url: &str, directory_url: &str) -> Result<Self, WeatherError> {
        let client = Client::builder().build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            directory_url: directory_url.to_string(),
        })
    }

    pub fn from_config(api: &ApiConfig) -> Result<Self, WeatherError> {
        Self::new(&api.base_url, &api.directory_url)
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn directory_url(&self) -> &str {
        &self.directory_url
    }

    pub(crate) async fn get<Q>(&self, url: &str, query: &Q) -> Result<reqwest::Response, WeatherError>
    where
        Q: serde::Serialize + ?Sized,
    {
        tracing::debug!("GET {}", url);
        Ok(self.client.get(url).query(query).send().await?)
    }

    /// Decode a JSON body, turning non-success statuses into upstream errors.
    pub(crate) async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, WeatherError> {
        let status = response.status();

        if status.is_success() {
            let body = response.bytes().await?;
            serde_json::from_slice(&body)
                .map_err(|e| WeatherError::Parse(format!("JSON parse error: {}", e)))
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(status_error(status, text))
        }
    }
}

fn status_error(status: StatusCode, message: String) -> WeatherError {
    WeatherError::Upstream(NetworkError::ServerError {
        status: status.as_u16(),
        message,
    })
}
