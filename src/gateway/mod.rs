//! Remote data sources.
//!
//! Defines the `WeatherApi` and `SportsFeed` traits the engine depends on,
//! plus the HTTP implementations for weatherapi.com and the placeholder
//! sports feed.

pub mod sports;
pub mod weatherapi;

use async_trait::async_trait;
use chrono::NaiveDate;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::types::{
    CurrentReport, ForecastOptions, ForecastReport, GatewayError, HistoricalDay, IpLocation,
    LocationSuggestion, SportsEvent,
};

pub use sports::PlaceholderSportsFeed;
pub use weatherapi::WeatherApiClient;

/// Typed access to the weather API endpoints.
///
/// One call per endpoint, no retries: a failed call is returned to the
/// caller as-is.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WeatherApi: Send + Sync {
    /// `current.json` with air quality.
    async fn current(&self, query: &str) -> Result<CurrentReport, GatewayError>;

    /// `forecast.json`.
    async fn forecast(
        &self,
        query: &str,
        options: ForecastOptions,
    ) -> Result<ForecastReport, GatewayError>;

    /// `history.json` for a single calendar day.
    async fn history(&self, query: &str, date: NaiveDate) -> Result<HistoricalDay, GatewayError>;

    /// `search.json` autocomplete.
    async fn search(&self, prefix: &str) -> Result<Vec<LocationSuggestion>, GatewayError>;

    /// `ip.json` for the caller's own address.
    async fn ip_lookup(&self) -> Result<IpLocation, GatewayError>;
}

/// Source of fixtures for the sports panel.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SportsFeed: Send + Sync {
    async fn fixtures(&self) -> Result<Vec<SportsEvent>, GatewayError>;
}

/// Error body the weather API returns alongside a non-success status.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// GET `url` and decode the body as `T`.
///
/// Non-success statuses become `NotFound` (with the API's own message when
/// it sent one), transport failures `Network`, and any body that does not
/// match `T` becomes `Decode`. Transport errors are stripped of their URL so
/// query-string secrets never reach the logs.
pub(crate) async fn get_json<T: DeserializeOwned>(
    http: &Client,
    endpoint: &'static str,
    url: &str,
) -> Result<T, GatewayError> {
    let network = |e: reqwest::Error| GatewayError::Network {
        endpoint,
        message: e.without_url().to_string(),
    };

    let resp = http.get(url).send().await.map_err(network)?;
    let status = resp.status();
    let body = resp.text().await.map_err(network)?;

    if !status.is_success() {
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|b| b.error.message)
            .unwrap_or_else(|_| status.canonical_reason().unwrap_or("request failed").to_string());
        debug!(endpoint, status = status.as_u16(), %message, "Request rejected");
        return Err(GatewayError::NotFound {
            endpoint,
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&body).map_err(|e| GatewayError::Decode {
        endpoint,
        message: e.to_string(),
    })
}
