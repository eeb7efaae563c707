//! Location resolution.
//!
//! Turns a `LocationQuery` into the location the weather API reports for
//! it. Text and coordinate queries go through `current.json` and take the
//! response's own location fields as canonical. The IP path asks
//! `ip.json` for a city and falls back to the configured default when it
//! cannot get one.
//!
//! The resolver has no side effects; the aggregator decides when the
//! session's current location changes.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::gateway::WeatherApi;
use crate::types::{IpLocation, LocationQuery, ResolutionError, ResolvedLocation};

pub struct LocationResolver {
    api: Arc<dyn WeatherApi>,
    default_location: String,
}

impl LocationResolver {
    pub fn new(api: Arc<dyn WeatherApi>, default_location: impl Into<String>) -> Self {
        Self {
            api,
            default_location: default_location.into(),
        }
    }

    pub fn default_location(&self) -> &str {
        &self.default_location
    }

    pub async fn resolve(&self, query: &LocationQuery) -> Result<ResolvedLocation, ResolutionError> {
        match query {
            LocationQuery::Text(text) => self.resolve_text(text).await,
            LocationQuery::Coordinates { latitude, longitude } => {
                self.resolve_coordinates(*latitude, *longitude).await
            }
            LocationQuery::Ip => self.resolve_ip().await,
        }
    }

    async fn resolve_text(&self, text: &str) -> Result<ResolvedLocation, ResolutionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ResolutionError::NotFound {
                query: String::new(),
                reason: "empty query".to_string(),
            });
        }
        self.lookup(text).await
    }

    async fn resolve_coordinates(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<ResolvedLocation, ResolutionError> {
        let query = format!("{latitude},{longitude}");
        let in_range = (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude);
        if !in_range {
            return Err(ResolutionError::NotFound {
                query,
                reason: "coordinates out of range".to_string(),
            });
        }
        self.lookup(&query).await
    }

    /// IP lookup never fails the cycle: a missing city or a failed lookup
    /// both resolve the default location instead.
    async fn resolve_ip(&self) -> Result<ResolvedLocation, ResolutionError> {
        let query = match self.api.ip_lookup().await {
            Ok(ip) => match city_query(&ip) {
                Some(q) => q,
                None => {
                    debug!(default = %self.default_location, "IP lookup returned no city");
                    self.default_location.clone()
                }
            },
            Err(e) => {
                warn!(error = %e, default = %self.default_location, "IP lookup failed, using default location");
                self.default_location.clone()
            }
        };
        self.lookup(&query).await
    }

    async fn lookup(&self, query: &str) -> Result<ResolvedLocation, ResolutionError> {
        let report = self
            .api
            .current(query)
            .await
            .map_err(|e| ResolutionError::from_gateway(query, e))?;
        debug!(query, resolved = %report.location, "Location resolved");
        Ok(report.location)
    }
}

fn city_query(ip: &IpLocation) -> Option<String> {
    let city = ip.city.as_deref().map(str::trim).filter(|c| !c.is_empty())?;
    let country = ip.country.as_deref().unwrap_or_default();
    Some(ResolvedLocation::canonical_query(city, country))
}
