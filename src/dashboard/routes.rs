//! Dashboard API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<DashboardState>`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};

use crate::engine::{Aggregator, SessionStatus};
use crate::types::{
    AggregationError, GatewayError, HistoricalDay, LocationQuery, LocationSuggestion, Section,
    ViewModel,
};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub aggregator: Aggregator,
    pub started_at: DateTime<Utc>,
}

impl DashboardState {
    pub fn new(aggregator: Aggregator) -> Self {
        Self {
            aggregator,
            started_at: Utc::now(),
        }
    }
}

pub type AppState = Arc<DashboardState>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct WeatherParams {
    pub q: Option<String>,
    /// Wait for historical days and sports before answering.
    #[serde(default)]
    pub settle: bool,
}

#[derive(Debug, Deserialize)]
pub struct CoordinateParams {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub settle: bool,
}

#[derive(Debug, Deserialize)]
pub struct LocateParams {
    #[serde(default)]
    pub settle: bool,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub session: SessionStatus,
    pub sections: Vec<Section>,
    pub uptime_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub detail: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ApiError {
    Aggregation(AggregationError),
    Gateway(GatewayError),
    NotFound(String),
}

impl From<AggregationError> for ApiError {
    fn from(e: AggregationError) -> Self {
        ApiError::Aggregation(e)
    }
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        ApiError::Gateway(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, detail) = match self {
            ApiError::Aggregation(e) => {
                let status = match e {
                    AggregationError::Superseded { .. } => StatusCode::CONFLICT,
                    ref e if e.is_location_not_found() => StatusCode::NOT_FOUND,
                    _ => StatusCode::BAD_GATEWAY,
                };
                (status, e.user_message(), e.to_string())
            }
            ApiError::Gateway(e) => (
                StatusCode::BAD_GATEWAY,
                "Could not reach the weather service. Please try again.".to_string(),
                e.to_string(),
            ),
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, "Not found".to_string(), what),
        };
        (status, Json(ErrorBody { error, detail })).into_response()
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

async fn run_cycle(
    state: &DashboardState,
    query: LocationQuery,
    settle: bool,
) -> Result<Json<ViewModel>, ApiError> {
    let result = match query {
        LocationQuery::Text(ref q) if q.trim().is_empty() => state.aggregator.refresh().await,
        query => state.aggregator.aggregate(query).await,
    };
    let cycle = result.map_err(|e| {
        error!(error = %e, "Aggregation cycle failed");
        e
    })?;

    if !settle {
        return Ok(Json(cycle.view));
    }
    cycle.pending.settle().await;
    let latest = state.aggregator.session().latest_view().await;
    Ok(Json(latest.unwrap_or(cycle.view)))
}

/// GET /api/weather?q=
///
/// Without `q`, reloads the session's current location.
pub async fn get_weather(
    State(state): State<AppState>,
    Query(params): Query<WeatherParams>,
) -> Result<Json<ViewModel>, ApiError> {
    let query = LocationQuery::Text(params.q.unwrap_or_default());
    run_cycle(&state, query, params.settle).await
}

/// GET /api/weather/coords?lat=&lon=
pub async fn get_weather_by_coords(
    State(state): State<AppState>,
    Query(params): Query<CoordinateParams>,
) -> Result<Json<ViewModel>, ApiError> {
    let query = LocationQuery::from_device(Some((params.lat, params.lon)));
    run_cycle(&state, query, params.settle).await
}

/// GET /api/weather/locate
pub async fn get_weather_by_ip(
    State(state): State<AppState>,
    Query(params): Query<LocateParams>,
) -> Result<Json<ViewModel>, ApiError> {
    run_cycle(&state, LocationQuery::from_device(None), params.settle).await
}

/// GET /api/view
pub async fn get_view(State(state): State<AppState>) -> Result<Json<ViewModel>, ApiError> {
    state
        .aggregator
        .session()
        .latest_view()
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No weather loaded yet".to_string()))
}

/// GET /api/view/:section
pub async fn get_section(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let section: Section = name
        .parse()
        .map_err(|e: anyhow::Error| ApiError::NotFound(e.to_string()))?;

    let view = state
        .aggregator
        .session()
        .latest_view()
        .await
        .ok_or_else(|| ApiError::NotFound("No weather loaded yet".to_string()))?;

    view.section(section)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Section {section} is not available")))
}

/// GET /api/historical
pub async fn get_historical(State(state): State<AppState>) -> Json<Vec<HistoricalDay>> {
    Json(state.aggregator.session().historical_window().await)
}

/// GET /api/search?q=
pub async fn get_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<LocationSuggestion>>, ApiError> {
    let suggestions = state.aggregator.suggest(&params.q).await.map_err(|e| {
        warn!(error = %e, "Location search failed");
        e
    })?;
    Ok(Json(suggestions))
}

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let session = state.aggregator.session();
    let sections = session
        .latest_view()
        .await
        .map(|v| v.present_sections())
        .unwrap_or_default();

    Json(StatusResponse {
        session: session.status().await,
        sections,
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
    })
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}
