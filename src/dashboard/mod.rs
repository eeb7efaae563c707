//! Dashboard — Axum JSON API over the aggregation pipeline.
//!
//! Any renderer can run cycles and read the view model section by section.
//! CORS enabled for local development.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

pub use routes::{AppState, DashboardState};

/// Serve the dashboard until the server stops or fails.
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind dashboard port {port}"))?;
    info!(port, "Dashboard server listening on http://localhost:{port}");

    axum::serve(listener, app)
        .await
        .context("Dashboard server error")
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/weather", get(routes::get_weather))
        .route("/api/weather/coords", get(routes::get_weather_by_coords))
        .route("/api/weather/locate", get(routes::get_weather_by_ip))
        .route("/api/view", get(routes::get_view))
        .route("/api/view/:section", get(routes::get_section))
        .route("/api/historical", get(routes::get_historical))
        .route("/api/search", get(routes::get_search))
        .route("/api/status", get(routes::get_status))
        .route("/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
