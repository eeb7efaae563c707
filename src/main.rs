//! NIMBUS — Weather dashboard aggregation service
//!
//! Entry point. Loads configuration, initialises structured logging,
//! performs the implicit first load for the default location, and serves
//! the dashboard API until Ctrl+C.

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info, warn};

use nimbus::config::{self, AppConfig};
use nimbus::dashboard::{self, DashboardState};
use nimbus::engine::aggregator::{AggregatorOptions, Cycle};
use nimbus::engine::{Aggregator, Session};
use nimbus::gateway::{PlaceholderSportsFeed, SportsFeed, WeatherApi, WeatherApiClient};

const CONFIG_PATH: &str = "config.toml";

const BANNER: &str = r#"
 _   _ ___ __  __ ____  _   _ ____
| \ | |_ _|  \/  | __ )| | | / ___|
|  \| || || |\/| |  _ \| | | \___ \
| |\  || || |  | | |_) | |_| |___) |
|_| \_|___|_|  |_|____/ \___/|____/

  Weather dashboard aggregation service
"#;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let (cfg, found) = AppConfig::load_or_default(CONFIG_PATH)?;

    init_logging(&cfg);

    println!("{BANNER}");
    if !found {
        warn!(path = CONFIG_PATH, "Config file not found, using defaults");
    }
    info!(
        version = env!("CARGO_PKG_VERSION"),
        default_location = %cfg.location.default,
        forecast_days = cfg.api.forecast_days,
        history_days = cfg.history.days,
        "NIMBUS starting up"
    );

    // -- Initialise components -------------------------------------------

    let api: Arc<dyn WeatherApi> = Arc::new(WeatherApiClient::from_config(&cfg.api)?);

    let sports: Option<Arc<dyn SportsFeed>> = if cfg.sports.enabled {
        Some(Arc::new(PlaceholderSportsFeed::from_config(&cfg.sports)?))
    } else {
        info!("Sports section disabled");
        None
    };

    let session = Arc::new(Session::new(&cfg.location.default, cfg.history.window));
    let aggregator = Aggregator::new(
        api,
        sports,
        session.clone(),
        &cfg.location.default,
        AggregatorOptions::from_config(&cfg),
    );

    // -- Implicit first load ---------------------------------------------

    let pending = match aggregator.refresh().await {
        Ok(cycle) => {
            log_cycle(&cycle);
            Some(cycle.pending)
        }
        Err(e) => {
            error!(error = %e, notice = %e.user_message(), "Initial load failed");
            None
        }
    };

    if !cfg.dashboard.enabled {
        if let Some(pending) = pending {
            pending.settle().await;
        }
        let status = session.status().await;
        info!(
            location = %status.current_location,
            historical_days = status.historical_days,
            cycles = status.cycles_completed,
            "Dashboard disabled, exiting after first load"
        );
        return Ok(());
    }

    // -- Serve -----------------------------------------------------------

    let state = Arc::new(DashboardState::new(aggregator));
    info!("Serving dashboard. Press Ctrl+C to stop.");

    tokio::select! {
        result = dashboard::serve(state, cfg.dashboard.port) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received."),
    }

    let status = session.status().await;
    info!(
        location = %status.current_location,
        cycles = status.cycles_completed,
        "NIMBUS shut down cleanly."
    );

    Ok(())
}

/// Log a human-readable cycle summary.
fn log_cycle(cycle: &Cycle) {
    let sections: Vec<&str> = cycle
        .view
        .present_sections()
        .iter()
        .map(|s| s.name())
        .collect();
    info!(
        cycle = cycle.id(),
        location = %cycle.view.location,
        tz = %cycle.view.location.tz_id,
        sections = ?sections,
        pending = cycle.pending.len(),
        "Weather loaded"
    );
}

/// Initialise the `tracing` subscriber.
fn init_logging(cfg: &config::AppConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.logging.filter));

    let json_logging = cfg.logging.json || std::env::var("NIMBUS_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
