//! Aggregation cycle orchestrator.
//!
//! One cycle:
//! 1. resolve the location (fatal on failure)
//! 2. fetch current conditions and the forecast together; both must succeed
//! 3. assemble the view model and commit it to the session
//! 4. spawn one history request per preceding day, plus the sports feed
//!
//! Step 4 runs in the background. Each task is tagged with the cycle id and
//! the session drops its result if another cycle has committed since. A
//! failed day is logged and left out; the sports panel falls back to fixed
//! fixtures.

use chrono::{Days, NaiveDate, NaiveDateTime, Timelike, Utc};
use futures::future::join_all;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::resolver::LocationResolver;
use super::session::Session;
use crate::config::AppConfig;
use crate::gateway::sports::fixtures_or_fallback;
use crate::gateway::{SportsFeed, WeatherApi};
use crate::types::{
    AggregationError, AirQualitySummary, CurrentReport, CycleId, ForecastDay, ForecastOptions,
    ForecastReport, GatewayError, HourlyForecast, LocationQuery, LocationSuggestion,
    ResolvedLocation, TimezoneInfo, ViewModel,
};

/// Days shown in the short forecast section.
const SHORT_FORECAST_DAYS: usize = 3;

/// Hourly records shown from the location's current hour onwards.
const HOURLY_WINDOW: usize = 24;

/// Search prefixes shorter than this return no suggestions.
const MIN_SEARCH_CHARS: usize = 3;

#[derive(Debug, Clone)]
pub struct AggregatorOptions {
    pub forecast: ForecastOptions,
    /// Number of preceding days requested from the history endpoint.
    pub history_days: u32,
    pub reset_history_on_location_change: bool,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self {
            forecast: ForecastOptions::default(),
            history_days: 7,
            reset_history_on_location_change: false,
        }
    }
}

impl AggregatorOptions {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            forecast: ForecastOptions {
                days: cfg.api.forecast_days,
                ..ForecastOptions::default()
            },
            history_days: cfg.history.days,
            reset_history_on_location_change: cfg.history.reset_on_location_change,
        }
    }
}

/// Result of a committed cycle.
#[derive(Debug)]
pub struct Cycle {
    /// The view as committed. Historical days and sports arrive later
    /// through the session.
    pub view: ViewModel,
    pub pending: PendingSections,
}

impl Cycle {
    pub fn id(&self) -> CycleId {
        self.view.cycle
    }
}

/// Background fetches still running for a cycle.
#[derive(Debug, Default)]
pub struct PendingSections {
    handles: Vec<JoinHandle<()>>,
}

impl PendingSections {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every background fetch to finish.
    pub async fn settle(self) {
        for result in join_all(self.handles).await {
            if let Err(e) = result {
                warn!(error = %e, "Background section task did not complete");
            }
        }
    }
}

pub struct Aggregator {
    api: Arc<dyn WeatherApi>,
    sports: Option<Arc<dyn SportsFeed>>,
    resolver: LocationResolver,
    session: Arc<Session>,
    options: AggregatorOptions,
}

impl Aggregator {
    /// `sports` of `None` disables the sports section.
    pub fn new(
        api: Arc<dyn WeatherApi>,
        sports: Option<Arc<dyn SportsFeed>>,
        session: Arc<Session>,
        default_location: impl Into<String>,
        options: AggregatorOptions,
    ) -> Self {
        Self {
            resolver: LocationResolver::new(api.clone(), default_location),
            api,
            sports,
            session,
            options,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Run one cycle for `query`.
    ///
    /// Returns once the view is committed; historical days and sports keep
    /// loading in the background (see `Cycle::pending`).
    pub async fn aggregate(&self, query: LocationQuery) -> Result<Cycle, AggregationError> {
        let cycle = self.session.begin_cycle();
        info!(cycle, query = %query, "Starting aggregation cycle");

        let location = self.resolver.resolve(&query).await?;

        let (current, forecast) = tokio::join!(
            self.api.current(&location.query),
            self.api.forecast(&location.query, self.options.forecast),
        );
        let not_found = |source: GatewayError| AggregationError::LocationNotFound {
            location: location.query.clone(),
            source,
        };
        let current = current.map_err(not_found)?;
        let forecast = forecast.map_err(not_found)?;

        let view = assemble(cycle, location, current, forecast);
        let view = self
            .session
            .commit(view, self.options.reset_history_on_location_change)
            .await
            .ok_or(AggregationError::Superseded { cycle })?;

        let pending = self.spawn_background(cycle, &view.location.query);
        debug!(cycle, pending = pending.len(), "Background sections started");

        Ok(Cycle { view, pending })
    }

    /// Implicit reload for the session's current location.
    pub async fn refresh(&self) -> Result<Cycle, AggregationError> {
        let location = self.session.current_location().await;
        self.aggregate(LocationQuery::Text(location)).await
    }

    /// Autocomplete suggestions for a partial location name.
    pub async fn suggest(&self, prefix: &str) -> Result<Vec<LocationSuggestion>, GatewayError> {
        let prefix = prefix.trim();
        if prefix.chars().count() < MIN_SEARCH_CHARS {
            return Ok(Vec::new());
        }
        self.api.search(prefix).await
    }

    fn spawn_background(&self, cycle: CycleId, query: &str) -> PendingSections {
        let today = Utc::now().date_naive();
        let mut handles: Vec<JoinHandle<()>> = historical_dates(today, self.options.history_days)
            .into_iter()
            .map(|date| {
                let api = self.api.clone();
                let session = self.session.clone();
                let query = query.to_string();
                tokio::spawn(async move {
                    match api.history(&query, date).await {
                        Ok(day) => {
                            if let Some(window) = session.ingest_historical(cycle, day).await {
                                debug!(cycle, %date, days = window.len(), "Historical day added");
                            }
                        }
                        Err(e) => warn!(cycle, %date, error = %e, "Historical day unavailable"),
                    }
                })
            })
            .collect();

        if let Some(feed) = self.sports.clone() {
            let session = self.session.clone();
            handles.push(tokio::spawn(async move {
                let events = fixtures_or_fallback(feed.fixtures().await);
                session.attach_sports(cycle, events).await;
            }));
        }

        PendingSections { handles }
    }
}

/// The `days` calendar days before `today`, most recent first.
pub fn historical_dates(today: NaiveDate, days: u32) -> Vec<NaiveDate> {
    (1..=u64::from(days))
        .filter_map(|offset| today.checked_sub_days(Days::new(offset)))
        .collect()
}

/// Build the cycle's view from the two core responses.
pub fn assemble(
    cycle: CycleId,
    location: ResolvedLocation,
    current: CurrentReport,
    forecast: ForecastReport,
) -> ViewModel {
    let mut view = ViewModel::empty(cycle, location);
    let conditions = current.conditions;

    view.air_quality = conditions.air_quality.clone().map(AirQualitySummary::from);
    view.current = Some(conditions);
    view.timezone = Some(TimezoneInfo::from(&view.location));
    view.alerts = Some(forecast.alerts);

    let days = forecast.days;
    if !days.is_empty() {
        view.hourly = Some(upcoming_hours(&days, view.location.local_time, HOURLY_WINDOW));
        view.astronomy = days.first().map(|d| d.astronomy.clone());
        view.forecast = Some(days.iter().take(SHORT_FORECAST_DAYS).cloned().collect());
        view.week_forecast = Some(days);
    }

    view
}

/// Up to `count` hourly records starting at the hour containing
/// `local_time`, continuing into following days.
pub fn upcoming_hours(
    days: &[ForecastDay],
    local_time: NaiveDateTime,
    count: usize,
) -> Vec<HourlyForecast> {
    let start = local_time
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(local_time);

    days.iter()
        .flat_map(|d| d.hours.iter())
        .filter(|h| h.time >= start)
        .take(count)
        .cloned()
        .collect()
}
