//! Session context shared by every aggregation cycle.
//!
//! Created once at startup and dropped at exit. Holds the current location
//! used for implicit refreshes, the historical window, and the latest
//! committed view. All of it sits behind one `RwLock` so an ingestion, the
//! window read-back and the view update happen under a single guard.
//!
//! Cycle identity: each cycle takes a fresh id from `begin_cycle`. Once a
//! cycle commits it becomes the active cycle, and late results tagged with
//! any other id are dropped.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::accumulator::HistoricalAccumulator;
use crate::types::{CycleId, HistoricalDay, SportsEvent, ViewModel};

#[derive(Debug)]
struct SessionState {
    current_location: String,
    active_cycle: Option<CycleId>,
    history: HistoricalAccumulator,
    view: Option<ViewModel>,
    cycles_completed: u64,
}

/// Snapshot for status endpoints and logs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub current_location: String,
    pub active_cycle: Option<CycleId>,
    pub cycles_completed: u64,
    pub historical_days: usize,
    pub has_view: bool,
}

#[derive(Debug)]
pub struct Session {
    state: RwLock<SessionState>,
    next_cycle: AtomicU64,
}

impl Session {
    pub fn new(default_location: impl Into<String>, history_window: usize) -> Self {
        Self {
            state: RwLock::new(SessionState {
                current_location: default_location.into(),
                active_cycle: None,
                history: HistoricalAccumulator::with_capacity(history_window),
                view: None,
                cycles_completed: 0,
            }),
            next_cycle: AtomicU64::new(1),
        }
    }

    /// Allocate the id for a new cycle. Ids increase monotonically.
    pub fn begin_cycle(&self) -> CycleId {
        self.next_cycle.fetch_add(1, Ordering::Relaxed)
    }

    /// Canonical query of the last committed location, or the default.
    pub async fn current_location(&self) -> String {
        self.state.read().await.current_location.clone()
    }

    pub async fn active_cycle(&self) -> Option<CycleId> {
        self.state.read().await.active_cycle
    }

    /// Make `view` the active cycle's view and adopt its location.
    ///
    /// Returns `None` when a newer cycle has already committed. Otherwise
    /// returns the stored view with the current historical window filled
    /// in. With `reset_history` set, moving to a different location clears
    /// the window first.
    pub async fn commit(&self, mut view: ViewModel, reset_history: bool) -> Option<ViewModel> {
        let mut state = self.state.write().await;

        if state.active_cycle.is_some_and(|active| active > view.cycle) {
            debug!(cycle = view.cycle, active = ?state.active_cycle, "Discarding commit from stale cycle");
            return None;
        }

        if reset_history && state.current_location != view.location.query {
            debug!(from = %state.current_location, to = %view.location.query, "Location changed, clearing history");
            state.history.clear();
        }

        state.current_location = view.location.query.clone();
        state.active_cycle = Some(view.cycle);
        state.cycles_completed += 1;
        view.historical = window_section(&state.history);
        state.view = Some(view.clone());

        info!(cycle = view.cycle, location = %view.location.query, "Cycle committed");
        Some(view)
    }

    /// Feed one historical day from `cycle` into the window.
    ///
    /// Returns the updated window, or `None` when `cycle` is no longer the
    /// active cycle and the day was dropped.
    pub async fn ingest_historical(
        &self,
        cycle: CycleId,
        day: HistoricalDay,
    ) -> Option<Vec<HistoricalDay>> {
        let mut state = self.state.write().await;
        if state.active_cycle != Some(cycle) {
            debug!(cycle, date = %day.date, active = ?state.active_cycle, "Discarding stale historical day");
            return None;
        }

        if !state.history.ingest(day) {
            debug!(cycle, "Historical date already present, keeping first");
        }
        let window = state.history.window().to_vec();
        if let Some(view) = state.view.as_mut() {
            view.historical = Some(window.clone());
        }
        Some(window)
    }

    /// Attach sports fixtures to the active view. Returns `false` when
    /// `cycle` is stale.
    pub async fn attach_sports(&self, cycle: CycleId, events: Vec<SportsEvent>) -> bool {
        let mut state = self.state.write().await;
        if state.active_cycle != Some(cycle) {
            debug!(cycle, active = ?state.active_cycle, "Discarding stale sports fixtures");
            return false;
        }
        if let Some(view) = state.view.as_mut() {
            view.sports = Some(events);
        }
        true
    }

    pub async fn latest_view(&self) -> Option<ViewModel> {
        self.state.read().await.view.clone()
    }

    pub async fn historical_window(&self) -> Vec<HistoricalDay> {
        self.state.read().await.history.window().to_vec()
    }

    pub async fn status(&self) -> SessionStatus {
        let state = self.state.read().await;
        SessionStatus {
            current_location: state.current_location.clone(),
            active_cycle: state.active_cycle,
            cycles_completed: state.cycles_completed,
            historical_days: state.history.len(),
            has_view: state.view.is_some(),
        }
    }
}

fn window_section(history: &HistoricalAccumulator) -> Option<Vec<HistoricalDay>> {
    if history.is_empty() {
        None
    } else {
        Some(history.window().to_vec())
    }
}
