//! Rolling window of recent historical days.
//!
//! Days arrive one at a time and out of order as the per-day history
//! requests complete. The window keeps them unique by date, most recent
//! first, and holds at most `capacity` entries.

use chrono::NaiveDate;

use crate::types::HistoricalDay;

/// Default number of days kept.
pub const DEFAULT_WINDOW: usize = 7;

#[derive(Debug, Clone)]
pub struct HistoricalAccumulator {
    days: Vec<HistoricalDay>,
    capacity: usize,
}

impl Default for HistoricalAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoricalAccumulator {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_WINDOW)
    }

    /// A capacity of zero is treated as one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            days: Vec::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Add a day to the window. Returns `false` when the date is already
    /// present; the stored record is kept as is (first write wins).
    ///
    /// A day older than everything in a full window is accepted and then
    /// immediately evicted, which still returns `true`.
    pub fn ingest(&mut self, day: HistoricalDay) -> bool {
        if self.contains(day.date) {
            return false;
        }
        self.days.push(day);
        self.days.sort_by(|a, b| b.date.cmp(&a.date));
        self.days.truncate(self.capacity);
        true
    }

    /// Most recent first.
    pub fn window(&self) -> &[HistoricalDay] {
        &self.days
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.days.iter().any(|d| d.date == date)
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.days.clear();
    }
}
