//! Persisted history rows: one summary per (date, machine) and one record
//! per downtime event.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::DowntimeEvent;

/// Daily efficiency summary for one machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub machine: String,
    pub run_minutes: i64,
    pub down_minutes: i64,
    pub total_minutes: i64,
    pub cycle_count: usize,
    pub avg_cycle_minutes: f64,
    pub efficiency_pct: f64,
}

/// Persisted form of a [`DowntimeEvent`], keyed by (date, machine, start).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DowntimeEventRecord {
    pub date: NaiveDate,
    pub machine: String,
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
    pub duration_minutes: i64,
    pub reason: String,
}

impl DowntimeEventRecord {
    pub fn from_event(date: NaiveDate, machine: &str, event: &DowntimeEvent) -> Self {
        Self {
            date,
            machine: machine.to_string(),
            start: event.start,
            end: event.end,
            duration_minutes: event.duration_minutes,
            reason: event.reason.clone(),
        }
    }
}

/// Every row produced by one run for one date. Committed atomically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryBatch {
    pub date: NaiveDate,
    pub summaries: Vec<DailySummary>,
    pub events: Vec<DowntimeEventRecord>,
}

impl HistoryBatch {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            summaries: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty() && self.events.is_empty()
    }
}

/// Row counts written by a commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStats {
    pub summaries_written: usize,
    pub events_inserted: usize,
    pub events_skipped: usize,
}
