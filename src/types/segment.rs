//! Segment types produced by the segmentation engine and its extractors.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::MachineState;

/// A maximal interval `[start, end)` of constant classified state and label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: NaiveDateTime,
    /// `None` while the segment is still open at the end of the data
    pub end: Option<NaiveDateTime>,
    pub state: MachineState,
    pub label: String,
    /// Whole minutes, floor of elapsed seconds / 60
    pub duration_minutes: i64,
    /// True iff the interval was cut by the end of the data, not a state change
    pub ongoing: bool,
}

impl Segment {
    /// Elapsed whole minutes between two instants (floor, never negative).
    pub fn floor_minutes(start: NaiveDateTime, end: NaiveDateTime) -> i64 {
        ((end - start).num_seconds() / 60).max(0)
    }
}

/// One production run of a program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cycle {
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
    pub program: String,
    pub duration_minutes: i64,
    pub ongoing: bool,
}

impl From<Segment> for Cycle {
    fn from(seg: Segment) -> Self {
        Self {
            start: seg.start,
            end: seg.end,
            program: seg.label,
            duration_minutes: seg.duration_minutes,
            ongoing: seg.ongoing,
        }
    }
}

/// A stoppage with its attributed reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DowntimeEvent {
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
    pub reason: String,
    pub duration_minutes: i64,
    pub ongoing: bool,
}

impl From<Segment> for DowntimeEvent {
    fn from(seg: Segment) -> Self {
        Self {
            start: seg.start,
            end: seg.end,
            reason: seg.label,
            duration_minutes: seg.duration_minutes,
            ongoing: seg.ongoing,
        }
    }
}

/// Downtime events for one machine plus the per-sample minute counts the
/// history aggregator needs.
///
/// `total_minutes` is the number of samples in the processed window, not the
/// calendar length of the window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DowntimeSummary {
    pub events: Vec<DowntimeEvent>,
    pub run_minutes: i64,
    pub down_minutes: i64,
    pub total_minutes: i64,
}

impl DowntimeSummary {
    pub fn total_event_minutes(&self) -> i64 {
        self.events.iter().map(|e| e.duration_minutes).sum()
    }
}

/// A segment scaled to a fixed presentation window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineSegment {
    /// `<machine short name>_<index>`, restarted per machine
    pub id: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub state: MachineState,
    pub label: String,
    pub duration_minutes: i64,
    /// Always false: the bar is closed at the window end
    pub ongoing: bool,
    pub x_pct: f64,
    pub width_pct: f64,
}

/// The `[from, to]` span a run reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
}

impl ReportPeriod {
    pub fn new(from: NaiveDateTime, to: NaiveDateTime) -> Self {
        Self { from, to }
    }

    /// History date for the period: the calendar day of its end.
    pub fn date(&self) -> NaiveDate {
        self.to.date()
    }
}
