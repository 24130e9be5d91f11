//! Shared data structures for machine-state monitoring
//!
//! This module defines the core value types for the monitoring pipeline:
//! - Sample / SampleSeries (per-minute controller observations)
//! - Segment and its specialisations: Cycle, DowntimeEvent, TimelineSegment
//! - DailySummary / DowntimeEventRecord (persisted rolling history)

mod state;
mod sample;
mod segment;
mod history;

pub use state::*;
pub use sample::*;
pub use segment::*;
pub use history::*;
