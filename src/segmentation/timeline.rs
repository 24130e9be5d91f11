//! Timeline compaction
//!
//! Segments over a fixed presentation window, positioned as percentages of
//! that window so every machine's bar has the same width regardless of data
//! gaps. Running segments are labelled by program, stopped ones by reason.

use chrono::NaiveDateTime;
use tracing::debug;

use super::reason::stop_reason;
use super::{segment, Classification, Window};
use crate::config::TimelineConfig;
use crate::types::{short_name, MachineState, Sample, SampleSeries, TimelineSegment};

/// Label for running samples that report no program name.
pub const RUNNING_FALLBACK_LABEL: &str = "Running";

fn classify(sample: &Sample) -> Classification {
    if sample.running {
        let label = if sample.program_name.trim().is_empty() {
            RUNNING_FALLBACK_LABEL.to_string()
        } else {
            sample.program_name.clone()
        };
        Classification::new(MachineState::Running, label)
    } else {
        Classification::new(MachineState::Stopped, stop_reason(&sample.stop_cause))
    }
}

/// Build the timeline bar for one machine over `[from, to]`.
///
/// Segments at or below `config.min_width_pct` of the window are not
/// emitted. Ids are `<short name>_<n>` with `n` counting retained segments
/// from zero.
pub fn build_timeline(
    series: &SampleSeries,
    from: NaiveDateTime,
    to: NaiveDateTime,
    config: &TimelineConfig,
    machine_separator: &str,
) -> Vec<TimelineSegment> {
    let window = Window::Fixed {
        from,
        to,
        fill_leading_edge: config.fill_leading_edge,
    };
    let policy = config.policy();
    let total_secs = (to - from).num_seconds().max(1) as f64;
    let short = short_name(series.machine_id(), machine_separator);

    let mut timeline = Vec::new();
    let mut dropped = 0usize;

    for seg in segment(series, window, classify) {
        let end = seg.end.unwrap_or(to);
        let x_pct = (seg.start - from).num_seconds() as f64 / total_secs * 100.0;
        let width_pct = (end - seg.start).num_seconds() as f64 / total_secs * 100.0;

        if !policy.admits_width(width_pct) {
            dropped += 1;
            continue;
        }

        timeline.push(TimelineSegment {
            id: format!("{}_{}", short, timeline.len()),
            start: seg.start,
            end,
            state: seg.state,
            label: seg.label,
            duration_minutes: seg.duration_minutes,
            ongoing: seg.ongoing,
            x_pct,
            width_pct,
        });
    }

    debug!(
        machine = %series.machine_id(),
        segments = timeline.len(),
        dropped,
        "Built timeline"
    );
    timeline
}
