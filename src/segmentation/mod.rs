//! Run-length segmentation of machine-state samples
//!
//! One scan loop, three policies. [`segment`] walks a [`SampleSeries`] in
//! timestamp order, classifies every sample into a `(state, label)` pair and
//! emits a new [`Segment`] whenever either changes. The cycle, downtime and
//! timeline extractors differ only in the classifier they pass and in which
//! segments they keep afterwards, so the no-gap/no-overlap property holds
//! identically for all three.
//!
//! ## Window modes
//!
//! - [`Window::Observed`]: segments span first to last sample. The final
//!   segment is left open (`end = None`, `ongoing = true`) because the data
//!   ended, not the state.
//! - [`Window::Fixed`]: segments span exactly `[from, to]`. Samples at or
//!   after `to` are ignored, samples before `from` only decide the state at
//!   `from`, and the last segment is closed at `to`.

pub mod reason;
mod cycles;
mod downtime;
mod timeline;

pub use cycles::extract_cycles;
pub use downtime::extract_downtime;
pub use timeline::build_timeline;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::types::{MachineState, Sample, SampleSeries, Segment};

/// Result of classifying one sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub state: MachineState,
    pub label: String,
}

impl Classification {
    pub fn new(state: MachineState, label: impl Into<String>) -> Self {
        Self {
            state,
            label: label.into(),
        }
    }
}

/// Span the engine covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// Whatever the data shows: first sample to last sample
    Observed,
    /// A fixed external window, e.g. the report period
    Fixed {
        from: NaiveDateTime,
        to: NaiveDateTime,
        /// Start the first segment at `from` even when the first sample
        /// inside the window is later
        fill_leading_edge: bool,
    },
}

/// Drop rule for degenerate segments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentPolicy {
    /// Segments shorter than this many whole minutes are dropped
    pub min_duration_minutes: i64,
    /// Segments whose width is at or below this percentage of the window
    /// are dropped (timeline only)
    pub min_width_pct: Option<f64>,
}

impl Default for SegmentPolicy {
    fn default() -> Self {
        Self {
            min_duration_minutes: 0,
            min_width_pct: None,
        }
    }
}

impl SegmentPolicy {
    pub fn admits_duration(&self, duration_minutes: i64) -> bool {
        duration_minutes >= self.min_duration_minutes
    }

    pub fn admits_width(&self, width_pct: f64) -> bool {
        match self.min_width_pct {
            Some(min) => width_pct > min,
            None => true,
        }
    }
}

/// Split a series into maximal constant-classification segments.
///
/// Consecutive samples with equal `(state, label)` merge; any change in
/// either opens a new segment at the changing sample's timestamp. Empty
/// input yields no segments. Segments are contiguous: each one ends exactly
/// where the next begins.
pub fn segment<F>(series: &SampleSeries, window: Window, classify: F) -> Vec<Segment>
where
    F: Fn(&Sample) -> Classification,
{
    let bounds = match window {
        Window::Observed => None,
        Window::Fixed { from, to, .. } => {
            if to <= from {
                return Vec::new();
            }
            Some((from, to))
        }
    };

    let mut segments = Vec::new();
    let mut open: Option<(Classification, NaiveDateTime)> = None;
    let mut trailing: Option<&Sample> = None;

    for sample in series.samples() {
        let ts = match bounds {
            Some((_, to)) if sample.timestamp >= to => {
                trailing = Some(sample);
                break;
            }
            Some((from, _)) => sample.timestamp.max(from),
            None => sample.timestamp,
        };
        let class = classify(sample);

        match open.take() {
            None => open = Some((class, ts)),
            Some((current, start)) if current == class => open = Some((current, start)),
            Some((current, start)) => {
                // Pre-window samples all clamp to `from`; only the last one counts
                if ts > start {
                    segments.push(closed(current, start, ts));
                }
                open = Some((class, ts));
            }
        }
    }

    // Nothing inside the window: the first sample at or after `to` is the
    // nearest known state and covers the whole bar
    if open.is_none() {
        if let (Some((from, _)), Some(sample)) = (bounds, trailing) {
            open = Some((classify(sample), from));
        }
    }

    let Some((current, start)) = open else {
        return segments;
    };

    match window {
        Window::Fixed { from, to, fill_leading_edge } => {
            segments.push(closed(current, start, to));
            if fill_leading_edge {
                if let Some(first) = segments.first_mut().filter(|s| s.start > from) {
                    first.start = from;
                    first.duration_minutes = Segment::floor_minutes(from, first.end.unwrap_or(to));
                }
            }
        }
        Window::Observed => {
            let last = series.last_timestamp().unwrap_or(start);
            segments.push(Segment {
                start,
                end: None,
                state: current.state,
                label: current.label,
                duration_minutes: Segment::floor_minutes(start, last),
                ongoing: true,
            });
        }
    }

    segments
}

fn closed(class: Classification, start: NaiveDateTime, end: NaiveDateTime) -> Segment {
    Segment {
        start,
        end: Some(end),
        state: class.state,
        label: class.label,
        duration_minutes: Segment::floor_minutes(start, end),
        ongoing: false,
    }
}

/// Keep segments of one state that pass the policy's duration rule.
pub fn retain_state(segments: Vec<Segment>, state: MachineState, policy: &SegmentPolicy) -> Vec<Segment> {
    segments
        .into_iter()
        .filter(|s| s.state == state && policy.admits_duration(s.duration_minutes))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Sample, StopCause};
    use chrono::NaiveDate;

    fn ts(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(10, minute, 0)
            .unwrap()
    }

    fn by_running(sample: &Sample) -> Classification {
        Classification::new(MachineState::from_running(sample.running), "")
    }

    fn series(pattern: &[(u32, bool)]) -> SampleSeries {
        let samples = pattern
            .iter()
            .map(|&(m, run)| {
                if run {
                    Sample::running("M1", ts(m), "P")
                } else {
                    Sample::stopped("M1", ts(m), StopCause::default())
                }
            })
            .collect();
        SampleSeries::new("M1", samples)
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        let empty = SampleSeries::new("M1", Vec::new());
        assert!(segment(&empty, Window::Observed, by_running).is_empty());
        let fixed = Window::Fixed { from: ts(0), to: ts(30), fill_leading_edge: true };
        assert!(segment(&empty, fixed, by_running).is_empty());
    }

    #[test]
    fn test_single_sample_is_one_open_segment() {
        let segs = segment(&series(&[(5, true)]), Window::Observed, by_running);
        assert_eq!(segs.len(), 1);
        assert!(segs[0].ongoing);
        assert_eq!(segs[0].end, None);
        assert_eq!(segs[0].duration_minutes, 0);
    }

    #[test]
    fn test_constant_state_is_one_segment() {
        let pattern: Vec<_> = (0..10).map(|m| (m, true)).collect();
        let segs = segment(&series(&pattern), Window::Observed, by_running);
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].start, ts(0));
        assert_eq!(segs[0].duration_minutes, 9);
    }

    #[test]
    fn test_segments_are_contiguous() {
        let segs = segment(
            &series(&[(0, true), (1, true), (2, false), (3, false), (4, true), (5, false)]),
            Window::Observed,
            by_running,
        );
        assert_eq!(segs.len(), 4);
        for pair in segs.windows(2) {
            assert_eq!(pair[0].end, Some(pair[1].start));
        }
        assert_eq!(segs[0].start, ts(0));
        assert!(segs[3].ongoing);
    }

    #[test]
    fn test_label_change_splits_segment() {
        let samples = vec![
            Sample::running("M1", ts(0), "A"),
            Sample::running("M1", ts(1), "A"),
            Sample::running("M1", ts(2), "B"),
        ];
        let segs = segment(&SampleSeries::new("M1", samples), Window::Observed, |s| {
            Classification::new(MachineState::Running, s.program_name.clone())
        });
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].label, "A");
        assert_eq!(segs[0].end, Some(ts(2)));
        assert_eq!(segs[1].label, "B");
    }

    #[test]
    fn test_fixed_window_spans_exactly_window() {
        let window = Window::Fixed { from: ts(0), to: ts(30), fill_leading_edge: true };
        let segs = segment(&series(&[(5, true), (10, false), (20, true)]), window, by_running);
        assert_eq!(segs.first().unwrap().start, ts(0));
        assert_eq!(segs.last().unwrap().end, Some(ts(30)));
        assert!(segs.iter().all(|s| !s.ongoing));
        assert_eq!(segs[0].duration_minutes, 10);
    }

    #[test]
    fn test_fixed_window_without_fill_starts_at_first_sample() {
        let window = Window::Fixed { from: ts(0), to: ts(30), fill_leading_edge: false };
        let segs = segment(&series(&[(5, true), (10, false)]), window, by_running);
        assert_eq!(segs[0].start, ts(5));
    }

    #[test]
    fn test_fixed_window_clamps_outside_samples() {
        let window = Window::Fixed { from: ts(10), to: ts(20), fill_leading_edge: true };
        // Minute 2 is running, minute 8 stopped: state at the window start is stopped
        let segs = segment(
            &series(&[(2, true), (8, false), (15, true), (25, false)]),
            window,
            by_running,
        );
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].state, MachineState::Stopped);
        assert_eq!(segs[0].start, ts(10));
        assert_eq!(segs[0].end, Some(ts(15)));
        assert_eq!(segs[1].end, Some(ts(20)));
    }

    #[test]
    fn test_sample_at_window_end_fills_window() {
        let window = Window::Fixed { from: ts(0), to: ts(30), fill_leading_edge: true };
        let segs = segment(&series(&[(30, true), (31, false)]), window, by_running);
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].state, MachineState::Running);
        assert_eq!((segs[0].start, segs[0].end), (ts(0), Some(ts(30))));
        assert_eq!(segs[0].duration_minutes, 30);
    }

    #[test]
    fn test_inverted_window_yields_nothing() {
        let window = Window::Fixed { from: ts(20), to: ts(10), fill_leading_edge: true };
        assert!(segment(&series(&[(15, true)]), window, by_running).is_empty());
    }

    #[test]
    fn test_policy_width_threshold_is_exclusive() {
        let policy = SegmentPolicy { min_duration_minutes: 0, min_width_pct: Some(0.05) };
        assert!(!policy.admits_width(0.05));
        assert!(policy.admits_width(0.0501));
        assert!(SegmentPolicy::default().admits_width(0.0));
    }
}
