//! Downtime extraction
//!
//! Stopped segments labelled with the dominant stop reason. A change of
//! reason during a stoppage starts a new event. Events shorter than the
//! policy minimum (one whole minute by default) are sub-minute noise and are
//! discarded.

use tracing::debug;

use super::reason::stop_reason;
use super::{retain_state, segment, Classification, SegmentPolicy, Window};
use crate::types::{DowntimeEvent, DowntimeSummary, MachineState, Sample, SampleSeries};

fn classify(sample: &Sample) -> Classification {
    if sample.running {
        Classification::new(MachineState::Running, "")
    } else {
        Classification::new(MachineState::Stopped, stop_reason(&sample.stop_cause))
    }
}

/// Extract downtime events and per-sample minute counts for one machine.
///
/// Each sample stands for one observed minute: `run_minutes` and
/// `down_minutes` count running and stopped samples, `total_minutes` counts
/// all of them.
pub fn extract_downtime(series: &SampleSeries, policy: &SegmentPolicy) -> DowntimeSummary {
    let segments = segment(series, Window::Observed, classify);
    let events: Vec<DowntimeEvent> = retain_state(segments, MachineState::Stopped, policy)
        .into_iter()
        .map(DowntimeEvent::from)
        .collect();

    let run_minutes = series.samples().iter().filter(|s| s.running).count() as i64;
    let total_minutes = series.len() as i64;

    let summary = DowntimeSummary {
        events,
        run_minutes,
        down_minutes: total_minutes - run_minutes,
        total_minutes,
    };

    debug!(
        machine = %series.machine_id(),
        events = summary.events.len(),
        run_min = summary.run_minutes,
        down_min = summary.down_minutes,
        "Extracted downtime"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StopCause, StopFlag};
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn ts(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(14, minute, 0)
            .unwrap()
    }

    fn run(m: u32) -> Sample {
        Sample::running("M1", ts(m), "P1")
    }

    fn stop(m: u32, flag: Option<StopFlag>) -> Sample {
        let cause = flag.map_or_else(StopCause::default, |f| StopCause::default().with(f));
        Sample::stopped("M1", ts(m), cause)
    }

    fn default_policy() -> SegmentPolicy {
        SegmentPolicy { min_duration_minutes: 1, min_width_pct: None }
    }

    #[test]
    fn test_stop_between_runs() {
        let series = SampleSeries::new(
            "M1",
            vec![run(0), stop(1, Some(StopFlag::Setup)), stop(2, Some(StopFlag::Setup)), run(3)],
        );
        let summary = extract_downtime(&series, &default_policy());
        assert_eq!(summary.events.len(), 1);
        let ev = &summary.events[0];
        assert_eq!(ev.reason, "Setup");
        assert_eq!(ev.start, ts(1));
        assert_eq!(ev.end, Some(ts(3)));
        assert_eq!(ev.duration_minutes, 2);
        assert_eq!(summary.run_minutes, 2);
        assert_eq!(summary.down_minutes, 2);
        assert_eq!(summary.total_minutes, 4);
    }

    #[test]
    fn test_sub_minute_stop_is_discarded() {
        let start = ts(0);
        let series = SampleSeries::new(
            "M1",
            vec![
                Sample::running("M1", start, "P1"),
                Sample::stopped("M1", start + Duration::seconds(60), StopCause::default()),
                Sample::running("M1", start + Duration::seconds(119), "P1"),
            ],
        );
        let summary = extract_downtime(&series, &default_policy());
        assert!(summary.events.is_empty());
        assert_eq!(summary.down_minutes, 1);
    }

    #[test]
    fn test_stopped_tail_is_ongoing() {
        let series = SampleSeries::new("M1", vec![run(0), stop(1, None), stop(10, None)]);
        let summary = extract_downtime(&series, &default_policy());
        assert_eq!(summary.events.len(), 1);
        assert!(summary.events[0].ongoing);
        assert_eq!(summary.events[0].end, None);
        assert_eq!(summary.events[0].duration_minutes, 9);
        assert_eq!(summary.events[0].reason, "Idle");
    }

    #[test]
    fn test_reason_change_splits_event() {
        let series = SampleSeries::new(
            "M1",
            vec![
                stop(0, Some(StopFlag::Waiting)),
                stop(5, Some(StopFlag::Maintenance)),
                run(9),
            ],
        );
        let summary = extract_downtime(&series, &default_policy());
        let reasons: Vec<_> = summary.events.iter().map(|e| e.reason.as_str()).collect();
        assert_eq!(reasons, vec!["Waiting", "Maintenance"]);
        assert_eq!(summary.total_event_minutes(), 9);
    }

    #[test]
    fn test_empty_series() {
        let summary = extract_downtime(&SampleSeries::new("M1", Vec::new()), &default_policy());
        assert_eq!(summary, DowntimeSummary::default());
    }
}
