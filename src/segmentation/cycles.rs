//! Production cycle extraction
//!
//! A cycle is a running segment labelled with its program. A program change
//! while the machine keeps running starts a new cycle, so back-to-back jobs
//! without an intervening stop are still counted separately.

use tracing::debug;

use super::{retain_state, segment, Classification, SegmentPolicy, Window};
use crate::types::{Cycle, MachineState, Sample, SampleSeries};

/// Stoppage label is irrelevant to cycles, so all stopped samples merge.
fn classify(sample: &Sample) -> Classification {
    if sample.running {
        Classification::new(MachineState::Running, sample.program_name.clone())
    } else {
        Classification::new(MachineState::Stopped, "")
    }
}

/// Extract production cycles over the observed span of the series.
///
/// A run still in progress at the last sample is returned with
/// `ongoing = true` and no end.
pub fn extract_cycles(series: &SampleSeries, policy: &SegmentPolicy) -> Vec<Cycle> {
    let segments = segment(series, Window::Observed, classify);
    let cycles: Vec<Cycle> = retain_state(segments, MachineState::Running, policy)
        .into_iter()
        .map(Cycle::from)
        .collect();

    debug!(
        machine = %series.machine_id(),
        samples = series.len(),
        cycles = cycles.len(),
        "Extracted cycles"
    );
    cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StopCause;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(6, minute, 0)
            .unwrap()
    }

    fn run(m: u32, program: &str) -> Sample {
        Sample::running("M1", ts(m), program)
    }

    fn stop(m: u32) -> Sample {
        Sample::stopped("M1", ts(m), StopCause::default())
    }

    #[test]
    fn test_closed_cycle_between_stops() {
        let series = SampleSeries::new("M1", vec![stop(0), run(1, "P1"), run(2, "P1"), stop(4), stop(5)]);
        let cycles = extract_cycles(&series, &SegmentPolicy::default());
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].start, ts(1));
        assert_eq!(cycles[0].end, Some(ts(4)));
        assert_eq!(cycles[0].duration_minutes, 3);
        assert_eq!(cycles[0].program, "P1");
        assert!(!cycles[0].ongoing);
    }

    #[test]
    fn test_running_tail_is_ongoing() {
        let series = SampleSeries::new("M1", vec![stop(0), run(1, "P1"), run(7, "P1")]);
        let cycles = extract_cycles(&series, &SegmentPolicy::default());
        assert_eq!(cycles.len(), 1);
        assert!(cycles[0].ongoing);
        assert_eq!(cycles[0].end, None);
        assert_eq!(cycles[0].duration_minutes, 6);
    }

    #[test]
    fn test_program_change_mid_run_is_two_cycles() {
        let series = SampleSeries::new("M1", vec![run(0, "A"), run(1, "A"), run(2, "B"), stop(3)]);
        let cycles = extract_cycles(&series, &SegmentPolicy::default());
        let programs: Vec<_> = cycles.iter().map(|c| c.program.as_str()).collect();
        assert_eq!(programs, vec!["A", "B"]);
        assert_eq!(cycles[0].end, Some(cycles[1].start));
    }

    #[test]
    fn test_stop_reason_changes_do_not_split_cycles() {
        use crate::types::StopFlag;
        let series = SampleSeries::new(
            "M1",
            vec![
                run(0, "A"),
                Sample::stopped("M1", ts(1), StopCause::default().with(StopFlag::Setup)),
                Sample::stopped("M1", ts(2), StopCause::default().with(StopFlag::Waiting)),
                run(3, "A"),
            ],
        );
        let cycles = extract_cycles(&series, &SegmentPolicy::default());
        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[1].start, ts(3));
    }

    #[test]
    fn test_min_duration_policy_drops_short_runs() {
        let series = SampleSeries::new("M1", vec![run(0, "A"), stop(1), run(5, "B"), stop(10)]);
        let policy = SegmentPolicy { min_duration_minutes: 2, min_width_pct: None };
        let cycles = extract_cycles(&series, &policy);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].program, "B");
    }

    #[test]
    fn test_all_stopped_has_no_cycles() {
        let series = SampleSeries::new("M1", vec![stop(0), stop(1), stop(2)]);
        assert!(extract_cycles(&series, &SegmentPolicy::default()).is_empty());
    }
}
