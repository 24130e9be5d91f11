//! Engine scenario tests
//!
//! End-to-end behaviour of the segmentation engine and its extractors over
//! small hand-built shifts, plus randomized coverage checks over the
//! generic scan.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::prelude::*;

use factory_monitor::alerts::evaluate;
use factory_monitor::config::MonitorConfig;
use factory_monitor::segmentation::reason::stop_reason;
use factory_monitor::segmentation::{segment, Classification};
use factory_monitor::{
    analyze, build_timeline, extract_cycles, extract_downtime, MachineState, ReportPeriod, Sample,
    SampleSeries, SegmentPolicy, StopCause, StopFlag, Window,
};

// ============================================================================
// Helpers
// ============================================================================

fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap()
}

fn at(minute: i64) -> NaiveDateTime {
    t0() + Duration::minutes(minute)
}

fn alarm(message: &str) -> StopCause {
    StopCause {
        alarm_message: Some(message.to_string()),
        ..StopCause::default()
    }
    .with(StopFlag::Alarm)
}

/// M1: minutes 0-4 running P1, 5-9 stopped on alarm, 10-14 running P1.
fn m1_shift() -> Vec<Sample> {
    let mut samples = Vec::new();
    for m in 0..5 {
        samples.push(Sample::running("M1", at(m), "P1"));
    }
    for m in 5..10 {
        samples.push(Sample::stopped("M1", at(m), alarm("SPINDLE OVERLOAD")));
    }
    for m in 10..15 {
        samples.push(Sample::running("M1", at(m), "P1"));
    }
    samples
}

fn cycles_policy() -> SegmentPolicy {
    MonitorConfig::default().cycles.policy()
}

fn downtime_policy() -> SegmentPolicy {
    MonitorConfig::default().downtime.policy()
}

// ============================================================================
// Hand-built scenarios
// ============================================================================

#[test]
fn m1_shift_yields_two_cycles_and_one_alarm_stop() {
    let series = SampleSeries::new("M1", m1_shift());

    let cycles = extract_cycles(&series, &cycles_policy());
    assert_eq!(cycles.len(), 2);
    assert_eq!((cycles[0].start, cycles[0].end), (at(0), Some(at(5))));
    assert_eq!(cycles[0].duration_minutes, 5);
    assert_eq!(cycles[0].program, "P1");
    assert!(!cycles[0].ongoing);

    // Minute 14 is the last sample: the second run is still going
    assert_eq!(cycles[1].start, at(10));
    assert!(cycles[1].ongoing);
    assert_eq!(cycles[1].end, None);
    assert_eq!(cycles[1].duration_minutes, 4);

    let downtime = extract_downtime(&series, &downtime_policy());
    assert_eq!(downtime.events.len(), 1);
    let stop = &downtime.events[0];
    assert_eq!((stop.start, stop.end), (at(5), Some(at(10))));
    assert_eq!(stop.duration_minutes, 5);
    assert_eq!(stop.reason, "Alarm: SPINDLE OVERLOAD");

    // Three contiguous segments over the whole shift
    let all = segment(&series, Window::Observed, |s| {
        if s.running {
            Classification::new(MachineState::Running, s.program_name.clone())
        } else {
            Classification::new(MachineState::Stopped, stop_reason(&s.stop_cause))
        }
    });
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].end, Some(all[1].start));
    assert_eq!(all[1].end, Some(all[2].start));
}

#[test]
fn closing_sample_ends_second_cycle_at_fifteen() {
    let mut samples = m1_shift();
    samples.push(Sample::stopped("M1", at(15), StopCause::default()));
    let cycles = extract_cycles(&SampleSeries::new("M1", samples), &cycles_policy());

    assert_eq!(cycles.len(), 2);
    assert_eq!((cycles[1].start, cycles[1].end), (at(10), Some(at(15))));
    assert_eq!(cycles[1].duration_minutes, 5);
    assert!(!cycles[1].ongoing);
}

#[test]
fn alarm_dominates_setup() {
    let cause = alarm("DOOR INTERLOCK").with(StopFlag::Setup);
    let reason = stop_reason(&cause);
    assert!(reason.starts_with("Alarm: "), "got {reason}");
    assert_ne!(reason, "Setup");
}

#[test]
fn sub_minute_stop_produces_no_event() {
    let samples = vec![
        Sample::running("M1", t0(), "P1"),
        Sample::stopped("M1", t0() + Duration::seconds(30), StopCause::default()),
        Sample::running("M1", t0() + Duration::seconds(89), "P1"),
        Sample::running("M1", at(5), "P1"),
    ];
    let downtime = extract_downtime(&SampleSeries::new("M1", samples), &downtime_policy());
    assert!(downtime.events.is_empty());
}

#[test]
fn running_tail_is_single_ongoing_cycle() {
    let samples = vec![
        Sample::stopped("M1", at(0), StopCause::default()),
        Sample::running("M1", at(1), "P1"),
        Sample::running("M1", at(2), "P1"),
        Sample::running("M1", at(3), "P1"),
    ];
    let cycles = extract_cycles(&SampleSeries::new("M1", samples), &cycles_policy());
    assert_eq!(cycles.len(), 1);
    assert!(cycles[0].ongoing);
    assert_eq!(cycles[0].end, None);
}

#[test]
fn shuffled_input_matches_sorted_input() {
    let mut shuffled = m1_shift();
    shuffled.shuffle(&mut StdRng::seed_from_u64(11));

    let sorted = extract_downtime(&SampleSeries::new("M1", m1_shift()), &downtime_policy());
    let from_shuffled = extract_downtime(&SampleSeries::new("M1", shuffled), &downtime_policy());
    assert_eq!(sorted, from_shuffled);
}

#[test]
fn alert_threshold_forty_and_forty_six() {
    let build = |stop_minutes: i64| {
        let mut samples = vec![Sample::running("M1", at(0), "P1")];
        for m in 1..=stop_minutes {
            samples.push(Sample::stopped("M1", at(m), StopCause::default()));
        }
        samples.push(Sample::running("M1", at(stop_minutes + 1), "P1"));
        extract_downtime(&SampleSeries::new("M1", samples), &downtime_policy())
    };

    let short = build(40);
    assert_eq!(short.events[0].duration_minutes, 40);
    assert!(evaluate([("M1", &short)], 45).is_empty());

    let long = build(46);
    assert_eq!(long.events[0].duration_minutes, 46);
    let alerts = evaluate([("M1", &long)], 45);
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].machine, "M1");
}

#[test]
fn ongoing_stop_alerts_before_it_closes() {
    let mut samples = vec![Sample::running("M1", at(0), "P1")];
    for m in 1..=50 {
        samples.push(Sample::stopped("M1", at(m), StopCause::default().with(StopFlag::Maintenance)));
    }
    let downtime = extract_downtime(&SampleSeries::new("M1", samples), &downtime_policy());
    let alerts = evaluate([("M1", &downtime)], 45);
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].event.ongoing);
    assert_eq!(alerts[0].event.duration_minutes, 49);
}

#[test]
fn empty_machine_yields_empty_views() {
    let series = SampleSeries::new("M1", Vec::new());
    assert!(extract_cycles(&series, &cycles_policy()).is_empty());
    assert!(extract_downtime(&series, &downtime_policy()).events.is_empty());
    let config = MonitorConfig::default();
    assert!(build_timeline(&series, at(0), at(60), &config.timeline, "_").is_empty());
}

#[test]
fn timeline_spans_report_period_for_every_machine() {
    let config = MonitorConfig::default();
    let mut samples = m1_shift();
    // M2 only reports from minute 20 onwards
    for m in 20..60 {
        samples.push(Sample::running("M2_Hall1", at(m), "P9"));
    }
    let period = ReportPeriod::new(at(0), at(60));
    let analysis = analyze(samples, period, &config);

    for machine in &analysis.machines {
        let tl = &machine.timeline;
        assert!(!tl.is_empty());
        assert_eq!(tl.first().unwrap().start, period.from);
        assert_eq!(tl.last().unwrap().end, period.to);
        let total: f64 = tl.iter().map(|s| s.width_pct).sum();
        assert!((total - 100.0).abs() < 1e-6, "{}: {}", machine.machine, total);
    }
    assert_eq!(analysis.machines[1].timeline[0].id, "M2_0");
}

// ============================================================================
// Randomized coverage
// ============================================================================

fn random_series(rng: &mut StdRng, len: usize) -> SampleSeries {
    let programs = ["A", "B"];
    let flags = [StopFlag::Setup, StopFlag::Waiting, StopFlag::Alarm, StopFlag::PowerOff];
    let mut ts = t0();
    let samples = (0..len)
        .map(|_| {
            ts += Duration::seconds(rng.gen_range(20..150));
            if rng.gen_bool(0.5) {
                Sample::running("R", ts, programs[rng.gen_range(0..programs.len())])
            } else {
                let mut cause = StopCause::default();
                if rng.gen_bool(0.7) {
                    cause = cause.with(flags[rng.gen_range(0..flags.len())]);
                }
                Sample::stopped("R", ts, cause)
            }
        })
        .collect();
    SampleSeries::new("R", samples)
}

fn full_classifier(s: &Sample) -> Classification {
    if s.running {
        Classification::new(MachineState::Running, s.program_name.clone())
    } else {
        Classification::new(MachineState::Stopped, stop_reason(&s.stop_cause))
    }
}

#[test]
fn observed_segments_cover_first_to_last_sample() {
    let mut rng = StdRng::seed_from_u64(42);
    for len in 1..60 {
        let series = random_series(&mut rng, len);
        let segs = segment(&series, Window::Observed, full_classifier);

        assert!(!segs.is_empty());
        assert_eq!(segs[0].start, series.first_timestamp().unwrap());
        for pair in segs.windows(2) {
            assert_eq!(pair[0].end, Some(pair[1].start));
            assert_ne!(
                (pair[0].state, &pair[0].label),
                (pair[1].state, &pair[1].label),
                "adjacent segments must differ"
            );
        }
        let last = segs.last().unwrap();
        assert!(last.ongoing && last.end.is_none());
        assert!(segs[..segs.len() - 1].iter().all(|s| !s.ongoing));
    }
}

#[test]
fn fixed_window_segments_tile_the_window() {
    let mut rng = StdRng::seed_from_u64(7);
    for len in 1..60 {
        let series = random_series(&mut rng, len);
        let first = series.first_timestamp().unwrap();
        let last = series.last_timestamp().unwrap();
        // Window starts inside the data and ends past it
        let from = first + (last - first) / 3;
        let to = last + Duration::minutes(5);

        let window = Window::Fixed { from, to, fill_leading_edge: true };
        let segs = segment(&series, window, full_classifier);
        assert!(!segs.is_empty());
        assert_eq!(segs[0].start, from);
        assert_eq!(segs.last().unwrap().end, Some(to));
        for pair in segs.windows(2) {
            assert_eq!(pair[0].end, Some(pair[1].start));
            assert!(pair[0].start < pair[1].start);
        }
        assert!(segs.iter().all(|s| !s.ongoing));
    }
}

#[test]
fn machine_reporting_only_at_period_end_gets_full_bar() {
    let config = MonitorConfig::default();
    let mut samples: Vec<Sample> = (0..=60).map(|m| Sample::running("M1", at(m), "P1")).collect();
    samples.push(Sample::running("M2_Hall1", at(60), "P9"));
    let analysis = analyze(samples, ReportPeriod::new(at(0), at(60)), &config);

    let m2 = analysis.machine("M2_Hall1").unwrap();
    assert_eq!(m2.cycles.len(), 1);
    assert_eq!(m2.timeline.len(), 1);
    assert_eq!(m2.timeline[0].start, at(0));
    assert_eq!(m2.timeline[0].end, at(60));
    assert_eq!(m2.timeline[0].label, "P9");
}
