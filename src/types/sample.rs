//! Sample model: one machine-state observation, and the per-machine series
//! the segmentation engine consumes.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::StopFlag;

/// Stop-cause flags carried by a sample.
///
/// Each flag is a plain boolean; the alarm additionally carries the
/// controller's message and numeric code when present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopCause {
    pub alarm: bool,
    pub alarm_message: Option<String>,
    pub alarm_code: Option<String>,
    pub power_off: bool,
    pub setup: bool,
    pub maintenance: bool,
    pub no_operator: bool,
    pub waiting: bool,
    pub feed_hold: bool,
    pub program_stop: bool,
}

impl StopCause {
    pub fn is_set(&self, flag: StopFlag) -> bool {
        match flag {
            StopFlag::Alarm => self.alarm,
            StopFlag::PowerOff => self.power_off,
            StopFlag::Setup => self.setup,
            StopFlag::Maintenance => self.maintenance,
            StopFlag::NoOperator => self.no_operator,
            StopFlag::Waiting => self.waiting,
            StopFlag::FeedHold => self.feed_hold,
            StopFlag::ProgramStop => self.program_stop,
        }
    }

    /// Builder-style setter, mostly for tests and the simulator.
    pub fn with(mut self, flag: StopFlag) -> Self {
        match flag {
            StopFlag::Alarm => self.alarm = true,
            StopFlag::PowerOff => self.power_off = true,
            StopFlag::Setup => self.setup = true,
            StopFlag::Maintenance => self.maintenance = true,
            StopFlag::NoOperator => self.no_operator = true,
            StopFlag::Waiting => self.waiting = true,
            StopFlag::FeedHold => self.feed_hold = true,
            StopFlag::ProgramStop => self.program_stop = true,
        }
        self
    }
}

/// One observation for one machine at one timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub machine_id: String,
    pub timestamp: NaiveDateTime,
    pub running: bool,
    /// Meaningful only while `running`
    pub program_name: String,
    pub stop_cause: StopCause,
}

impl Sample {
    pub fn running(machine_id: impl Into<String>, timestamp: NaiveDateTime, program: impl Into<String>) -> Self {
        Self {
            machine_id: machine_id.into(),
            timestamp,
            running: true,
            program_name: program.into(),
            stop_cause: StopCause::default(),
        }
    }

    pub fn stopped(machine_id: impl Into<String>, timestamp: NaiveDateTime, cause: StopCause) -> Self {
        Self {
            machine_id: machine_id.into(),
            timestamp,
            running: false,
            program_name: String::new(),
            stop_cause: cause,
        }
    }
}

/// Time-ordered samples for a single machine.
///
/// Construction sorts stably by timestamp and collapses duplicate
/// timestamps to the last sample supplied, so every consumer can rely on a
/// strictly increasing sequence.
#[derive(Debug, Clone, Default)]
pub struct SampleSeries {
    machine_id: String,
    samples: Vec<Sample>,
}

impl SampleSeries {
    pub fn new(machine_id: impl Into<String>, mut samples: Vec<Sample>) -> Self {
        samples.sort_by_key(|s| s.timestamp);

        // Equal timestamps: the later sample in input order replaces the earlier one
        let mut deduped: Vec<Sample> = Vec::with_capacity(samples.len());
        for sample in samples {
            match deduped.last_mut() {
                Some(last) if last.timestamp == sample.timestamp => *last = sample,
                _ => deduped.push(sample),
            }
        }

        Self {
            machine_id: machine_id.into(),
            samples: deduped,
        }
    }

    pub fn machine_id(&self) -> &str {
        &self.machine_id
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.samples.first().map(|s| s.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.samples.last().map(|s| s.timestamp)
    }
}

/// Split a mixed batch into one series per machine.
///
/// Machines appear in the order they are first seen in the batch.
pub fn group_by_machine(samples: Vec<Sample>) -> Vec<SampleSeries> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<Sample>> = HashMap::new();

    for sample in samples {
        if !groups.contains_key(&sample.machine_id) {
            order.push(sample.machine_id.clone());
        }
        groups.entry(sample.machine_id.clone()).or_default().push(sample);
    }

    order
        .into_iter()
        .map(|machine| {
            let group = groups.remove(&machine).unwrap_or_default();
            SampleSeries::new(machine, group)
        })
        .collect()
}

/// Display name for a machine: the part before the first separator.
///
/// `"DMU50_Hall2"` with separator `"_"` becomes `"DMU50"`.
pub fn short_name<'a>(machine: &'a str, separator: &str) -> &'a str {
    if separator.is_empty() {
        return machine;
    }
    machine.split(separator).next().unwrap_or(machine)
}
