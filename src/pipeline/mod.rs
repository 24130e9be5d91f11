//! Processing Pipeline Module
//!
//! ```text
//! STEP 1: Ingestion        (CSV → samples, outside the engine)
//! STEP 2: Grouping         (samples → one sorted series per machine)
//! STEP 3: Extraction       (cycles, downtime, timeline; parallel per machine)
//! STEP 4: History          (daily summaries + events, one atomic batch)
//! STEP 5: Alert evaluation (downtime events over threshold)
//! ```
//!
//! Steps 2-3 are [`analyze`] and never fail. Step 4 may fail; the run then
//! carries on in degraded mode with the extraction results intact.

mod coordinator;

pub use coordinator::{run, HistoryStatus, MachineHistory, RunReport};

use rayon::prelude::*;
use serde::Serialize;

use crate::config::MonitorConfig;
use crate::segmentation::{build_timeline, extract_cycles, extract_downtime};
use crate::types::{
    group_by_machine, short_name, Cycle, DowntimeSummary, ReportPeriod, Sample, SampleSeries,
    TimelineSegment,
};

/// Everything derived from one machine's samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MachineAnalysis {
    pub machine: String,
    pub short_name: String,
    pub sample_count: usize,
    pub cycles: Vec<Cycle>,
    pub downtime: DowntimeSummary,
    pub timeline: Vec<TimelineSegment>,
}

/// Per-machine results for one batch, in first-appearance order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchAnalysis {
    pub period: ReportPeriod,
    pub machines: Vec<MachineAnalysis>,
}

impl BatchAnalysis {
    /// `(machine, downtime)` pairs in machine order, as the alert evaluator
    /// takes them.
    pub fn downtime_by_machine(&self) -> impl Iterator<Item = (&str, &DowntimeSummary)> {
        self.machines.iter().map(|m| (m.machine.as_str(), &m.downtime))
    }

    pub fn machine(&self, machine: &str) -> Option<&MachineAnalysis> {
        self.machines.iter().find(|m| m.machine == machine)
    }
}

fn analyze_machine(series: &SampleSeries, period: ReportPeriod, config: &MonitorConfig) -> MachineAnalysis {
    let separator = config.site.machine_separator.as_str();
    MachineAnalysis {
        machine: series.machine_id().to_string(),
        short_name: short_name(series.machine_id(), separator).to_string(),
        sample_count: series.len(),
        cycles: extract_cycles(series, &config.cycles.policy()),
        downtime: extract_downtime(series, &config.downtime.policy()),
        timeline: build_timeline(series, period.from, period.to, &config.timeline, separator),
    }
}

/// Run the three extractors for every machine in the batch.
///
/// Machines are independent, so they are processed in parallel; the output
/// keeps the order in which machines first appear in `samples`.
pub fn analyze(samples: Vec<Sample>, period: ReportPeriod, config: &MonitorConfig) -> BatchAnalysis {
    let series = group_by_machine(samples);

    let machines: Vec<MachineAnalysis> = series
        .par_iter()
        .map(|s| analyze_machine(s, period, config))
        .collect();

    tracing::info!(
        machines = machines.len(),
        from = %period.from,
        to = %period.to,
        "Batch analyzed"
    );

    BatchAnalysis { period, machines }
}
