//! Run coordination: analysis, history commit, alert evaluation.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use super::{analyze, BatchAnalysis};
use crate::aggregator::{HistoryAggregator, MachineDay};
use crate::alerts::{evaluate, Alert};
use crate::config::MonitorConfig;
use crate::storage::StoreError;
use crate::types::{CommitStats, DailySummary, ReportPeriod, Sample};

/// Outcome of the history step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HistoryStatus {
    /// Rows were written. `read_error` is set when the rolling history could
    /// not be read back afterwards; per-machine history is then empty.
    Committed {
        stats: CommitStats,
        #[serde(skip_serializing_if = "Option::is_none")]
        read_error: Option<String>,
    },
    /// History could not be written. Extraction results are still complete;
    /// per-machine history is empty.
    Degraded { error: String },
}

impl HistoryStatus {
    pub fn is_degraded(&self) -> bool {
        matches!(self, HistoryStatus::Degraded { .. })
    }
}

/// Rolling history for one machine, oldest day first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MachineHistory {
    pub machine: String,
    pub days: Vec<DailySummary>,
}

/// Everything a run produced, ready for rendering or JSON export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub site: String,
    pub date: NaiveDate,
    pub analysis: BatchAnalysis,
    pub history_status: HistoryStatus,
    pub history: Vec<MachineHistory>,
    pub alerts: Vec<Alert>,
}

impl RunReport {
    pub fn period(&self) -> ReportPeriod {
        self.analysis.period
    }
}

fn record(
    analysis: &BatchAnalysis,
    date: NaiveDate,
    aggregator: &HistoryAggregator,
) -> Result<CommitStats, StoreError> {
    let days: Vec<MachineDay<'_>> = analysis
        .machines
        .iter()
        .map(|m| MachineDay {
            machine: &m.machine,
            cycles: &m.cycles,
            downtime: &m.downtime,
        })
        .collect();
    aggregator.record(date, &days)
}

fn load_history(analysis: &BatchAnalysis, aggregator: &HistoryAggregator) -> Result<Vec<MachineHistory>, StoreError> {
    let limit = aggregator.default_days();
    analysis
        .machines
        .iter()
        .map(|m| {
            Ok(MachineHistory {
                machine: m.machine.clone(),
                days: aggregator.history(&m.machine, limit)?,
            })
        })
        .collect()
}

/// Analyze a batch, fold it into history for `date`, and evaluate alerts.
///
/// Without an aggregator, or when the store fails, the report is returned in
/// degraded mode instead of failing the run.
pub fn run(
    samples: Vec<Sample>,
    period: ReportPeriod,
    date: NaiveDate,
    config: &MonitorConfig,
    aggregator: Option<&HistoryAggregator>,
) -> RunReport {
    let analysis = analyze(samples, period, config);

    let (history_status, history) = match aggregator {
        Some(agg) => match record(&analysis, date, agg) {
            Ok(stats) => match load_history(&analysis, agg) {
                Ok(history) => (HistoryStatus::Committed { stats, read_error: None }, history),
                Err(e) => {
                    warn!(%date, error = %e, "History committed but could not be read back");
                    let status = HistoryStatus::Committed {
                        stats,
                        read_error: Some(e.to_string()),
                    };
                    (status, Vec::new())
                }
            },
            Err(e) => {
                warn!(%date, error = %e, "History unavailable, continuing without it");
                (HistoryStatus::Degraded { error: e.to_string() }, Vec::new())
            }
        },
        None => (
            HistoryStatus::Degraded {
                error: "no history store configured".to_string(),
            },
            Vec::new(),
        ),
    };

    let alerts = evaluate(analysis.downtime_by_machine(), config.alerts.threshold_minutes);
    info!(
        %date,
        machines = analysis.machines.len(),
        alerts = alerts.len(),
        degraded = history_status.is_degraded(),
        "Run complete"
    );

    RunReport {
        site: config.site.name.clone(),
        date,
        analysis,
        history_status,
        history,
        alerts,
    }
}
