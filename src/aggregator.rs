//! History aggregation
//!
//! Folds one run's per-machine cycles and downtime into a [`HistoryBatch`] for
//! a date and commits it. Summaries replace any earlier row for the same
//! (date, machine); events are only added if not already present, so
//! re-processing a period leaves the store unchanged.

use chrono::NaiveDate;
use std::sync::Arc;

use crate::config::HistoryConfig;
use crate::storage::{HistoryStore, StoreError};
use crate::types::{CommitStats, Cycle, DailySummary, DowntimeEventRecord, DowntimeSummary, HistoryBatch};

/// One machine's extractor output for a run.
#[derive(Debug, Clone, Copy)]
pub struct MachineDay<'a> {
    pub machine: &'a str,
    pub cycles: &'a [Cycle],
    pub downtime: &'a DowntimeSummary,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Compute the daily summary row for one machine.
///
/// `total_minutes` is the number of observed samples, not the calendar day.
/// Efficiency is 0 when nothing was observed.
pub fn summarize(date: NaiveDate, day: &MachineDay<'_>) -> DailySummary {
    let downtime = day.downtime;
    let cycle_count = day.cycles.len();
    let avg_cycle_minutes = if cycle_count == 0 {
        0.0
    } else {
        let total: i64 = day.cycles.iter().map(|c| c.duration_minutes).sum();
        round1(total as f64 / cycle_count as f64)
    };
    let efficiency_pct = if downtime.total_minutes > 0 {
        round1((downtime.run_minutes as f64 / downtime.total_minutes as f64 * 100.0).clamp(0.0, 100.0))
    } else {
        0.0
    };

    DailySummary {
        date,
        machine: day.machine.to_string(),
        run_minutes: downtime.run_minutes,
        down_minutes: downtime.down_minutes,
        total_minutes: downtime.total_minutes,
        cycle_count,
        avg_cycle_minutes,
        efficiency_pct,
    }
}

/// Build the full batch for a date without touching the store.
pub fn build_batch(date: NaiveDate, days: &[MachineDay<'_>]) -> HistoryBatch {
    let mut batch = HistoryBatch::new(date);
    for day in days {
        batch.summaries.push(summarize(date, day));
        batch.events.extend(
            day.downtime
                .events
                .iter()
                .map(|event| DowntimeEventRecord::from_event(date, day.machine, event)),
        );
    }
    batch
}

/// Writes run results into the history store and answers trend queries.
#[derive(Clone)]
pub struct HistoryAggregator {
    store: Arc<dyn HistoryStore>,
    config: HistoryConfig,
}

impl HistoryAggregator {
    pub fn new(store: Arc<dyn HistoryStore>, config: HistoryConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn HistoryStore> {
        &self.store
    }

    /// Default look-back for [`Self::history`], in days.
    pub fn default_days(&self) -> usize {
        self.config.days
    }

    /// Commit every machine's results for `date` as one atomic batch.
    pub fn record(&self, date: NaiveDate, days: &[MachineDay<'_>]) -> Result<CommitStats, StoreError> {
        let batch = build_batch(date, days);
        if batch.is_empty() {
            tracing::debug!(%date, "Nothing to record");
            return Ok(CommitStats::default());
        }

        let stats = self.store.commit(&batch)?;
        tracing::info!(
            %date,
            backend = self.store.backend_name(),
            machines = stats.summaries_written,
            new_events = stats.events_inserted,
            known_events = stats.events_skipped,
            "History recorded"
        );
        Ok(stats)
    }

    /// Up to `days` most recent summaries for a machine, oldest first.
    /// Fewer rows than requested is normal for a new deployment.
    pub fn history(&self, machine: &str, days: usize) -> Result<Vec<DailySummary>, StoreError> {
        self.store.query_history(machine, days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryHistoryStore;
    use crate::types::DowntimeEvent;
    use chrono::NaiveDateTime;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        day().and_hms_opt(hour, minute, 0).unwrap()
    }

    fn cycle(minutes: i64) -> Cycle {
        Cycle {
            start: at(8, 0),
            end: Some(at(8, 0) + chrono::Duration::minutes(minutes)),
            program: "P1".to_string(),
            duration_minutes: minutes,
            ongoing: false,
        }
    }

    fn downtime(run: i64, down: i64) -> DowntimeSummary {
        DowntimeSummary {
            events: vec![DowntimeEvent {
                start: at(9, 0),
                end: Some(at(9, 10)),
                reason: "Setup".to_string(),
                duration_minutes: 10,
                ongoing: false,
            }],
            run_minutes: run,
            down_minutes: down,
            total_minutes: run + down,
        }
    }

    #[test]
    fn test_summarize_rounds_and_averages() {
        let cycles = vec![cycle(10), cycle(11), cycle(11)];
        let dt = downtime(40, 20);
        let row = summarize(day(), &MachineDay { machine: "M1", cycles: &cycles, downtime: &dt });
        assert_eq!(row.cycle_count, 3);
        assert_eq!(row.avg_cycle_minutes, 10.7);
        assert_eq!(row.efficiency_pct, 66.7);
        assert_eq!(row.total_minutes, 60);
    }

    #[test]
    fn test_summarize_empty_machine() {
        let dt = DowntimeSummary::default();
        let row = summarize(day(), &MachineDay { machine: "M1", cycles: &[], downtime: &dt });
        assert_eq!(row.avg_cycle_minutes, 0.0);
        assert_eq!(row.efficiency_pct, 0.0);
    }

    #[test]
    fn test_record_is_idempotent() {
        let store = Arc::new(InMemoryHistoryStore::new());
        let agg = HistoryAggregator::new(store.clone(), HistoryConfig::default());
        let cycles = vec![cycle(30)];
        let dt = downtime(45, 15);
        let days = [MachineDay { machine: "M1", cycles: &cycles, downtime: &dt }];

        agg.record(day(), &days).unwrap();
        let first = agg.history("M1", 7).unwrap();
        let second_stats = agg.record(day(), &days).unwrap();
        let second = agg.history("M1", 7).unwrap();

        assert_eq!(first, second);
        assert_eq!(second_stats.events_inserted, 0);
        assert_eq!(store.summary_count(), 1);
        assert_eq!(store.event_count(), 1);
    }

    #[test]
    fn test_record_propagates_store_failure() {
        let store = Arc::new(InMemoryHistoryStore::new());
        store.set_available(false);
        let agg = HistoryAggregator::new(store, HistoryConfig::default());
        let dt = downtime(1, 1);
        let days = [MachineDay { machine: "M1", cycles: &[], downtime: &dt }];
        assert!(matches!(agg.record(day(), &days), Err(StoreError::Unavailable(_))));
    }
}
