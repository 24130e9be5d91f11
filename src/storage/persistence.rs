//! HistoryStore trait: pluggable history backend
//!
//! Abstracts daily-summary and downtime-event persistence so backends can be
//! swapped without touching the aggregator:
//! - `SledHistoryStore`: embedded on-disk store (production)
//! - `InMemoryHistoryStore`: tests and runs without a writable disk
//!
//! Contract: summaries are upserted by (date, machine); events are inserted
//! only if no row with the same (date, machine, start) exists; a batch is
//! applied completely or not at all.

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::types::{CommitStats, DailySummary, DowntimeEventRecord, HistoryBatch};

/// Trait for pluggable history backends
///
/// Implementations must be thread-safe (Send + Sync) for shared access.
pub trait HistoryStore: Send + Sync {
    /// Atomically apply every summary upsert and event insert in the batch.
    fn commit(&self, batch: &HistoryBatch) -> Result<CommitStats, StoreError>;

    /// Up to `limit` most recent summaries for a machine, oldest first.
    fn query_history(&self, machine: &str, limit: usize) -> Result<Vec<DailySummary>, StoreError>;

    /// Stored downtime events for one machine on one date, by start time.
    fn events_on(&self, date: NaiveDate, machine: &str) -> Result<Vec<DowntimeEventRecord>, StoreError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;

    /// Insert or replace the summary for (date, machine).
    fn upsert_summary(&self, summary: &DailySummary) -> Result<(), StoreError> {
        let mut batch = HistoryBatch::new(summary.date);
        batch.summaries.push(summary.clone());
        self.commit(&batch).map(|_| ())
    }

    /// Insert an event unless one with the same key exists. Returns whether
    /// a row was written.
    fn insert_event_if_absent(&self, record: &DowntimeEventRecord) -> Result<bool, StoreError> {
        let mut batch = HistoryBatch::new(record.date);
        batch.events.push(record.clone());
        self.commit(&batch).map(|stats| stats.events_inserted == 1)
    }
}

/// History store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("history store unavailable: {0}")]
    Unavailable(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("corrupt record under key {key}: {message}")]
    Corrupt { key: String, message: String },
    #[error("batch for {batch} contains a row dated {row}")]
    DateMismatch { batch: NaiveDate, row: NaiveDate },
}

/// Reject a batch carrying rows for another date before anything is written.
pub(crate) fn check_batch_dates(batch: &HistoryBatch) -> Result<(), StoreError> {
    let row = batch
        .summaries
        .iter()
        .map(|s| s.date)
        .chain(batch.events.iter().map(|e| e.date))
        .find(|d| *d != batch.date);
    match row {
        Some(row) => Err(StoreError::DateMismatch { batch: batch.date, row }),
        None => Ok(()),
    }
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

type SummaryKey = (String, NaiveDate);
type EventKey = (NaiveDate, String, NaiveDateTime);

/// In-memory history for tests and degraded deployments
///
/// Thread-safe via `RwLock`. Not durable, data is lost on restart. Can be
/// switched offline to exercise store-failure handling.
pub struct InMemoryHistoryStore {
    summaries: RwLock<BTreeMap<SummaryKey, DailySummary>>,
    events: RwLock<BTreeMap<EventKey, DowntimeEventRecord>>,
    available: AtomicBool,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self {
            summaries: RwLock::new(BTreeMap::new()),
            events: RwLock::new(BTreeMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Make every subsequent call fail with `StoreError::Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("in-memory store switched offline".to_string()))
        }
    }

    pub fn summary_count(&self) -> usize {
        self.summaries.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn event_count(&self) -> usize {
        self.events.read().map(|e| e.len()).unwrap_or(0)
    }
}

impl Default for InMemoryHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn commit(&self, batch: &HistoryBatch) -> Result<CommitStats, StoreError> {
        self.check_available()?;
        check_batch_dates(batch)?;

        // Both locks held for the whole batch: readers never see half of it
        let mut summaries = self
            .summaries
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let mut events = self
            .events
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let mut stats = CommitStats::default();
        for summary in &batch.summaries {
            summaries.insert((summary.machine.clone(), summary.date), summary.clone());
            stats.summaries_written += 1;
        }

        let mut seen: HashSet<EventKey> = HashSet::new();
        for record in &batch.events {
            let key = (record.date, record.machine.clone(), record.start);
            if events.contains_key(&key) || !seen.insert(key.clone()) {
                stats.events_skipped += 1;
                continue;
            }
            events.insert(key, record.clone());
            stats.events_inserted += 1;
        }

        Ok(stats)
    }

    fn query_history(&self, machine: &str, limit: usize) -> Result<Vec<DailySummary>, StoreError> {
        self.check_available()?;
        let store = self
            .summaries
            .read()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let mut rows: Vec<DailySummary> = store
            .iter()
            .rev()
            .filter(|((m, _), _)| m == machine)
            .take(limit)
            .map(|(_, s)| s.clone())
            .collect();
        rows.reverse();
        Ok(rows)
    }

    fn events_on(&self, date: NaiveDate, machine: &str) -> Result<Vec<DowntimeEventRecord>, StoreError> {
        self.check_available()?;
        let store = self
            .events
            .read()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(store
            .iter()
            .filter(|((d, m, _), _)| *d == date && m == machine)
            .map(|(_, r)| r.clone())
            .collect())
    }

    fn backend_name(&self) -> &'static str {
        "InMemory"
    }
}
