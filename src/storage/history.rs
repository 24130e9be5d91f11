//! Sled-backed daily history
//!
//! Two trees in one database:
//! - `daily_summary`: key `machine \0 YYYY-MM-DD`, so a prefix scan per
//!   machine walks its days in date order
//! - `downtime_events`: key `YYYY-MM-DD \0 machine \0 start`, so re-inserting
//!   the same event collides on the key
//!
//! Values are JSON. A batch is written as one multi-tree transaction.

use chrono::{NaiveDate, NaiveDateTime};
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionResult};
use sled::Transactional;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use super::persistence::{HistoryStore, StoreError};
use crate::types::{CommitStats, DailySummary, DowntimeEventRecord, HistoryBatch};

const SUMMARY_TREE: &str = "daily_summary";
const EVENT_TREE: &str = "downtime_events";
const KEY_SEPARATOR: u8 = 0;
const DATE_KEY_FORMAT: &str = "%Y-%m-%d";
const START_KEY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

fn summary_prefix(machine: &str) -> Vec<u8> {
    let mut key = machine.as_bytes().to_vec();
    key.push(KEY_SEPARATOR);
    key
}

fn summary_key(machine: &str, date: NaiveDate) -> Vec<u8> {
    let mut key = summary_prefix(machine);
    key.extend_from_slice(date.format(DATE_KEY_FORMAT).to_string().as_bytes());
    key
}

fn event_prefix(date: NaiveDate, machine: &str) -> Vec<u8> {
    let mut key = date.format(DATE_KEY_FORMAT).to_string().into_bytes();
    key.push(KEY_SEPARATOR);
    key.extend_from_slice(machine.as_bytes());
    key.push(KEY_SEPARATOR);
    key
}

fn event_key(date: NaiveDate, machine: &str, start: NaiveDateTime) -> Vec<u8> {
    let mut key = event_prefix(date, machine);
    key.extend_from_slice(start.format(START_KEY_FORMAT).to_string().as_bytes());
    key
}

fn decode<T: serde::de::DeserializeOwned>(key: &[u8], value: &[u8]) -> Result<T, StoreError> {
    serde_json::from_slice(value).map_err(|e| StoreError::Corrupt {
        key: String::from_utf8_lossy(key).replace('\0', "/"),
        message: e.to_string(),
    })
}

/// Persistent history store on an embedded sled database
#[derive(Clone)]
pub struct SledHistoryStore {
    db: Arc<sled::Db>,
    summaries: sled::Tree,
    events: sled::Tree,
}

impl SledHistoryStore {
    /// Open or create the store at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path_ref = path.as_ref();
        let db = sled::open(path_ref)?;
        let summaries = db.open_tree(SUMMARY_TREE)?;
        let events = db.open_tree(EVENT_TREE)?;

        tracing::info!(path = %path_ref.display(), "History store opened");

        Ok(Self {
            db: Arc::new(db),
            summaries,
            events,
        })
    }

    pub fn summary_count(&self) -> usize {
        self.summaries.len()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}

impl HistoryStore for SledHistoryStore {
    fn commit(&self, batch: &HistoryBatch) -> Result<CommitStats, StoreError> {
        // Serialize outside the transaction; the closure may be retried.
        let summary_rows = batch
            .summaries
            .iter()
            .map(|s| Ok((s.date, summary_key(&s.machine, s.date), serde_json::to_vec(s)?)))
            .collect::<Result<Vec<_>, StoreError>>()?;
        let event_rows = batch
            .events
            .iter()
            .map(|e| Ok((e.date, event_key(e.date, &e.machine, e.start), serde_json::to_vec(e)?)))
            .collect::<Result<Vec<_>, StoreError>>()?;

        // A row for another date aborts the whole transaction, including
        // rows already staged in either tree
        let foreign = |row: NaiveDate| {
            ConflictableTransactionError::Abort(StoreError::DateMismatch { batch: batch.date, row })
        };

        let result: TransactionResult<CommitStats, StoreError> =
            (&self.summaries, &self.events).transaction(|(summaries, events)| {
                let mut stats = CommitStats::default();

                for (date, key, value) in &summary_rows {
                    if *date != batch.date {
                        return Err(foreign(*date));
                    }
                    summaries.insert(key.as_slice(), value.as_slice())?;
                    stats.summaries_written += 1;
                }

                let mut seen: HashSet<&[u8]> = HashSet::new();
                for (date, key, value) in &event_rows {
                    if *date != batch.date {
                        return Err(foreign(*date));
                    }
                    if !seen.insert(key.as_slice()) || events.get(key.as_slice())?.is_some() {
                        stats.events_skipped += 1;
                        continue;
                    }
                    events.insert(key.as_slice(), value.as_slice())?;
                    stats.events_inserted += 1;
                }

                Ok::<_, ConflictableTransactionError<StoreError>>(stats)
            });

        let stats = result.map_err(|e| match e {
            TransactionError::Abort(inner) => inner,
            TransactionError::Storage(err) => StoreError::Unavailable(err.to_string()),
        })?;
        self.db.flush()?;

        tracing::debug!(
            date = %batch.date,
            summaries = stats.summaries_written,
            events_inserted = stats.events_inserted,
            events_skipped = stats.events_skipped,
            "Committed history batch"
        );
        Ok(stats)
    }

    fn query_history(&self, machine: &str, limit: usize) -> Result<Vec<DailySummary>, StoreError> {
        let mut rows = Vec::with_capacity(limit.min(64));

        // Newest first, then flipped to oldest first
        for item in self.summaries.scan_prefix(summary_prefix(machine)).rev() {
            if rows.len() >= limit {
                break;
            }
            let (key, value) = item?;
            rows.push(decode::<DailySummary>(&key, &value)?);
        }

        rows.reverse();
        Ok(rows)
    }

    fn events_on(&self, date: NaiveDate, machine: &str) -> Result<Vec<DowntimeEventRecord>, StoreError> {
        self.events
            .scan_prefix(event_prefix(date, machine))
            .map(|item| {
                let (key, value) = item?;
                decode::<DowntimeEventRecord>(&key, &value)
            })
            .collect()
    }

    fn backend_name(&self) -> &'static str {
        "Sled"
    }
}
