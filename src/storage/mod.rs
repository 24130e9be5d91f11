//! Daily history storage
//!
//! Per-machine daily summaries and downtime events, persisted behind the
//! [`HistoryStore`] trait. Sled is the on-disk backend; the in-memory backend
//! serves tests and runs where the database cannot be opened.

pub mod history;
pub mod persistence;

pub use history::SledHistoryStore;
pub use persistence::{HistoryStore, InMemoryHistoryStore, StoreError};
