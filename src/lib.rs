//! Factory Monitor: machine-state segmentation and efficiency history
//!
//! Turns per-minute controller samples into production cycles, downtime
//! events with attributed causes, a fixed-width timeline per machine, and a
//! rolling daily efficiency history.
//!
//! ## Architecture
//!
//! - **Segmentation Engine**: one run-length scan, parameterised by classifier and window
//! - **Extractors**: cycles, downtime and timeline built on the engine
//! - **History Aggregator**: idempotent daily summaries over a pluggable store
//! - **Alert Evaluator**: long-downtime detection with a pluggable notifier

pub mod aggregator;
pub mod alerts;
pub mod config;
pub mod ingest;
pub mod pipeline;
pub mod segmentation;
pub mod storage;
pub mod types;

// Re-export configuration
pub use config::MonitorConfig;

// Re-export commonly used types
pub use types::{
    Cycle, DailySummary, DowntimeEvent, DowntimeEventRecord, DowntimeSummary, MachineState,
    ReportPeriod, Sample, SampleSeries, Segment, StopCause, StopFlag, TimelineSegment,
};

// Re-export engine entry points
pub use segmentation::{build_timeline, extract_cycles, extract_downtime, segment, SegmentPolicy, Window};

// Re-export history
pub use aggregator::{HistoryAggregator, MachineDay};
pub use storage::{HistoryStore, InMemoryHistoryStore, SledHistoryStore, StoreError};

// Re-export run orchestration
pub use alerts::{Alert, LogNotifier, Notifier};
pub use pipeline::{analyze, run, BatchAnalysis, HistoryStatus, RunReport};
