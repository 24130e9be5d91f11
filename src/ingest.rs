//! Controller CSV ingestion
//!
//! Parses the machine-state export written by the shop-floor controller into
//! [`Sample`]s. One row per machine per minute:
//!
//! ```text
//! Date,MachineName,RunState,ProgramFileName,AlarmState,AlarmMessage,AlarmNo,PowerOn,SetUp,...
//! 2024.01.01 08:00:00,DMU50_Hall2,1,O1234.NC,0,,,1,0,...
//! ```
//!
//! Columns are located by header name, so order and extra columns do not
//! matter. `Date`, `MachineName` and `RunState` are required; every flag
//! column is optional and reads as unset when absent. Flags are `"1"` when
//! set, except `PowerOn`, where `"0"` means the machine is powered off.
//!
//! Rows that cannot be turned into a sample are counted and skipped. The
//! segmentation engine only ever sees well-formed samples.

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::IngestConfig;
use crate::types::{ReportPeriod, Sample, StopCause};

/// Maximum parse errors logged individually per file
const MAX_LOGGED_ERRORS: usize = 10;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV input is empty")]
    Empty,
    #[error("CSV header is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("no valid samples: {malformed} malformed rows")]
    NoValidRows { malformed: usize },
}

// ============================================================================
// CSV Quote-Aware Parsing
// ============================================================================

/// Split a CSV line respecting quoted fields (handles commas inside quotes).
fn csv_split(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}

// ============================================================================
// Column Mapping
// ============================================================================

/// Header name → column index
#[derive(Debug, Clone, Default)]
struct ColumnMap {
    date: Option<usize>,
    machine: Option<usize>,
    run_state: Option<usize>,
    program: Option<usize>,
    alarm: Option<usize>,
    alarm_message: Option<usize>,
    alarm_code: Option<usize>,
    power_on: Option<usize>,
    setup: Option<usize>,
    maintenance: Option<usize>,
    no_operator: Option<usize>,
    wait: Option<usize>,
    feed_hold: Option<usize>,
    program_stop: Option<usize>,
}

impl ColumnMap {
    fn from_header(header: &str) -> Self {
        let mut map = Self::default();
        let header = header.trim_start_matches('\u{feff}');

        for (idx, col) in csv_split(header).iter().enumerate() {
            let slot = match col.trim().to_ascii_lowercase().as_str() {
                "date" | "timestamp" => &mut map.date,
                "machinename" | "machine" => &mut map.machine,
                "runstate" => &mut map.run_state,
                "programfilename" | "program" => &mut map.program,
                "alarmstate" => &mut map.alarm,
                "alarmmessage" => &mut map.alarm_message,
                "alarmno" => &mut map.alarm_code,
                "poweron" => &mut map.power_on,
                "setup" => &mut map.setup,
                "maintenance" => &mut map.maintenance,
                "nooperator" => &mut map.no_operator,
                "wait" => &mut map.wait,
                "feedholdstate" => &mut map.feed_hold,
                "programstopstate" => &mut map.program_stop,
                _ => continue,
            };
            // First occurrence wins on duplicate headers
            slot.get_or_insert(idx);
        }
        map
    }

    fn validate(&self) -> Result<(), IngestError> {
        let missing: Vec<String> = [
            ("Date", self.date),
            ("MachineName", self.machine),
            ("RunState", self.run_state),
        ]
        .iter()
        .filter(|(_, idx)| idx.is_none())
        .map(|(name, _)| (*name).to_string())
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(IngestError::MissingColumns(missing))
        }
    }

    fn optional_count(&self) -> usize {
        [
            self.program,
            self.alarm,
            self.alarm_message,
            self.alarm_code,
            self.power_on,
            self.setup,
            self.maintenance,
            self.no_operator,
            self.wait,
            self.feed_hold,
            self.program_stop,
        ]
        .iter()
        .filter(|c| c.is_some())
        .count()
    }
}

// ============================================================================
// Row Parsing
// ============================================================================

fn field<'a>(fields: &'a [String], idx: Option<usize>) -> Option<&'a str> {
    idx.and_then(|i| fields.get(i)).map(|f| f.trim())
}

fn flag(fields: &[String], idx: Option<usize>) -> bool {
    field(fields, idx) == Some("1")
}

fn text(fields: &[String], idx: Option<usize>) -> Option<String> {
    field(fields, idx).filter(|t| !t.is_empty()).map(str::to_string)
}

fn parse_row(line: &str, cols: &ColumnMap, timestamp_format: &str) -> Result<Sample, String> {
    let fields = csv_split(line);

    let date = field(&fields, cols.date).ok_or("missing Date field")?;
    let timestamp = NaiveDateTime::parse_from_str(date, timestamp_format)
        .map_err(|e| format!("bad timestamp {:?}: {}", date, e))?;

    let machine = field(&fields, cols.machine)
        .filter(|m| !m.is_empty())
        .ok_or("missing MachineName")?;

    let run_state = field(&fields, cols.run_state).ok_or("missing RunState field")?;

    if run_state == "1" {
        let program = field(&fields, cols.program).unwrap_or_default();
        return Ok(Sample::running(machine, timestamp, program));
    }

    let cause = StopCause {
        alarm: flag(&fields, cols.alarm),
        alarm_message: text(&fields, cols.alarm_message),
        alarm_code: text(&fields, cols.alarm_code),
        power_off: field(&fields, cols.power_on) == Some("0"),
        setup: flag(&fields, cols.setup),
        maintenance: flag(&fields, cols.maintenance),
        no_operator: flag(&fields, cols.no_operator),
        waiting: flag(&fields, cols.wait),
        feed_hold: flag(&fields, cols.feed_hold),
        program_stop: flag(&fields, cols.program_stop),
    };
    Ok(Sample::stopped(machine, timestamp, cause))
}

// ============================================================================
// Loading
// ============================================================================

/// Row counts from one ingest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub rows: usize,
    pub samples: usize,
    pub malformed: usize,
}

/// Parse CSV text into samples
pub fn parse_csv_str(contents: &str, config: &IngestConfig) -> Result<(Vec<Sample>, IngestReport), IngestError> {
    let mut lines = contents.lines();
    let header = lines.next().ok_or(IngestError::Empty)?;

    let cols = ColumnMap::from_header(header);
    cols.validate()?;
    tracing::debug!(optional_columns = cols.optional_count(), "CSV header mapped");

    let mut samples = Vec::new();
    let mut report = IngestReport::default();

    for (offset, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        report.rows += 1;

        match parse_row(line, &cols, &config.timestamp_format) {
            Ok(sample) => samples.push(sample),
            Err(e) => {
                if report.malformed < MAX_LOGGED_ERRORS {
                    tracing::warn!(line = offset + 2, error = %e, "Skipping malformed row");
                }
                report.malformed += 1;
            }
        }
    }

    report.samples = samples.len();
    if samples.is_empty() && report.malformed > 0 {
        return Err(IngestError::NoValidRows {
            malformed: report.malformed,
        });
    }

    Ok((samples, report))
}

/// Read and parse a CSV export from disk
pub fn load_csv(path: impl AsRef<Path>, config: &IngestConfig) -> Result<(Vec<Sample>, IngestReport), IngestError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let (samples, report) = parse_csv_str(&contents, config)?;
    tracing::info!(
        file = %path.display(),
        rows = report.rows,
        samples = report.samples,
        malformed = report.malformed,
        "CSV loaded"
    );
    Ok((samples, report))
}

/// Keep the samples within `hours` of the newest one.
///
/// The period ends at the newest timestamp in the batch and starts `hours`
/// earlier; samples exactly on the start are kept. Returns `None` for an
/// empty batch.
pub fn select_window(samples: Vec<Sample>, hours: u32) -> Option<(Vec<Sample>, ReportPeriod)> {
    let to = samples.iter().map(|s| s.timestamp).max()?;
    let from = to - Duration::hours(i64::from(hours));

    let kept: Vec<Sample> = samples.into_iter().filter(|s| s.timestamp >= from).collect();
    Some((kept, ReportPeriod::new(from, to)))
}
