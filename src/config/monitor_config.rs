//! Monitor Configuration - segmentation policies, thresholds and store
//! location as operator-tunable TOML values
//!
//! Each struct implements `Default` with the plant's standard values: a one
//! hour window, 45 minute alerts, seven days of history.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::segmentation::SegmentPolicy;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "FACTORY_MONITOR_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "monitor_config.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one factory deployment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Site identification and machine naming
    #[serde(default)]
    pub site: SiteConfig,

    /// Analysis window
    #[serde(default)]
    pub window: WindowConfig,

    /// Cycle extraction policy
    #[serde(default)]
    pub cycles: CycleConfig,

    /// Downtime extraction policy
    #[serde(default)]
    pub downtime: DowntimeConfig,

    /// Timeline compaction policy
    #[serde(default)]
    pub timeline: TimelineConfig,

    /// Long-downtime alerting
    #[serde(default)]
    pub alerts: AlertConfig,

    /// Rolling history store
    #[serde(default)]
    pub history: HistoryConfig,

    /// CSV ingestion
    #[serde(default)]
    pub ingest: IngestConfig,
}

impl MonitorConfig {
    /// Load configuration using the standard search order:
    /// 1. `$FACTORY_MONITOR_CONFIG` environment variable
    /// 2. `./monitor_config.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), site = %config.site.name, "Loaded monitor config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(site = %config.site.name, "Loaded monitor config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;

        // Unknown keys only warn; serde ignores them
        for w in super::validation::validate_unknown_keys(&contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Save config to a file.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Monitor config saved");
        Ok(())
    }

    /// Validate all settings, collecting every problem rather than stopping
    /// at the first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.window.hours_back == 0 {
            errors.push("window.hours_back must be > 0".to_string());
        }
        if self.window.hours_back > 24 * 7 {
            errors.push(format!(
                "window.hours_back ({}) must not exceed one week (168)",
                self.window.hours_back
            ));
        }

        if self.cycles.min_duration_minutes < 0 {
            errors.push("cycles.min_duration_minutes must be >= 0".to_string());
        }
        if self.downtime.min_duration_minutes < 0 {
            errors.push("downtime.min_duration_minutes must be >= 0".to_string());
        }

        let w = self.timeline.min_width_pct;
        if !w.is_finite() || !(0.0..100.0).contains(&w) {
            errors.push(format!("timeline.min_width_pct must be in [0, 100), got {w}"));
        }

        if self.alerts.threshold_minutes <= 0 {
            errors.push("alerts.threshold_minutes must be > 0".to_string());
        }

        if self.history.days == 0 {
            errors.push("history.days must be > 0".to_string());
        }
        if self.history.db_path.as_os_str().is_empty() {
            errors.push("history.db_path must not be empty".to_string());
        }

        if self.ingest.timestamp_format.trim().is_empty() {
            errors.push("ingest.timestamp_format must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {1}", .0.display())]
    Io(PathBuf, std::io::Error),

    #[error("Config parse error ({}): {1}", .0.display())]
    Parse(PathBuf, toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(toml::ser::Error),

    #[error("Config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

// ============================================================================
// Sections
// ============================================================================

/// Identification metadata, plus how machine names are shortened for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub name: String,
    /// Machine names are cut at the first occurrence of this separator to
    /// form the short name used in timeline ids and alerts
    pub machine_separator: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: "Factory".to_string(),
            machine_separator: "_".to_string(),
        }
    }
}

/// How much of the export is analysed per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Samples newer than `newest - hours_back` are analysed
    pub hours_back: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { hours_back: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Cycles shorter than this are dropped; 0 keeps every run
    pub min_duration_minutes: i64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            min_duration_minutes: 0,
        }
    }
}

impl CycleConfig {
    pub fn policy(&self) -> SegmentPolicy {
        SegmentPolicy {
            min_duration_minutes: self.min_duration_minutes,
            min_width_pct: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DowntimeConfig {
    /// Stoppages shorter than this are treated as noise; the default of one
    /// minute drops everything that floors to zero
    pub min_duration_minutes: i64,
}

impl Default for DowntimeConfig {
    fn default() -> Self {
        Self {
            min_duration_minutes: 1,
        }
    }
}

impl DowntimeConfig {
    pub fn policy(&self) -> SegmentPolicy {
        SegmentPolicy {
            min_duration_minutes: self.min_duration_minutes,
            min_width_pct: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Segments at or below this share of the window are not rendered
    pub min_width_pct: f64,
    /// Extend the first segment back to the window start when the data
    /// begins later, so the bar has no leading gap
    pub fill_leading_edge: bool,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            min_width_pct: 0.05,
            fill_leading_edge: true,
        }
    }
}

impl TimelineConfig {
    pub fn policy(&self) -> SegmentPolicy {
        SegmentPolicy {
            min_duration_minutes: 0,
            min_width_pct: Some(self.min_width_pct),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub enabled: bool,
    /// Downtime events at or above this many minutes raise an alert
    pub threshold_minutes: i64,
    /// Link to the published report, included in alert messages
    pub report_url: Option<String>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_minutes: 45,
            report_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub db_path: PathBuf,
    /// Rows returned by history queries for trend reporting
    pub days: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/history.db"),
            days: 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// chrono format string of the `Date` column
    pub timestamp_format: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            timestamp_format: "%Y.%m.%d %H:%M:%S".to_string(),
        }
    }
}
