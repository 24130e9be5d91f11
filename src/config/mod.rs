//! Monitor Configuration Module
//!
//! Provides deployment configuration loaded from TOML files, replacing the
//! hardcoded window, threshold and store settings with operator-tunable values.
//!
//! ## Loading Order
//!
//! 1. `FACTORY_MONITOR_CONFIG` environment variable (path to TOML file)
//! 2. `monitor_config.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! The loaded value is passed explicitly to each component; nothing reads a
//! process-wide config, so tests and concurrent runs can use different settings.
//!
//! ```ignore
//! let config = MonitorConfig::load();
//! let analysis = pipeline::analyze(samples, window, &config);
//! ```

mod monitor_config;
pub mod validation;

pub use monitor_config::*;
