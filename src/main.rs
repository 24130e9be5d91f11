//! Factory Monitor - machine-state analysis for a shop floor
//!
//! Reads the controller's per-minute CSV export, segments every machine's
//! samples into cycles, downtime events and a timeline, folds the results
//! into a rolling daily history, and raises long-downtime alerts.
//!
//! # Usage
//!
//! ```bash
//! # Analyze the last hour of an export and write a JSON report
//! factory-monitor analyze --csv machine_data.csv --output report.json
//!
//! # Show the last 7 days for one machine
//! factory-monitor history --machine DMU50_Hall2
//!
//! # Check a config file for errors and typos
//! factory-monitor check-config monitor_config.toml
//! ```
//!
//! # Environment Variables
//!
//! - `FACTORY_MONITOR_CONFIG`: Path to the TOML config (default: ./monitor_config.toml)
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use factory_monitor::alerts::{self, LogNotifier};
use factory_monitor::config::{validation, MonitorConfig};
use factory_monitor::ingest;
use factory_monitor::pipeline;
use factory_monitor::storage::SledHistoryStore;
use factory_monitor::HistoryAggregator;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "factory-monitor")]
#[command(about = "Machine-state segmentation and efficiency history for a factory floor")]
#[command(version)]
struct CliArgs {
    /// Config file (overrides FACTORY_MONITOR_CONFIG and ./monitor_config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Analyze a CSV export, update history and evaluate alerts
    Analyze {
        /// Controller CSV export
        #[arg(long)]
        csv: PathBuf,

        /// History database directory (overrides history.db_path)
        #[arg(long)]
        db: Option<PathBuf>,

        /// Hours of data to analyze, counted back from the newest sample
        #[arg(long)]
        hours: Option<u32>,

        /// Write the JSON report here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Skip the history store entirely
        #[arg(long)]
        no_history: bool,
    },

    /// Print the rolling daily history for a machine
    History {
        /// Full machine name as it appears in the export
        #[arg(long)]
        machine: String,

        /// Number of days (default: history.days)
        #[arg(long)]
        days: Option<usize>,

        /// History database directory (overrides history.db_path)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Validate a config file and report unknown keys
    CheckConfig {
        /// TOML file to check
        path: PathBuf,
    },
}

// ============================================================================
// Helpers
// ============================================================================

fn load_config(path: Option<&Path>) -> Result<MonitorConfig> {
    match path {
        Some(p) => MonitorConfig::load_from_file(p)
            .with_context(|| format!("Failed to load config from {}", p.display())),
        None => Ok(MonitorConfig::load()),
    }
}

fn open_store(path: &Path) -> Result<SledHistoryStore> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    SledHistoryStore::open(path).with_context(|| format!("Failed to open history store at {}", path.display()))
}

// ============================================================================
// Subcommands
// ============================================================================

fn cmd_analyze(
    mut config: MonitorConfig,
    csv: &Path,
    db: Option<PathBuf>,
    hours: Option<u32>,
    output: Option<&Path>,
    no_history: bool,
) -> Result<()> {
    if let Some(h) = hours {
        config.window.hours_back = h;
    }
    if let Some(db) = db {
        config.history.db_path = db;
    }
    config.validate().context("Invalid configuration")?;

    let (samples, ingest_report) = ingest::load_csv(csv, &config.ingest)
        .with_context(|| format!("Failed to ingest {}", csv.display()))?;

    let Some((samples, period)) = ingest::select_window(samples, config.window.hours_back) else {
        anyhow::bail!("{} contains no samples", csv.display());
    };
    info!(
        samples = samples.len(),
        malformed = ingest_report.malformed,
        from = %period.from,
        to = %period.to,
        "Analysis window selected"
    );

    // A broken store degrades the run instead of aborting it
    let aggregator = if no_history {
        None
    } else {
        match open_store(&config.history.db_path) {
            Ok(store) => Some(HistoryAggregator::new(Arc::new(store), config.history.clone())),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "History store unavailable, running degraded");
                None
            }
        }
    };

    let report = pipeline::run(samples, period, period.date(), &config, aggregator.as_ref());

    if let Err(e) = alerts::dispatch(
        &report.alerts,
        period.to,
        &config.alerts,
        &config.site.machine_separator,
        &LogNotifier,
    ) {
        warn!(error = %e, "Failed to deliver downtime alert");
    }

    let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Report written");
        }
        None => println!("{}", json),
    }

    Ok(())
}

fn cmd_history(config: MonitorConfig, machine: &str, days: Option<usize>, db: Option<PathBuf>) -> Result<()> {
    let db_path = db.unwrap_or_else(|| config.history.db_path.clone());
    let store = open_store(&db_path)?;
    let aggregator = HistoryAggregator::new(Arc::new(store), config.history.clone());
    let days = days.unwrap_or(aggregator.default_days());

    let rows = aggregator
        .history(machine, days)
        .with_context(|| format!("Failed to read history for {}", machine))?;

    if rows.is_empty() {
        println!("No history for {}", machine);
        return Ok(());
    }

    println!("{:<12} {:>8} {:>8} {:>8} {:>7} {:>10} {:>8}", "date", "run", "down", "total", "cycles", "avg cycle", "eff %");
    for row in rows {
        println!(
            "{:<12} {:>8} {:>8} {:>8} {:>7} {:>10.1} {:>8.1}",
            row.date, row.run_minutes, row.down_minutes, row.total_minutes, row.cycle_count, row.avg_cycle_minutes, row.efficiency_pct
        );
    }
    Ok(())
}

fn cmd_check_config(path: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let warnings = validation::validate_unknown_keys(&raw);
    for w in &warnings {
        println!("warning: {}", w);
    }

    MonitorConfig::from_toml_str(&raw).with_context(|| format!("{} is invalid", path.display()))?;
    println!("{}: OK ({} warning(s))", path.display(), warnings.len());
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();

    match args.command {
        SubCommand::CheckConfig { path } => cmd_check_config(&path),
        SubCommand::Analyze { csv, db, hours, output, no_history } => {
            let config = load_config(args.config.as_deref())?;
            cmd_analyze(config, &csv, db, hours, output.as_deref(), no_history)
        }
        SubCommand::History { machine, days, db } => {
            let config = load_config(args.config.as_deref())?;
            cmd_history(config, &machine, days, db)
        }
    }
}
