//! Shop-Floor Simulation
//!
//! Generates a controller CSV export for a handful of machines, one row per
//! machine per minute, for demos and manual testing of factory-monitor.
//! Each machine alternates between production runs and stoppages:
//! - Run lengths drawn from a normal distribution around the program's cycle time
//! - Stoppage lengths drawn from an exponential distribution
//! - Stop causes drawn from weighted plant statistics (setup, waiting, alarms, ...)
//!
//! # Usage
//! ```bash
//! ./simulation --hours 2 --machines 4 --seed 7 > machine_data.csv
//! ./factory-monitor analyze --csv machine_data.csv
//! ```

use chrono::{Duration, NaiveDateTime};
use clap::Parser;
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand_distr::{Distribution, Exp, Normal};
use std::io::{self, Write};

// ============================================================================
// Plant Constants
// ============================================================================

/// Controller export header, in the controller's column order
const CSV_HEADER: &str = "Date,MachineName,RunState,ProgramFileName,AlarmState,AlarmMessage,AlarmNo,PowerOn,SetUp,Maintenance,NoOperator,Wait,FeedHoldState,ProgramStopState";

/// Controller timestamp format
const TIMESTAMP_FORMAT: &str = "%Y.%m.%d %H:%M:%S";

const MACHINE_MODELS: &[&str] = &["DMU50", "NLX2500", "VF2", "INTEGREX", "MAZAK", "OKUMA"];
const HALLS: &[&str] = &["Hall1", "Hall2"];
const PROGRAMS: &[&str] = &["O1001.NC", "O1002.NC", "O2040.NC", "BRACKET_A.MPF", "SHAFT_12.MPF"];
const ALARMS: &[(&str, &str)] = &[
    ("SPINDLE OVERLOAD", "1023"),
    ("COOLANT LEVEL LOW", "2010"),
    ("TOOL LIFE EXPIRED", "3301"),
    ("DOOR INTERLOCK", ""),
];

/// Mean production run length (minutes)
const MEAN_RUN_MINUTES: f64 = 18.0;
/// Run length spread (minutes)
const RUN_SD_MINUTES: f64 = 6.0;
/// Mean stoppage length (minutes)
const MEAN_STOP_MINUTES: f64 = 9.0;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "factory-simulation")]
#[command(about = "Synthetic controller CSV export for factory-monitor testing")]
#[command(version = "1.0")]
struct Args {
    /// Simulated duration in hours (1-24)
    #[arg(short = 'H', long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..=24))]
    hours: u32,

    /// Number of machines (1-6)
    #[arg(short, long, default_value = "3", value_parser = clap::value_parser!(u32).range(1..=6))]
    machines: u32,

    /// First timestamp, controller format
    #[arg(long, default_value = "2024.01.01 06:00:00")]
    start: String,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Probability that a stoppage ends with a long breakdown (0-1)
    #[arg(long, default_value = "0.1")]
    breakdown_rate: f64,

    /// Suppress the summary on stderr
    #[arg(short, long)]
    quiet: bool,
}

// ============================================================================
// Stop Causes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum Cause {
    Idle,
    Alarm(usize),
    PowerOff,
    Setup,
    Maintenance,
    NoOperator,
    Waiting,
    FeedHold,
    ProgramStop,
}

/// Relative frequency of each cause at the start of a stoppage
const CAUSE_WEIGHTS: &[(Cause, u32)] = &[
    (Cause::Idle, 10),
    (Cause::Alarm(0), 3),
    (Cause::Alarm(1), 2),
    (Cause::Alarm(2), 2),
    (Cause::Alarm(3), 1),
    (Cause::PowerOff, 1),
    (Cause::Setup, 12),
    (Cause::Maintenance, 2),
    (Cause::NoOperator, 5),
    (Cause::Waiting, 8),
    (Cause::FeedHold, 3),
    (Cause::ProgramStop, 4),
];

// ============================================================================
// Machine State
// ============================================================================

enum Activity {
    Running { program: &'static str },
    Stopped { cause: Cause },
}

struct Machine {
    name: String,
    activity: Activity,
    minutes_left: u32,
    run_minutes: u32,
    stop_minutes: u32,
}

struct Simulation {
    rng: StdRng,
    run_length: Normal<f64>,
    stop_length: Exp<f64>,
    causes: WeightedIndex<u32>,
    breakdown_rate: f64,
}

impl Simulation {
    fn new(seed: Option<u64>, breakdown_rate: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            rng,
            run_length: Normal::new(MEAN_RUN_MINUTES, RUN_SD_MINUTES)?,
            stop_length: Exp::new(1.0 / MEAN_STOP_MINUTES)?,
            causes: WeightedIndex::new(CAUSE_WEIGHTS.iter().map(|(_, w)| *w))?,
            breakdown_rate: breakdown_rate.clamp(0.0, 1.0),
        })
    }

    fn next_run(&mut self) -> (Activity, u32) {
        let program = PROGRAMS[self.rng.gen_range(0..PROGRAMS.len())];
        let minutes = self.run_length.sample(&mut self.rng).round().max(1.0) as u32;
        (Activity::Running { program }, minutes)
    }

    fn next_stop(&mut self) -> (Activity, u32) {
        let cause = CAUSE_WEIGHTS[self.causes.sample(&mut self.rng)].0;
        let mut minutes = self.stop_length.sample(&mut self.rng).ceil().max(1.0) as u32;
        // Occasional breakdown long enough to trip the downtime alert
        if self.rng.gen_bool(self.breakdown_rate) {
            minutes += self.rng.gen_range(45..90);
        }
        (Activity::Stopped { cause }, minutes)
    }

    fn advance(&mut self, machine: &mut Machine) {
        if machine.minutes_left > 0 {
            machine.minutes_left -= 1;
            return;
        }
        let (activity, minutes) = match machine.activity {
            Activity::Running { .. } => self.next_stop(),
            Activity::Stopped { .. } => self.next_run(),
        };
        machine.activity = activity;
        machine.minutes_left = minutes.saturating_sub(1);
    }
}

// ============================================================================
// CSV Output
// ============================================================================

fn format_row(ts: NaiveDateTime, machine: &Machine) -> String {
    let date = ts.format(TIMESTAMP_FORMAT);
    match machine.activity {
        Activity::Running { program } => {
            format!("{},{},1,{},0,,,1,0,0,0,0,0,0", date, machine.name, program)
        }
        Activity::Stopped { cause } => {
            let flag = |c: Cause| if c == cause { "1" } else { "0" };
            let (alarm, message, code) = match cause {
                Cause::Alarm(i) => ("1", ALARMS[i].0, ALARMS[i].1),
                _ => ("0", "", ""),
            };
            let power_on = if cause == Cause::PowerOff { "0" } else { "1" };
            format!(
                "{},{},0,,{},{},{},{},{},{},{},{},{},{}",
                date,
                machine.name,
                alarm,
                message,
                code,
                power_on,
                flag(Cause::Setup),
                flag(Cause::Maintenance),
                flag(Cause::NoOperator),
                flag(Cause::Waiting),
                flag(Cause::FeedHold),
                flag(Cause::ProgramStop),
            )
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let start = NaiveDateTime::parse_from_str(&args.start, TIMESTAMP_FORMAT)?;
    let mut sim = Simulation::new(args.seed, args.breakdown_rate)?;

    let mut machines: Vec<Machine> = (0..args.machines as usize)
        .map(|i| {
            let (activity, minutes) = if sim.rng.gen_bool(0.7) { sim.next_run() } else { sim.next_stop() };
            Machine {
                name: format!("{}_{}", MACHINE_MODELS[i], HALLS[i % HALLS.len()]),
                activity,
                minutes_left: minutes,
                run_minutes: 0,
                stop_minutes: 0,
            }
        })
        .collect();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}", CSV_HEADER)?;

    let total_minutes = args.hours as i64 * 60;
    for minute in 0..total_minutes {
        let ts = start + Duration::minutes(minute);
        for machine in machines.iter_mut() {
            writeln!(out, "{}", format_row(ts, machine))?;
            match machine.activity {
                Activity::Running { .. } => machine.run_minutes += 1,
                Activity::Stopped { .. } => machine.stop_minutes += 1,
            }
            sim.advance(machine);
        }
    }
    out.flush()?;

    if !args.quiet {
        eprintln!("{}", "=".repeat(50));
        eprintln!("Simulated {} machines x {} minutes from {}", machines.len(), total_minutes, args.start);
        for m in &machines {
            let total = (m.run_minutes + m.stop_minutes).max(1);
            eprintln!(
                "  {:<16} run {:>4} min  stop {:>4} min  ({:.1}% efficiency)",
                m.name,
                m.run_minutes,
                m.stop_minutes,
                m.run_minutes as f64 / total as f64 * 100.0
            );
        }
        eprintln!("{}", "=".repeat(50));
    }

    Ok(())
}
