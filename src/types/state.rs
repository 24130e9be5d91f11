//! Core state types: MachineState, StopFlag

use serde::{Deserialize, Serialize};

/// Classified state of a machine over one segment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MachineState {
    Running,
    #[default]
    Stopped,
}

impl MachineState {
    pub fn from_running(running: bool) -> Self {
        if running {
            MachineState::Running
        } else {
            MachineState::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, MachineState::Running)
    }
}

impl std::fmt::Display for MachineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MachineState::Running => write!(f, "Running"),
            MachineState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// One of the mutually-exclusive stop-cause flags reported by the controller.
///
/// Declaration order is the order the controller export lists them in; the
/// attribution priority lives in [`crate::segmentation::reason::REASON_CHAIN`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StopFlag {
    Alarm,
    PowerOff,
    Setup,
    Maintenance,
    NoOperator,
    Waiting,
    FeedHold,
    ProgramStop,
}

impl StopFlag {
    pub const ALL: [StopFlag; 8] = [
        StopFlag::Alarm,
        StopFlag::PowerOff,
        StopFlag::Setup,
        StopFlag::Maintenance,
        StopFlag::NoOperator,
        StopFlag::Waiting,
        StopFlag::FeedHold,
        StopFlag::ProgramStop,
    ];

    /// Short code for logging
    pub fn short_code(&self) -> &'static str {
        match self {
            StopFlag::Alarm => "ALARM",
            StopFlag::PowerOff => "PWR",
            StopFlag::Setup => "SETUP",
            StopFlag::Maintenance => "MAINT",
            StopFlag::NoOperator => "NOOP",
            StopFlag::Waiting => "WAIT",
            StopFlag::FeedHold => "FHOLD",
            StopFlag::ProgramStop => "PSTOP",
        }
    }
}
