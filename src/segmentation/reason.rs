//! Stop-reason attribution
//!
//! A stopped sample may carry several stop flags at once. Exactly one reason
//! is attributed by walking [`REASON_CHAIN`] top to bottom and taking the first
//! flag that is set. Alarms dominate every other cause. Reordering the table
//! changes how historical downtime is attributed.

use crate::types::{StopCause, StopFlag};

/// Fallback reason when no flag is set.
pub const IDLE_REASON: &str = "Idle";

/// Alarm text used when the controller sent neither message nor code.
pub const ALARM_PLACEHOLDER: &str = "—";

/// How a matched flag is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonLabel {
    /// `"Alarm: <message | code | placeholder>"`
    Alarm,
    Fixed(&'static str),
}

/// One row of the priority table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReasonRule {
    pub flag: StopFlag,
    pub label: ReasonLabel,
}

/// Stop-cause priority, highest first.
pub const REASON_CHAIN: [ReasonRule; 8] = [
    ReasonRule { flag: StopFlag::Alarm, label: ReasonLabel::Alarm },
    ReasonRule { flag: StopFlag::PowerOff, label: ReasonLabel::Fixed("Power off") },
    ReasonRule { flag: StopFlag::Setup, label: ReasonLabel::Fixed("Setup") },
    ReasonRule { flag: StopFlag::Maintenance, label: ReasonLabel::Fixed("Maintenance") },
    ReasonRule { flag: StopFlag::NoOperator, label: ReasonLabel::Fixed("No operator") },
    ReasonRule { flag: StopFlag::Waiting, label: ReasonLabel::Fixed("Waiting") },
    ReasonRule { flag: StopFlag::FeedHold, label: ReasonLabel::Fixed("Feed Hold") },
    ReasonRule { flag: StopFlag::ProgramStop, label: ReasonLabel::Fixed("Program Stop") },
];

/// First rule in [`REASON_CHAIN`] whose flag is set.
pub fn dominant_rule(cause: &StopCause) -> Option<&'static ReasonRule> {
    REASON_CHAIN.iter().find(|rule| cause.is_set(rule.flag))
}

/// Single reason label for a stopped sample.
pub fn stop_reason(cause: &StopCause) -> String {
    match dominant_rule(cause) {
        Some(ReasonRule { label: ReasonLabel::Alarm, .. }) => format!("Alarm: {}", alarm_text(cause)),
        Some(ReasonRule { label: ReasonLabel::Fixed(text), .. }) => (*text).to_string(),
        None => IDLE_REASON.to_string(),
    }
}

fn alarm_text(cause: &StopCause) -> &str {
    [cause.alarm_message.as_deref(), cause.alarm_code.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|text| !text.is_empty())
        .unwrap_or(ALARM_PLACEHOLDER)
}
