//! Downtime alerting
//!
//! [`evaluate`] is a pure scan over the downtime results. Delivery goes
//! through the [`Notifier`] trait so the transport (chat bot, mail, log)
//! stays outside the engine.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::config::AlertConfig;
use crate::types::{short_name, DowntimeEvent, DowntimeSummary};

const TIME_FORMAT: &str = "%H:%M";

/// A downtime event long enough to report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub machine: String,
    pub event: DowntimeEvent,
}

/// Every downtime event lasting at least `threshold_minutes`, machines in
/// input order, events in extractor order.
///
/// Ongoing events qualify on their duration so far.
pub fn evaluate<'a, I>(downtime_by_machine: I, threshold_minutes: i64) -> Vec<Alert>
where
    I: IntoIterator<Item = (&'a str, &'a DowntimeSummary)>,
{
    downtime_by_machine
        .into_iter()
        .flat_map(|(machine, summary)| {
            summary
                .events
                .iter()
                .filter(move |event| event.duration_minutes >= threshold_minutes)
                .map(move |event| Alert {
                    machine: machine.to_string(),
                    event: event.clone(),
                })
        })
        .collect()
}

/// Plain-text alert body.
///
/// ```text
/// Machine Downtime Alert  10:30
/// Report: https://example.org/report
///
/// DMU50  09:10–ongoing  80 min
///    Reason: Alarm: SPINDLE OVERLOAD
/// ```
pub fn format_alert_message(
    alerts: &[Alert],
    period_to: NaiveDateTime,
    report_url: Option<&str>,
    machine_separator: &str,
) -> String {
    let mut lines = vec![format!("Machine Downtime Alert  {}", period_to.format(TIME_FORMAT))];
    if let Some(url) = report_url.filter(|u| !u.trim().is_empty()) {
        lines.push(format!("Report: {}", url));
    }

    for alert in alerts {
        let event = &alert.event;
        let end = event
            .end
            .map(|e| e.format(TIME_FORMAT).to_string())
            .unwrap_or_else(|| "ongoing".to_string());
        lines.push(format!(
            "\n{}  {}–{}  {} min\n   Reason: {}",
            short_name(&alert.machine, machine_separator),
            event.start.format(TIME_FORMAT),
            end,
            event.duration_minutes,
            event.reason
        ));
    }

    lines.join("\n")
}

/// Delivery failure reported by a [`Notifier`].
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Outbound alert channel
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str) -> Result<(), NotifyError>;

    fn name(&self) -> &'static str;
}

/// Writes alerts to the log at WARN level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) -> Result<(), NotifyError> {
        tracing::warn!(target: "alerts", "{}", message);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Keeps every message in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) -> Result<(), NotifyError> {
        self.messages
            .lock()
            .map_err(|e| NotifyError::Delivery(e.to_string()))?
            .push(message.to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Format and send the alerts, if any. Returns whether a message went out.
pub fn dispatch(
    alerts: &[Alert],
    period_to: NaiveDateTime,
    config: &AlertConfig,
    machine_separator: &str,
    notifier: &dyn Notifier,
) -> Result<bool, NotifyError> {
    if !config.enabled || alerts.is_empty() {
        return Ok(false);
    }

    let message = format_alert_message(alerts, period_to, config.report_url.as_deref(), machine_separator);
    notifier.notify(&message)?;
    tracing::info!(
        alerts = alerts.len(),
        notifier = notifier.name(),
        "Downtime alert sent"
    );
    Ok(true)
}
