// Alert domain models
use chrono::{DateTime, Utc};
use std::fmt;

pub type AlertId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKind {
    Warning,
    Error,
    Info,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AlertKind::Warning => "warning",
            AlertKind::Error => "error",
            AlertKind::Info => "info",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        };
        f.write_str(name)
    }
}

/// An alert payload that has not yet been given an id or timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertDraft {
    pub kind: AlertKind,
    pub title: String,
    pub description: String,
    pub severity: Severity,
}

impl AlertDraft {
    pub fn new(kind: AlertKind, severity: Severity, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            description: description.into(),
            severity,
        }
    }

    pub fn into_alert(self, id: AlertId, timestamp: DateTime<Utc>) -> Alert {
        Alert {
            id,
            kind: self.kind,
            title: self.title,
            description: self.description,
            severity: self.severity,
            timestamp,
        }
    }
}

/// A stored alert. Fields are never edited after insertion; dismissing removes it.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub id: AlertId,
    pub kind: AlertKind,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    /// Human readable age, computed against `now` at render time.
    pub fn relative_age(&self, now: DateTime<Utc>) -> String {
        let elapsed = now.signed_duration_since(self.timestamp);
        let minutes = elapsed.num_minutes();
        let hours = elapsed.num_hours();
        let days = elapsed.num_days();

        if minutes < 1 {
            "Just now".to_string()
        } else if hours < 1 {
            plural(minutes, "minute")
        } else if days < 1 {
            plural(hours, "hour")
        } else {
            plural(days, "day")
        }
    }
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", count, unit)
    }
}
