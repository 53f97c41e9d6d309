// Alert store - Ordered, newest-first collection of active alerts
use crate::application::random::RandomSource;
use crate::domain::alert::{Alert, AlertDraft, AlertId, AlertKind, Severity};
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

/// Active alerts, newest first. Caps are the caller's business; the store
/// only orders, removes, and hands out ids.
#[derive(Debug, Clone, Default)]
pub struct AlertStore {
    alerts: VecDeque<Alert>,
}

impl AlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with the historical demo alerts.
    pub fn with_demo_alerts(now: DateTime<Utc>) -> Self {
        let mut store = Self::new();
        // Oldest first so the newest ends up at the front.
        for alert in demo_alerts(now).into_iter().rev() {
            store.insert_front(alert);
        }
        store
    }

    /// `now` in milliseconds plus a random offset in `[0, 1000)`. Collisions are
    /// unlikely but possible; dismissal then removes the first twin.
    pub fn assign_id(&self, now: DateTime<Utc>, rng: &mut dyn RandomSource) -> AlertId {
        now.timestamp_millis() + rng.pick(1000) as i64
    }

    pub fn insert_front(&mut self, alert: Alert) {
        self.alerts.push_front(alert);
    }

    /// Give a draft an id and timestamp and insert it at the front.
    pub fn admit(&mut self, draft: AlertDraft, now: DateTime<Utc>, rng: &mut dyn RandomSource) -> AlertId {
        let id = self.assign_id(now, rng);
        self.insert_front(draft.into_alert(id, now));
        id
    }

    /// Remove the first alert with `id`. Unknown ids are a no-op.
    pub fn remove_by_id(&mut self, id: AlertId) -> Option<Alert> {
        let index = self.alerts.iter().position(|alert| alert.id == id)?;
        self.alerts.remove(index)
    }

    pub fn clear(&mut self) {
        self.alerts.clear();
    }

    /// Drop the oldest alerts beyond `limit`, returning how many were dropped.
    pub fn truncate_oldest(&mut self, limit: usize) -> usize {
        let excess = self.alerts.len().saturating_sub(limit);
        self.alerts.truncate(limit);
        excess
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn front(&self) -> Option<&Alert> {
        self.alerts.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter()
    }

    pub fn to_ordered_list(&self) -> Vec<Alert> {
        self.alerts.iter().cloned().collect()
    }

    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.alerts.iter().filter(|a| a.severity == severity).count()
    }

    pub fn count_by_kind(&self, kind: AlertKind) -> usize {
        self.alerts.iter().filter(|a| a.kind == kind).count()
    }
}

/// Historical alerts shown on a fresh start, newest first, with fixed ids.
pub fn demo_alerts(now: DateTime<Utc>) -> Vec<Alert> {
    vec![
        AlertDraft::new(
            AlertKind::Warning,
            Severity::Medium,
            "Battery Temperature High",
            "Battery bank temperature reached 42°C during the afternoon charge cycle",
        )
        .into_alert(1, now - Duration::hours(1)),
        AlertDraft::new(
            AlertKind::Info,
            Severity::Low,
            "Scheduled Maintenance",
            "Inverter firmware update scheduled for Sunday 02:00",
        )
        .into_alert(2, now - Duration::hours(3)),
        AlertDraft::new(
            AlertKind::Error,
            Severity::High,
            "Wind Turbine Offline",
            "Turbine 2 tripped on overspeed protection and was restarted",
        )
        .into_alert(3, now - Duration::days(1)),
    ]
}
