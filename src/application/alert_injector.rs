// Random alert injector - Occasionally raises a canned fault or notice
use crate::application::alert_store::AlertStore;
use crate::application::random::RandomSource;
use crate::domain::alert::{Alert, AlertDraft, AlertKind, Severity};
use crate::infrastructure::config::{AlertConfig, AlertProfile};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertTemplate {
    pub kind: AlertKind,
    pub severity: Severity,
    pub title: &'static str,
    pub description: &'static str,
}

impl AlertTemplate {
    const fn new(kind: AlertKind, severity: Severity, title: &'static str, description: &'static str) -> Self {
        Self {
            kind,
            severity,
            title,
            description,
        }
    }

    pub fn to_draft(&self) -> AlertDraft {
        AlertDraft::new(self.kind, self.severity, self.title, self.description)
    }
}

const GRID_TEMPLATES: &[AlertTemplate] = &[
    AlertTemplate::new(
        AlertKind::Warning,
        Severity::Medium,
        "Low Solar Irradiance",
        "Solar array output is below the forecast for current conditions",
    ),
    AlertTemplate::new(
        AlertKind::Info,
        Severity::Low,
        "Grid Synchronization",
        "Microgrid resynchronized with the utility feeder",
    ),
    AlertTemplate::new(
        AlertKind::Error,
        Severity::High,
        "Inverter Fault",
        "Inverter 1 reported an overcurrent trip",
    ),
    AlertTemplate::new(
        AlertKind::Warning,
        Severity::Medium,
        "High Load Demand",
        "Consumption is approaching the configured peak limit",
    ),
    AlertTemplate::new(
        AlertKind::Info,
        Severity::Low,
        "Battery Fully Charged",
        "Battery bank reached full state of charge",
    ),
];

const CONVERTER_TEMPLATES: &[AlertTemplate] = &[
    AlertTemplate::new(
        AlertKind::Warning,
        Severity::Medium,
        "Converter Temperature Rising",
        "Boost converter heatsink temperature is above 70°C",
    ),
    AlertTemplate::new(
        AlertKind::Error,
        Severity::High,
        "Switching Fault",
        "Boost converter MOSFET gate driver reported a fault",
    ),
    AlertTemplate::new(
        AlertKind::Info,
        Severity::Low,
        "MPPT Recalibrated",
        "Maximum power point tracking recalibrated the input operating point",
    ),
];

/// Canned templates for a profile. The converter profile adds converter faults
/// to the grid catalog.
pub fn catalog(profile: AlertProfile) -> Vec<AlertTemplate> {
    match profile {
        AlertProfile::Baseline => GRID_TEMPLATES.to_vec(),
        AlertProfile::Converter => GRID_TEMPLATES
            .iter()
            .chain(CONVERTER_TEMPLATES)
            .copied()
            .collect(),
    }
}

#[derive(Debug, Clone)]
pub struct RandomAlertInjector {
    probability: f64,
    pending_cap: usize,
    templates: Vec<AlertTemplate>,
}

impl RandomAlertInjector {
    pub fn new(probability: f64, pending_cap: usize, templates: Vec<AlertTemplate>) -> Self {
        Self {
            probability,
            pending_cap,
            templates,
        }
    }

    pub fn from_config(config: &AlertConfig) -> Self {
        Self::new(
            config.injection_probability(),
            config.pending_cap,
            catalog(config.profile),
        )
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Fires only while the store holds fewer than the cap and the draw is
    /// below the configured probability. A full store consumes no draws.
    pub fn maybe_inject(
        &self,
        store: &AlertStore,
        now: DateTime<Utc>,
        rng: &mut dyn RandomSource,
    ) -> Option<Alert> {
        if store.len() >= self.pending_cap || self.templates.is_empty() {
            return None;
        }
        if rng.next_f64() >= self.probability {
            return None;
        }

        let template = self.templates[rng.pick(self.templates.len())];
        let id = store.assign_id(now, rng);
        Some(template.to_draft().into_alert(id, now))
    }
}
