// Console view - Renders dashboard updates as structured log lines
use crate::application::dashboard_sink::{DashboardSink, SinkError};
use crate::domain::alert::{Alert, AlertKind, Severity};
use crate::domain::telemetry::{ConverterUpdate, ReadingUpdate};
use chrono::{DateTime, FixedOffset, Utc};

/// Headless stand-in for the metric cards, gauges, chart, and alert feed.
pub struct ConsoleView {
    offset: FixedOffset,
    last_updated: Option<DateTime<Utc>>,
}

impl ConsoleView {
    pub fn new(offset: FixedOffset) -> Self {
        Self {
            offset,
            last_updated: None,
        }
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }
}

/// One card per present field; absent fields produce nothing.
pub fn render_metric_cards(update: &ReadingUpdate) -> Vec<String> {
    let mut cards = Vec::new();

    if let Some(generation) = update.generation {
        cards.push(format!("Generation {:.1} kWh", generation));
    }
    if let Some(consumption) = update.consumption {
        cards.push(format!("Consumption {:.1} kWh", consumption));
    }
    if let Some(battery) = update.battery_level {
        cards.push(format!("Battery {}%", battery));
    }
    if let Some(efficiency) = update.system_efficiency {
        cards.push(format!("System Efficiency {}%", efficiency));
    }
    if let Some(converter) = &update.converter {
        cards.extend(render_converter_gauges(converter));
    }

    cards
}

fn render_converter_gauges(converter: &ConverterUpdate) -> Vec<String> {
    let gauges = [
        ("Input Voltage", converter.input_voltage, "V"),
        ("Output Voltage", converter.output_voltage, "V"),
        ("Input Current", converter.input_current, "A"),
        ("Output Current", converter.output_current, "A"),
        ("Output Power", converter.output_power, "W"),
        ("Duty Cycle", converter.duty_cycle, "%"),
        ("Converter Efficiency", converter.efficiency, "%"),
    ];

    gauges
        .iter()
        .filter_map(|(name, value, unit)| value.map(|v| format!("{} {:.1}{}", name, v, unit)))
        .collect()
}

/// Alert feed line. The age is recomputed on every render.
pub fn render_alert(alert: &Alert, now: DateTime<Utc>) -> String {
    format!(
        "[{}/{}] {}: {} ({})",
        alert.kind,
        alert.severity,
        alert.title,
        alert.description,
        alert.relative_age(now)
    )
}

impl DashboardSink for ConsoleView {
    fn name(&self) -> &str {
        "console"
    }

    fn on_reading(&mut self, update: &ReadingUpdate) -> Result<(), SinkError> {
        let cards = render_metric_cards(update);
        if cards.is_empty() {
            return Ok(());
        }
        tracing::info!("{}", cards.join(" | "));
        Ok(())
    }

    fn on_alerts_changed(&mut self, alerts: &[Alert], now: DateTime<Utc>) -> Result<(), SinkError> {
        let count = |kind: AlertKind| alerts.iter().filter(|a| a.kind == kind).count();
        let high = alerts.iter().filter(|a| a.severity == Severity::High).count();

        tracing::info!(
            total = alerts.len(),
            errors = count(AlertKind::Error),
            warnings = count(AlertKind::Warning),
            info = count(AlertKind::Info),
            high,
            "alert feed updated"
        );
        for alert in alerts {
            tracing::info!(id = alert.id, "{}", render_alert(alert, now));
        }
        Ok(())
    }

    fn on_chart_point(&mut self, label: &str, generation: f64, consumption: f64) -> Result<(), SinkError> {
        tracing::debug!(label, generation, consumption, "chart point");
        Ok(())
    }

    fn on_clock_tick(&mut self, now: DateTime<Utc>) -> Result<(), SinkError> {
        self.last_updated = Some(now);
        let local = now.with_timezone(&self.offset);
        tracing::trace!("last updated {}", local.format("%H:%M:%S"));
        Ok(())
    }
}
