// Monitoring service - One generation/evaluation cycle per tick plus external ingest
use crate::application::alert_evaluator::{ConverterAlertEvaluator, ConverterThresholds};
use crate::application::alert_injector::RandomAlertInjector;
use crate::application::alert_store::AlertStore;
use crate::application::dashboard_sink::SinkSet;
use crate::application::random::RandomSource;
use crate::application::signal_generator::SignalGenerator;
use crate::application::telemetry_source::ExternalPayload;
use crate::domain::alert::{AlertDraft, AlertId};
use crate::domain::telemetry::{ChartData, Reading, ReadingUpdate};
use crate::infrastructure::config::DashboardConfig;
use chrono::{DateTime, Duration, Utc};

/// What a single tick did, for logging and tests.
#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub reading: Reading,
    pub raised: Vec<AlertId>,
    pub injected: Option<AlertId>,
    pub trimmed: usize,
}

/// Owns every piece of mutable dashboard state. Only the scheduler task drives it.
pub struct MonitoringService {
    generator: SignalGenerator,
    evaluator: ConverterAlertEvaluator,
    injector: RandomAlertInjector,
    alerts: AlertStore,
    chart: ChartData,
    rng: Box<dyn RandomSource>,
    last_battery_level: i64,
    battery_min: i64,
    battery_max: i64,
    retention_limit: usize,
    ticks: u64,
}

impl MonitoringService {
    pub fn new(
        config: &DashboardConfig,
        alerts: AlertStore,
        chart: ChartData,
        rng: Box<dyn RandomSource>,
    ) -> Self {
        Self {
            generator: SignalGenerator::new(config),
            evaluator: ConverterAlertEvaluator::new(ConverterThresholds::from_config(&config.alerts)),
            injector: RandomAlertInjector::from_config(&config.alerts),
            alerts,
            chart,
            rng,
            last_battery_level: config.battery.initial,
            battery_min: config.battery.min,
            battery_max: config.battery.max,
            retention_limit: config.alerts.retention_limit,
            ticks: 0,
        }
    }

    pub fn alerts(&self) -> &AlertStore {
        &self.alerts
    }

    pub fn chart(&self) -> &ChartData {
        &self.chart
    }

    pub fn last_battery_level(&self) -> i64 {
        self.last_battery_level
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Chart label for `now` in site-local time.
    pub fn label(&self, now: DateTime<Utc>) -> String {
        now.with_timezone(&self.generator.site_offset())
            .format("%H:%M:%S")
            .to_string()
    }

    /// Fill the chart with one reading per `period` leading up to `now`, so the
    /// first render is not empty. Battery state threads through the history.
    pub fn backfill(&mut self, now: DateTime<Utc>, period: Duration, sinks: &mut SinkSet) {
        let points = self.chart.max_points() as i32;
        for step in (1..=points).rev() {
            let at = now - period * step;
            let reading = self.generator.generate(at, self.last_battery_level, self.rng.as_mut());
            self.last_battery_level = reading.battery_level;
            self.push_chart_point(at, reading.generation, reading.consumption, sinks);
        }
        tracing::debug!(points, battery = self.last_battery_level, "chart backfilled");
    }

    /// One data tick: generate, publish, evaluate thresholds, maybe inject.
    pub fn tick(&mut self, now: DateTime<Utc>, sinks: &mut SinkSet) -> TickOutcome {
        self.ticks += 1;

        let reading = self
            .generator
            .generate(now, self.last_battery_level, self.rng.as_mut());
        self.last_battery_level = reading.battery_level;

        self.push_chart_point(now, reading.generation, reading.consumption, sinks);
        sinks.reading(&ReadingUpdate::from(&reading));

        let drafts = self.evaluator.evaluate(&reading.converter);
        let raised = self.admit_all(drafts, now);
        let trimmed = if raised.is_empty() {
            0
        } else {
            self.alerts.truncate_oldest(self.retention_limit)
        };

        let injected = self
            .injector
            .maybe_inject(&self.alerts, now, self.rng.as_mut())
            .map(|alert| {
                tracing::info!(id = alert.id, kind = %alert.kind, title = %alert.title, "alert injected");
                let id = alert.id;
                self.alerts.insert_front(alert);
                id
            });

        if !raised.is_empty() || injected.is_some() {
            self.publish_alerts(now, sinks);
        }

        tracing::debug!(
            tick = self.ticks,
            generation = reading.generation,
            consumption = reading.consumption,
            battery = reading.battery_level,
            efficiency = reading.converter.efficiency,
            raised = raised.len(),
            "tick complete"
        );

        TickOutcome {
            reading,
            raised,
            injected,
            trimmed,
        }
    }

    /// Merge an external payload into the same pipeline. Absent fields are
    /// skipped, never replaced by synthetic values.
    pub fn ingest(&mut self, payload: ExternalPayload, now: DateTime<Utc>, sinks: &mut SinkSet) -> Vec<AlertId> {
        let payload = payload.sanitized();

        let battery_level = payload.battery_level.map(|level| {
            level
                .clamp(self.battery_min as f64, self.battery_max as f64)
                .round() as i64
        });
        if let Some(level) = battery_level {
            self.last_battery_level = level;
        }

        if let (Some(generation), Some(consumption)) = (payload.generation, payload.consumption) {
            self.push_chart_point(now, generation.max(0.0), consumption.max(0.0), sinks);
        }

        sinks.reading(&payload.to_update(now, battery_level));

        let drafts = payload
            .converter
            .as_ref()
            .map(|converter| self.evaluator.evaluate_update(converter))
            .unwrap_or_default();
        let raised = self.admit_all(drafts, now);
        if !raised.is_empty() {
            self.alerts.truncate_oldest(self.retention_limit);
            self.publish_alerts(now, sinks);
        }

        tracing::debug!(raised = raised.len(), "external reading ingested");
        raised
    }

    /// Dismiss by id; unknown ids leave the store and the views untouched.
    pub fn dismiss(&mut self, id: AlertId, now: DateTime<Utc>, sinks: &mut SinkSet) -> bool {
        match self.alerts.remove_by_id(id) {
            Some(alert) => {
                tracing::info!(id, title = %alert.title, "alert dismissed");
                self.publish_alerts(now, sinks);
                true
            }
            None => {
                tracing::debug!(id, "dismiss ignored; no such alert");
                false
            }
        }
    }

    pub fn clear_alerts(&mut self, now: DateTime<Utc>, sinks: &mut SinkSet) {
        let cleared = self.alerts.len();
        self.alerts.clear();
        tracing::info!(cleared, "alerts cleared");
        self.publish_alerts(now, sinks);
    }

    pub fn publish_alerts(&self, now: DateTime<Utc>, sinks: &mut SinkSet) {
        sinks.alerts_changed(&self.alerts.to_ordered_list(), now);
    }

    fn admit_all(&mut self, drafts: Vec<AlertDraft>, now: DateTime<Utc>) -> Vec<AlertId> {
        drafts
            .into_iter()
            .map(|draft| {
                tracing::warn!(kind = %draft.kind, severity = %draft.severity, "{}: {}", draft.title, draft.description);
                self.alerts.admit(draft, now, self.rng.as_mut())
            })
            .collect()
    }

    fn push_chart_point(&mut self, at: DateTime<Utc>, generation: f64, consumption: f64, sinks: &mut SinkSet) {
        let label = self.label(at);
        sinks.chart_point(&label, generation, consumption);
        self.chart.push(label, generation, consumption);
    }
}
