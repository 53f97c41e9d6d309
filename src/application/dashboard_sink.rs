// View sink trait - Outbound notifications to the rendering layer
use crate::domain::alert::Alert;
use crate::domain::telemetry::ReadingUpdate;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("view target {0} is not available")]
    Unavailable(String),
    #[error("view rejected update: {0}")]
    Rejected(String),
}

/// Fire-and-forget callbacks invoked synchronously by the monitoring service.
/// `on_alerts_changed` fires once per operation that changed the alert list
/// (a tick, an ingest, a dismiss, a clear) with the full list, so a tick that
/// both raises and injects alerts reports them together.
/// Errors are reported back but never stop the pipeline.
pub trait DashboardSink: Send {
    fn name(&self) -> &str;

    fn on_reading(&mut self, update: &ReadingUpdate) -> Result<(), SinkError>;

    fn on_alerts_changed(&mut self, alerts: &[Alert], now: DateTime<Utc>) -> Result<(), SinkError>;

    fn on_chart_point(&mut self, label: &str, generation: f64, consumption: f64) -> Result<(), SinkError>;

    /// "Last updated" refresh, driven by the clock timer only.
    fn on_clock_tick(&mut self, _now: DateTime<Utc>) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Fans every notification out to each sink, logging and skipping failures.
#[derive(Default)]
pub struct SinkSet {
    sinks: Vec<Box<dyn DashboardSink>>,
}

impl SinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl DashboardSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn reading(&mut self, update: &ReadingUpdate) {
        self.each("reading", |sink| sink.on_reading(update));
    }

    pub fn alerts_changed(&mut self, alerts: &[Alert], now: DateTime<Utc>) {
        self.each("alerts", |sink| sink.on_alerts_changed(alerts, now));
    }

    pub fn chart_point(&mut self, label: &str, generation: f64, consumption: f64) {
        self.each("chart", |sink| sink.on_chart_point(label, generation, consumption));
    }

    pub fn clock_tick(&mut self, now: DateTime<Utc>) {
        self.each("clock", |sink| sink.on_clock_tick(now));
    }

    fn each<F>(&mut self, event: &str, mut notify: F)
    where
        F: FnMut(&mut dyn DashboardSink) -> Result<(), SinkError>,
    {
        for sink in self.sinks.iter_mut() {
            if let Err(e) = notify(sink.as_mut()) {
                tracing::warn!(sink = sink.name(), event, error = %e, "view update skipped");
            }
        }
    }
}
