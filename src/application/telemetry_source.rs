// Telemetry source trait for external (non-synthetic) readings
use crate::application::scheduler::SchedulerCommand;
use crate::domain::telemetry::{ConverterUpdate, ReadingUpdate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::mpsc;

/// A partially populated reading from an external source. Every field is optional;
/// absent fields leave the matching metric untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExternalPayload {
    pub generation: Option<f64>,
    pub consumption: Option<f64>,
    pub battery_level: Option<f64>,
    #[serde(alias = "systemEfficiency")]
    pub efficiency: Option<f64>,
    pub converter: Option<ConverterUpdate>,
}

impl ExternalPayload {
    /// Drop non-finite values so they read as absent.
    pub fn sanitized(self) -> Self {
        let finite = |v: Option<f64>| v.filter(|x| x.is_finite());
        Self {
            generation: finite(self.generation),
            consumption: finite(self.consumption),
            battery_level: finite(self.battery_level),
            efficiency: finite(self.efficiency),
            converter: self.converter.map(|c| ConverterUpdate {
                input_voltage: finite(c.input_voltage),
                output_voltage: finite(c.output_voltage),
                input_current: finite(c.input_current),
                output_current: finite(c.output_current),
                output_power: finite(c.output_power),
                duty_cycle: finite(c.duty_cycle),
                efficiency: finite(c.efficiency),
            }),
        }
    }

    /// Map onto a view update. Battery clamping is the caller's job since it
    /// owns the configured bounds.
    pub fn to_update(&self, now: DateTime<Utc>, battery_level: Option<i64>) -> ReadingUpdate {
        ReadingUpdate {
            timestamp: Some(now),
            generation: self.generation,
            consumption: self.consumption,
            battery_level,
            system_efficiency: self.efficiency.map(|e| e.round() as i64),
            converter: self.converter.clone().filter(|c| !c.is_empty()),
        }
    }
}

#[async_trait]
pub trait TelemetrySource: Send {
    /// Next payload, or `None` once the source is exhausted.
    async fn next_payload(&mut self) -> anyhow::Result<Option<ExternalPayload>>;
}

/// Placeholder until a real telemetry feed is integrated; yields nothing.
#[derive(Debug, Default)]
pub struct StubTelemetrySource;

#[async_trait]
impl TelemetrySource for StubTelemetrySource {
    async fn next_payload(&mut self) -> anyhow::Result<Option<ExternalPayload>> {
        Ok(None)
    }
}

/// Forward payloads into the scheduler's ingest channel until the source is
/// exhausted, fails, or the scheduler goes away.
pub async fn forward_payloads(mut source: Box<dyn TelemetrySource>, tx: mpsc::Sender<SchedulerCommand>) {
    loop {
        match source.next_payload().await {
            Ok(Some(payload)) => {
                if tx.send(SchedulerCommand::Ingest(payload)).await.is_err() {
                    tracing::debug!("ingest channel closed; telemetry source stopping");
                    break;
                }
            }
            Ok(None) => {
                tracing::debug!("telemetry source exhausted");
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, "telemetry source failed");
                break;
            }
        }
    }
}
