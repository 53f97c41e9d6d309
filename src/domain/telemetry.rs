// Telemetry data domain models
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::VecDeque;

/// Round to one decimal place, the precision every converter field is published at.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Electrical state of the DC-DC boost converter for one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ConverterReading {
    pub input_voltage: f64,
    pub output_voltage: f64,
    pub input_current: f64,
    pub output_current: f64,
    pub output_power: f64,
    pub duty_cycle: f64,
    pub efficiency: f64,
}

/// One synthesized snapshot of every monitored quantity.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub generation: f64,
    pub consumption: f64,
    pub battery_level: i64,
    pub timestamp: DateTime<Utc>,
    pub system_efficiency: i64,
    pub converter: ConverterReading,
}

/// Converter fields of an update; `None` means "leave that gauge alone".
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConverterUpdate {
    pub input_voltage: Option<f64>,
    pub output_voltage: Option<f64>,
    pub input_current: Option<f64>,
    pub output_current: Option<f64>,
    pub output_power: Option<f64>,
    pub duty_cycle: Option<f64>,
    pub efficiency: Option<f64>,
}

impl ConverterUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl From<&ConverterReading> for ConverterUpdate {
    fn from(reading: &ConverterReading) -> Self {
        Self {
            input_voltage: Some(reading.input_voltage),
            output_voltage: Some(reading.output_voltage),
            input_current: Some(reading.input_current),
            output_current: Some(reading.output_current),
            output_power: Some(reading.output_power),
            duty_cycle: Some(reading.duty_cycle),
            efficiency: Some(reading.efficiency),
        }
    }
}

/// What the metric views receive. Synthetic readings populate every field,
/// external payloads only the ones they carried.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingUpdate {
    pub timestamp: Option<DateTime<Utc>>,
    pub generation: Option<f64>,
    pub consumption: Option<f64>,
    pub battery_level: Option<i64>,
    pub system_efficiency: Option<i64>,
    pub converter: Option<ConverterUpdate>,
}

impl From<&Reading> for ReadingUpdate {
    fn from(reading: &Reading) -> Self {
        Self {
            timestamp: Some(reading.timestamp),
            generation: Some(reading.generation),
            consumption: Some(reading.consumption),
            battery_level: Some(reading.battery_level),
            system_efficiency: Some(reading.system_efficiency),
            converter: Some(ConverterUpdate::from(&reading.converter)),
        }
    }
}

/// Rolling generation/consumption history backing the time-series chart.
#[derive(Debug, Clone)]
pub struct ChartData {
    max_points: usize,
    labels: VecDeque<String>,
    generation: VecDeque<f64>,
    consumption: VecDeque<f64>,
}

impl ChartData {
    pub fn new(max_points: usize) -> Self {
        Self {
            max_points,
            labels: VecDeque::with_capacity(max_points + 1),
            generation: VecDeque::with_capacity(max_points + 1),
            consumption: VecDeque::with_capacity(max_points + 1),
        }
    }

    /// Append a point, evicting the oldest ones once the cap is exceeded.
    pub fn push(&mut self, label: String, generation: f64, consumption: f64) {
        self.labels.push_back(label);
        self.generation.push_back(generation);
        self.consumption.push_back(consumption);

        while self.labels.len() > self.max_points {
            self.labels.pop_front();
            self.generation.pop_front();
            self.consumption.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn max_points(&self) -> usize {
        self.max_points
    }

    pub fn labels(&self) -> &VecDeque<String> {
        &self.labels
    }

    pub fn generation(&self) -> &VecDeque<f64> {
        &self.generation
    }

    pub fn consumption(&self) -> &VecDeque<f64> {
        &self.consumption
    }
}
