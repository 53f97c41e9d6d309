// Signal generator - Synthesizes one plausible microgrid reading per tick
use crate::application::random::RandomSource;
use crate::domain::telemetry::{round1, ConverterReading, Reading};
use crate::infrastructure::config::{ConverterConfig, DashboardConfig, Range};
use chrono::{DateTime, FixedOffset, Timelike, Utc};
use std::f64::consts::PI;

const DAYLIGHT_HOURS: std::ops::RangeInclusive<u32> = 6..=18;
const ACTIVE_HOURS: std::ops::RangeInclusive<u32> = 7..=22;
const ACTIVE_LOAD_SHARE: f64 = 0.7;
const BATTERY_GAIN: f64 = 2.0;
const PEAK_LOAD_FACTOR: f64 = 0.7;

/// Stateless apart from configuration; all randomness comes from the caller's source.
#[derive(Debug, Clone)]
pub struct SignalGenerator {
    generation: Range,
    consumption: Range,
    battery_min: i64,
    battery_max: i64,
    converter: ConverterConfig,
    site_offset: FixedOffset,
}

impl SignalGenerator {
    pub fn new(config: &DashboardConfig) -> Self {
        Self {
            generation: config.generation,
            consumption: config.consumption,
            battery_min: config.battery.min,
            battery_max: config.battery.max,
            converter: config.converter.clone(),
            site_offset: config.site.offset(),
        }
    }

    pub fn site_offset(&self) -> FixedOffset {
        self.site_offset
    }

    /// Hour of day at the site.
    pub fn local_hour(&self, now: DateTime<Utc>) -> u32 {
        now.with_timezone(&self.site_offset).hour()
    }

    /// Solar-shaped generation baseline before noise.
    pub fn base_generation(&self, hour: u32) -> f64 {
        if DAYLIGHT_HOURS.contains(&hour) {
            let angle = (hour as f64 - 6.0) * PI / 12.0;
            self.generation.min + self.generation.span() * angle.sin()
        } else {
            self.generation.min
        }
    }

    pub fn base_consumption(&self, hour: u32) -> f64 {
        if ACTIVE_HOURS.contains(&hour) {
            self.consumption.min + ACTIVE_LOAD_SHARE * self.consumption.span()
        } else {
            self.consumption.min
        }
    }

    /// Simplified charge/discharge integrator; not normalized by capacity.
    pub fn next_battery_level(&self, prior: i64, generation: f64, consumption: f64) -> i64 {
        let level = prior as f64 + BATTERY_GAIN * (generation - consumption);
        level
            .clamp(self.battery_min as f64, self.battery_max as f64)
            .round() as i64
    }

    pub fn generate(&self, now: DateTime<Utc>, prior_battery_level: i64, rng: &mut dyn RandomSource) -> Reading {
        let hour = self.local_hour(now);

        let generation = (self.base_generation(hour) + rng.noise()).max(0.0);
        let consumption = (self.base_consumption(hour) + rng.noise()).max(0.0);
        let battery_level = self.next_battery_level(prior_battery_level, generation, consumption);
        let system_efficiency = (92.0 + rng.next_f64() * 6.0).round() as i64;
        let converter = self.converter_reading(consumption, rng);

        Reading {
            generation,
            consumption,
            battery_level,
            timestamp: now,
            system_efficiency,
            converter,
        }
    }

    // Order matters: every value feeds the ones after it.
    fn converter_reading(&self, consumption: f64, rng: &mut dyn RandomSource) -> ConverterReading {
        let cfg = &self.converter;

        let input_voltage = cfg.input_voltage.min + cfg.input_voltage.span() * (0.8 + rng.next_f64() * 0.4);
        let output_voltage = cfg.output_voltage.min + cfg.output_voltage.span() * (0.7 + rng.next_f64() * 0.3);
        let input_current = cfg.input_current.min + cfg.input_current.span() * (consumption / self.consumption.max);
        let output_current = input_current * (input_voltage / output_voltage) * cfg.conversion_factor;

        let duty_cycle = cfg.duty_cycle.clamp((1.0 - input_voltage / output_voltage) * 100.0);

        let load_factor = output_current / cfg.output_current_max;
        let load_efficiency = 1.0 - (load_factor - PEAK_LOAD_FACTOR).abs() * 0.1;
        let efficiency = cfg
            .efficiency
            .clamp(cfg.efficiency.max * load_efficiency + rng.noise());

        let output_voltage = round1(output_voltage);
        let output_current = round1(output_current);

        ConverterReading {
            input_voltage: round1(input_voltage),
            output_voltage,
            input_current: round1(input_current),
            output_current,
            // Taken from the published values so the product holds for consumers.
            output_power: round1(output_voltage * output_current),
            duty_cycle: round1(duty_cycle),
            efficiency: round1(efficiency),
        }
    }
}
