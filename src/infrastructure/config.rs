use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name}: min ({min}) must not exceed max ({max})")]
    InvalidRange { name: &'static str, min: f64, max: f64 },
    #[error("{name} must be a probability in [0, 1], got {value}")]
    InvalidProbability { name: &'static str, value: f64 },
    #[error("{name} must be greater than zero")]
    NotPositive { name: &'static str },
    #[error("site.utc_offset_minutes ({0}) must be within ±24h")]
    InvalidUtcOffset(i32),
    #[error("battery.initial ({initial}) is outside [{min}, {max}]")]
    InitialBatteryOutOfRange { initial: i64, min: i64, max: i64 },
}

/// Closed numeric interval used for every configurable signal bound.
/// `min <= max` is checked by `DashboardConfig::validate`; an inverted range
/// never panics but collapses every value onto `max`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        if self.min > self.max || self.min.is_nan() || self.max.is_nan() {
            return Err(ConfigError::InvalidRange {
                name,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DashboardConfig {
    pub site: SiteConfig,
    pub generation: Range,
    pub consumption: Range,
    pub battery: BatteryConfig,
    pub converter: ConverterConfig,
    pub alerts: AlertConfig,
    pub scheduler: SchedulerConfig,
    pub ingest: IngestConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct SiteConfig {
    /// Offset of the site's local clock from UTC; drives the diurnal shape.
    pub utc_offset_minutes: i32,
}

impl SiteConfig {
    /// The site's offset, or UTC when the configured value is out of range.
    pub fn offset(&self) -> FixedOffset {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BatteryConfig {
    pub min: i64,
    pub max: i64,
    pub initial: i64,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            min: 10,
            max: 100,
            initial: 75,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ConverterConfig {
    pub input_voltage: Range,
    pub output_voltage: Range,
    pub input_current: Range,
    pub output_current_max: f64,
    pub duty_cycle: Range,
    pub efficiency: Range,
    /// Fraction of input power that reaches the output.
    pub conversion_factor: f64,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            input_voltage: Range::new(12.0, 16.0),
            output_voltage: Range::new(23.5, 24.5),
            input_current: Range::new(2.0, 10.0),
            output_current_max: 8.0,
            duty_cycle: Range::new(5.0, 95.0),
            efficiency: Range::new(75.0, 98.0),
            conversion_factor: 0.92,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AlertProfile {
    /// Grid-only catalog, 10% injection chance.
    Baseline,
    /// Grid and converter catalog, 8% injection chance.
    #[default]
    Converter,
}

impl AlertProfile {
    pub fn default_probability(&self) -> f64 {
        match self {
            AlertProfile::Baseline => 0.10,
            AlertProfile::Converter => 0.08,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AlertConfig {
    pub profile: AlertProfile,
    /// Overrides the profile's injection probability when set.
    pub injection_probability: Option<f64>,
    /// Random injection is refused once this many alerts are pending.
    pub pending_cap: usize,
    /// Oldest alerts beyond this are trimmed after threshold alerts are added.
    pub retention_limit: usize,
    pub efficiency_critical: f64,
    pub duty_cycle_critical: f64,
    pub nominal_output_voltage: f64,
    /// Allowed relative deviation from the nominal output voltage.
    pub voltage_tolerance: f64,
    pub seed_demo_alerts: bool,
}

impl AlertConfig {
    pub fn injection_probability(&self) -> f64 {
        self.injection_probability
            .unwrap_or_else(|| self.profile.default_probability())
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            profile: AlertProfile::default(),
            injection_probability: None,
            pending_cap: 5,
            retention_limit: 50,
            efficiency_critical: 85.0,
            duty_cycle_critical: 90.0,
            nominal_output_voltage: 24.0,
            voltage_tolerance: 0.02,
            seed_demo_alerts: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    pub tick_period_ms: u64,
    pub clock_period_ms: u64,
    pub max_chart_points: usize,
    /// Fixed RNG seed; entropy is used when absent.
    pub seed: Option<u64>,
    /// Prime the chart with history before the first tick.
    pub backfill: bool,
}

impl SchedulerConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    pub fn clock_period(&self) -> Duration {
        Duration::from_millis(self.clock_period_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 5000,
            clock_period_ms: 1000,
            max_chart_points: 20,
            seed: None,
            backfill: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    /// Read JSON-lines readings from stdin.
    pub stdin: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            site: SiteConfig::default(),
            generation: Range::new(0.5, 12.0),
            consumption: Range::new(3.0, 9.0),
            battery: BatteryConfig::default(),
            converter: ConverterConfig::default(),
            alerts: AlertConfig::default(),
            scheduler: SchedulerConfig::default(),
            ingest: IngestConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl DashboardConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.site.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(ConfigError::InvalidUtcOffset(self.site.utc_offset_minutes));
        }
        self.generation.validate("generation")?;
        self.consumption.validate("consumption")?;

        let battery = &self.battery;
        if battery.min > battery.max {
            return Err(ConfigError::InvalidRange {
                name: "battery",
                min: battery.min as f64,
                max: battery.max as f64,
            });
        }
        if battery.initial < battery.min || battery.initial > battery.max {
            return Err(ConfigError::InitialBatteryOutOfRange {
                initial: battery.initial,
                min: battery.min,
                max: battery.max,
            });
        }

        let converter = &self.converter;
        converter.input_voltage.validate("converter.input_voltage")?;
        converter.output_voltage.validate("converter.output_voltage")?;
        converter.input_current.validate("converter.input_current")?;
        converter.duty_cycle.validate("converter.duty_cycle")?;
        converter.efficiency.validate("converter.efficiency")?;
        if converter.output_voltage.min <= 0.0 {
            return Err(ConfigError::NotPositive { name: "converter.output_voltage.min" });
        }
        if converter.output_current_max <= 0.0 {
            return Err(ConfigError::NotPositive { name: "converter.output_current_max" });
        }
        if self.consumption.max <= 0.0 {
            return Err(ConfigError::NotPositive { name: "consumption.max" });
        }

        let probability = self.alerts.injection_probability();
        if !(0.0..=1.0).contains(&probability) {
            return Err(ConfigError::InvalidProbability {
                name: "alerts.injection_probability",
                value: probability,
            });
        }

        if self.scheduler.tick_period_ms == 0 {
            return Err(ConfigError::NotPositive { name: "scheduler.tick_period_ms" });
        }
        if self.scheduler.clock_period_ms == 0 {
            return Err(ConfigError::NotPositive { name: "scheduler.clock_period_ms" });
        }
        if self.scheduler.max_chart_points == 0 {
            return Err(ConfigError::NotPositive { name: "scheduler.max_chart_points" });
        }

        Ok(())
    }
}

/// Layer the optional `config/dashboard` file and `MICROGRID_*` environment
/// variables over the compiled defaults.
pub fn load_dashboard_config() -> anyhow::Result<DashboardConfig> {
    let settings = config::Config::builder()
        .add_source(compiled_defaults()?)
        .add_source(config::File::with_name("config/dashboard").required(false))
        .add_source(environment())
        .build()?;

    from_settings(settings)
}

/// Every key with its default value, so a source may set a single bound of a
/// range and inherit the other.
fn compiled_defaults() -> Result<config::Config, config::ConfigError> {
    config::Config::try_from(&DashboardConfig::default())
}

fn environment() -> config::Environment {
    config::Environment::with_prefix("MICROGRID")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn from_settings(settings: config::Config) -> anyhow::Result<DashboardConfig> {
    let dashboard: DashboardConfig = settings.try_deserialize()?;
    dashboard.validate()?;
    Ok(dashboard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{Config, File, FileFormat, Map};

    fn parse(toml: &str) -> anyhow::Result<DashboardConfig> {
        let settings = Config::builder()
            .add_source(compiled_defaults()?)
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        from_settings(settings)
    }

    fn parse_env(vars: &[(&str, &str)]) -> anyhow::Result<DashboardConfig> {
        let vars: Map<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        let settings = Config::builder()
            .add_source(compiled_defaults()?)
            .add_source(environment().source(Some(vars)))
            .build()?;
        from_settings(settings)
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = DashboardConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.scheduler.tick_period(), Duration::from_millis(5000));
        assert_eq!(config.scheduler.clock_period(), Duration::from_secs(1));
        assert_eq!(config.alerts.pending_cap, 5);
        assert_eq!(config.alerts.injection_probability(), 0.08);
    }

    #[test]
    fn test_empty_source_yields_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config, DashboardConfig::default());
    }

    #[test]
    fn test_overrides_are_layered_on_defaults() {
        let config = parse(
            r#"
            [generation]
            min = 1.0
            max = 20.0

            [scheduler]
            tick_period_ms = 250
            max_chart_points = 5
            seed = 7

            [alerts]
            profile = "baseline"
            "#,
        )
        .unwrap();

        assert_eq!(config.generation, Range::new(1.0, 20.0));
        assert_eq!(config.consumption, DashboardConfig::default().consumption);
        assert_eq!(config.scheduler.tick_period_ms, 250);
        assert_eq!(config.scheduler.clock_period_ms, 1000);
        assert_eq!(config.scheduler.seed, Some(7));
        assert_eq!(config.alerts.profile, AlertProfile::Baseline);
        assert_eq!(config.alerts.injection_probability(), 0.10);
    }

    #[test]
    fn test_probability_override_beats_profile() {
        let config = parse(
            r#"
            [alerts]
            profile = "baseline"
            injection_probability = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(config.alerts.injection_probability(), 0.5);
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let mut config = DashboardConfig::default();
        config.converter.duty_cycle = Range::new(90.0, 10.0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRange { name: "converter.duty_cycle", .. })
        ));
    }

    #[test]
    fn test_invalid_probability_is_rejected() {
        let err = parse(
            r#"
            [alerts]
            injection_probability = 1.5
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("probability"));
    }

    #[test]
    fn test_zero_tick_period_is_rejected() {
        let mut config = DashboardConfig::default();
        config.scheduler.tick_period_ms = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::NotPositive { name: "scheduler.tick_period_ms" })
        );
    }

    #[test]
    fn test_site_offset() {
        let mut config = DashboardConfig::default();
        assert_eq!(config.site.offset().local_minus_utc(), 0);

        config.site.utc_offset_minutes = -300;
        assert_eq!(config.site.offset().local_minus_utc(), -300 * 60);
        assert_eq!(config.validate(), Ok(()));

        config.site.utc_offset_minutes = 24 * 60;
        assert_eq!(config.validate(), Err(ConfigError::InvalidUtcOffset(24 * 60)));
        assert_eq!(config.site.offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_initial_battery_must_be_in_range() {
        let mut config = DashboardConfig::default();
        config.battery.initial = 150;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InitialBatteryOutOfRange { initial: 150, .. })
        ));
    }

    #[test]
    fn test_single_bound_file_override_keeps_the_other() {
        let config = parse(
            r#"
            [generation]
            min = 1.0
            "#,
        )
        .unwrap();
        assert_eq!(config.generation, Range::new(1.0, 12.0));
    }

    #[test]
    fn test_single_bound_env_override_keeps_the_other() {
        let config = parse_env(&[
            ("MICROGRID_CONVERTER__OUTPUT_VOLTAGE__MAX", "25.0"),
            ("MICROGRID_SCHEDULER__SEED", "9"),
        ])
        .unwrap();
        assert_eq!(config.converter.output_voltage, Range::new(23.5, 25.0));
        assert_eq!(config.converter.input_voltage, ConverterConfig::default().input_voltage);
        assert_eq!(config.scheduler.seed, Some(9));
        assert_eq!(config.alerts.injection_probability, None);
    }

    #[test]
    fn test_inverted_range_clamp_does_not_panic() {
        let inverted = Range::new(90.0, 10.0);
        assert_eq!(inverted.clamp(50.0), 10.0);
        assert_eq!(Range::new(5.0, 95.0).clamp(120.0), 95.0);
        assert_eq!(Range::new(5.0, 95.0).clamp(-3.0), 5.0);
    }
}
