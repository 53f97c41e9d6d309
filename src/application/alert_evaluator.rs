// Converter alert evaluator - Turns threshold violations into alert drafts
use crate::domain::alert::{AlertDraft, AlertKind, Severity};
use crate::domain::telemetry::{ConverterReading, ConverterUpdate};
use crate::infrastructure::config::AlertConfig;

pub const EFFICIENCY_DROP_TITLE: &str = "Critical Efficiency Drop";
pub const VOLTAGE_RANGE_TITLE: &str = "Output Voltage Out of Range";
pub const DUTY_CYCLE_TITLE: &str = "Critical Duty Cycle";

#[derive(Debug, Clone, PartialEq)]
pub struct ConverterThresholds {
    pub efficiency_critical: f64,
    pub duty_cycle_critical: f64,
    pub nominal_output_voltage: f64,
    pub voltage_tolerance: f64,
}

impl ConverterThresholds {
    pub fn from_config(config: &AlertConfig) -> Self {
        Self {
            efficiency_critical: config.efficiency_critical,
            duty_cycle_critical: config.duty_cycle_critical,
            nominal_output_voltage: config.nominal_output_voltage,
            voltage_tolerance: config.voltage_tolerance,
        }
    }

    /// Largest allowed absolute deviation from nominal, in volts.
    pub fn voltage_band(&self) -> f64 {
        self.nominal_output_voltage * self.voltage_tolerance
    }
}

impl Default for ConverterThresholds {
    fn default() -> Self {
        Self::from_config(&AlertConfig::default())
    }
}

/// Pure and deterministic: the same reading always yields the same drafts,
/// in the order efficiency, voltage, duty cycle.
#[derive(Debug, Clone, Default)]
pub struct ConverterAlertEvaluator {
    thresholds: ConverterThresholds,
}

impl ConverterAlertEvaluator {
    pub fn new(thresholds: ConverterThresholds) -> Self {
        Self { thresholds }
    }

    pub fn evaluate(&self, reading: &ConverterReading) -> Vec<AlertDraft> {
        self.evaluate_fields(
            Some(reading.efficiency),
            Some(reading.output_voltage),
            Some(reading.duty_cycle),
        )
    }

    /// Partial variant for external payloads: a rule only runs when its field is present.
    pub fn evaluate_update(&self, update: &ConverterUpdate) -> Vec<AlertDraft> {
        self.evaluate_fields(update.efficiency, update.output_voltage, update.duty_cycle)
    }

    fn evaluate_fields(
        &self,
        efficiency: Option<f64>,
        output_voltage: Option<f64>,
        duty_cycle: Option<f64>,
    ) -> Vec<AlertDraft> {
        let t = &self.thresholds;
        let mut drafts = Vec::new();

        if let Some(efficiency) = efficiency.filter(|e| *e < t.efficiency_critical) {
            drafts.push(AlertDraft::new(
                AlertKind::Error,
                Severity::High,
                EFFICIENCY_DROP_TITLE,
                format!(
                    "Converter efficiency dropped to {:.1}% (critical below {:.0}%)",
                    efficiency, t.efficiency_critical
                ),
            ));
        }

        if let Some(voltage) = output_voltage
            .filter(|v| (v - t.nominal_output_voltage).abs() > t.voltage_band())
        {
            drafts.push(AlertDraft::new(
                AlertKind::Warning,
                Severity::Medium,
                VOLTAGE_RANGE_TITLE,
                format!(
                    "Output voltage {:.1}V is outside {:.1}V ±{:.0}%",
                    voltage,
                    t.nominal_output_voltage,
                    t.voltage_tolerance * 100.0
                ),
            ));
        }

        if let Some(duty) = duty_cycle.filter(|d| *d > t.duty_cycle_critical) {
            drafts.push(AlertDraft::new(
                AlertKind::Error,
                Severity::High,
                DUTY_CYCLE_TITLE,
                format!(
                    "Duty cycle at {:.1}% exceeds the {:.0}% limit",
                    duty, t.duty_cycle_critical
                ),
            ));
        }

        drafts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn converter(efficiency: f64, output_voltage: f64, duty_cycle: f64) -> ConverterReading {
        ConverterReading {
            input_voltage: 14.0,
            output_voltage,
            input_current: 6.0,
            output_current: 3.2,
            output_power: output_voltage * 3.2,
            duty_cycle,
            efficiency,
        }
    }

    fn titles(drafts: &[AlertDraft]) -> Vec<&str> {
        drafts.iter().map(|d| d.title.as_str()).collect()
    }

    #[test]
    fn test_nominal_reading_is_quiet() {
        let evaluator = ConverterAlertEvaluator::default();
        assert!(evaluator.evaluate(&converter(95.0, 24.0, 50.0)).is_empty());
        assert!(evaluator.evaluate(&converter(95.0, 24.4, 90.0)).is_empty());
    }

    #[test]
    fn test_efficiency_drop() {
        let drafts = ConverterAlertEvaluator::default().evaluate(&converter(80.0, 24.0, 50.0));

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].title, EFFICIENCY_DROP_TITLE);
        assert_eq!(drafts[0].kind, AlertKind::Error);
        assert_eq!(drafts[0].severity, Severity::High);
        assert!(drafts[0].description.contains("80.0%"));
    }

    #[test]
    fn test_voltage_out_of_range() {
        let drafts = ConverterAlertEvaluator::default().evaluate(&converter(95.0, 26.0, 50.0));

        assert_eq!(titles(&drafts), vec![VOLTAGE_RANGE_TITLE]);
        assert_eq!(drafts[0].kind, AlertKind::Warning);
        assert_eq!(drafts[0].severity, Severity::Medium);
        assert!(drafts[0].description.contains("26.0V"));

        let low = ConverterAlertEvaluator::default().evaluate(&converter(95.0, 23.4, 50.0));
        assert_eq!(titles(&low), vec![VOLTAGE_RANGE_TITLE]);
    }

    #[test]
    fn test_duty_cycle_critical() {
        let drafts = ConverterAlertEvaluator::default().evaluate(&converter(95.0, 24.0, 95.0));

        assert_eq!(titles(&drafts), vec![DUTY_CYCLE_TITLE]);
        assert_eq!(drafts[0].kind, AlertKind::Error);
        assert_eq!(drafts[0].severity, Severity::High);
        assert!(drafts[0].description.contains("95.0%"));
    }

    #[test]
    fn test_all_rules_fire_in_fixed_order() {
        let drafts = ConverterAlertEvaluator::default().evaluate(&converter(80.0, 30.0, 95.0));
        assert_eq!(
            titles(&drafts),
            vec![EFFICIENCY_DROP_TITLE, VOLTAGE_RANGE_TITLE, DUTY_CYCLE_TITLE]
        );
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let evaluator = ConverterAlertEvaluator::default();
        let reading = converter(82.0, 25.1, 93.0);
        let first = evaluator.evaluate(&reading);
        for _ in 0..10 {
            assert_eq!(evaluator.evaluate(&reading), first);
        }
    }

    #[test]
    fn test_partial_update_skips_missing_fields() {
        let evaluator = ConverterAlertEvaluator::default();

        let update = ConverterUpdate {
            duty_cycle: Some(97.0),
            ..ConverterUpdate::default()
        };
        assert_eq!(titles(&evaluator.evaluate_update(&update)), vec![DUTY_CYCLE_TITLE]);

        assert!(evaluator.evaluate_update(&ConverterUpdate::default()).is_empty());
    }

    #[test]
    fn test_custom_thresholds() {
        let evaluator = ConverterAlertEvaluator::new(ConverterThresholds {
            efficiency_critical: 90.0,
            duty_cycle_critical: 60.0,
            nominal_output_voltage: 48.0,
            voltage_tolerance: 0.05,
        });

        assert!(evaluator.evaluate(&converter(91.0, 49.0, 55.0)).is_empty());
        assert_eq!(
            titles(&evaluator.evaluate(&converter(89.0, 51.0, 61.0))),
            vec![EFFICIENCY_DROP_TITLE, VOLTAGE_RANGE_TITLE, DUTY_CYCLE_TITLE]
        );
    }
}
