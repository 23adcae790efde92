//! Per-cycle and aggregate results with pass/fail evaluation.

use crate::measurements::TestMeasurements;
use crate::test_config::{PassCriteria, TestConfiguration};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of a single test cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleResult {
    /// 1-based cycle number.
    pub cycle_number: u32,
    /// Overall verdict for this cycle.
    pub is_passed: bool,
    /// Measurements collected during the cycle (post-aggregation; partial on
    /// failure).
    pub measurements: TestMeasurements,
    /// Wall-clock execution time [s].
    pub execution_duration: f64,
    /// When the cycle finished.
    pub completed_at: DateTime<Utc>,
    /// Free-form operator/orchestrator notes.
    #[serde(default)]
    pub notes: String,
    /// Structured failure description; set iff `is_passed` is false and a
    /// failure terminated the cycle.
    #[serde(default)]
    pub error_message: Option<String>,
}

impl CycleResult {
    /// Build a result for a cycle that ran to completion.
    ///
    /// The verdict comes from [`evaluate_pass`] against the configured
    /// matrix and criteria.
    pub fn completed(
        cycle_number: u32,
        measurements: TestMeasurements,
        config: &TestConfiguration,
        execution_duration: f64,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let is_passed = evaluate_pass(&measurements, config);
        Self {
            cycle_number,
            is_passed,
            measurements,
            execution_duration,
            completed_at,
            notes: String::new(),
            error_message: None,
        }
    }

    /// Build a result for a cycle terminated by a failure or cancellation.
    ///
    /// Partial measurements are preserved.
    pub fn failed(
        cycle_number: u32,
        measurements: TestMeasurements,
        error_message: impl Into<String>,
        execution_duration: f64,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            cycle_number,
            is_passed: false,
            measurements,
            execution_duration,
            completed_at,
            notes: String::new(),
            error_message: Some(error_message.into()),
        }
    }
}

/// Evaluate the pass criteria against a completed measurement matrix.
///
/// A cycle passes iff every configured `(temperature, position)` slot is
/// present, and every stored force is finite and inside
/// `[force_limit_min, force_limit_max]`.
pub fn evaluate_pass(measurements: &TestMeasurements, config: &TestConfiguration) -> bool {
    if measurements.slot_count() != config.matrix_size() {
        return false;
    }

    for &temperature in &config.temperature_list {
        for &position in &config.stroke_positions {
            match measurements.force_at(temperature, position) {
                Some(force) if config.pass_criteria.force_in_range(force) => {}
                _ => return false,
            }
        }
    }

    true
}

/// Aggregate result over a multi-cycle run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    /// Per-cycle results, in execution order.
    pub cycles: Vec<CycleResult>,
}

impl TestReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finished cycle.
    pub fn push(&mut self, result: CycleResult) {
        self.cycles.push(result);
    }

    /// True when every cycle passed (vacuously false for an empty report).
    pub fn all_passed(&self) -> bool {
        !self.cycles.is_empty() && self.cycles.iter().all(|c| c.is_passed)
    }

    /// Number of cycles executed.
    pub fn cycle_count(&self) -> usize {
        self.cycles.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_3x1() -> TestConfiguration {
        TestConfiguration {
            temperature_list: vec![38.0, 52.0, 66.0],
            stroke_positions: vec![170_000.0],
            pass_criteria: PassCriteria {
                force_limit_min: 0.0,
                force_limit_max: 100.0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn full_matrix(forces: [f64; 3]) -> TestMeasurements {
        let mut m = TestMeasurements::new();
        for (temp, force) in [38.0, 52.0, 66.0].into_iter().zip(forces) {
            m.record(temp, 170_000.0, force);
        }
        m
    }

    #[test]
    fn full_in_range_matrix_passes() {
        let config = config_3x1();
        assert!(evaluate_pass(&full_matrix([10.0, 20.0, 30.0]), &config));
    }

    #[test]
    fn missing_slot_fails() {
        let config = config_3x1();
        let mut m = TestMeasurements::new();
        m.record(38.0, 170_000.0, 10.0);
        m.record(52.0, 170_000.0, 20.0);
        assert!(!evaluate_pass(&m, &config));
    }

    #[test]
    fn out_of_range_force_fails() {
        let config = config_3x1();
        assert!(!evaluate_pass(&full_matrix([10.0, 150.0, 30.0]), &config));
        assert!(!evaluate_pass(&full_matrix([-0.5, 20.0, 30.0]), &config));
    }

    #[test]
    fn non_finite_force_fails() {
        let config = config_3x1();
        assert!(!evaluate_pass(&full_matrix([10.0, f64::NAN, 30.0]), &config));
    }

    #[test]
    fn boundary_forces_pass() {
        let config = config_3x1();
        assert!(evaluate_pass(&full_matrix([0.0, 100.0, 50.0]), &config));
    }

    #[test]
    fn completed_result_carries_verdict() {
        let config = config_3x1();
        let result = CycleResult::completed(
            1,
            full_matrix([10.0, 20.0, 30.0]),
            &config,
            12.5,
            Utc::now(),
        );
        assert!(result.is_passed);
        assert!(result.error_message.is_none());
        assert_eq!(result.cycle_number, 1);
    }

    #[test]
    fn failed_result_preserves_partial_measurements() {
        let mut partial = TestMeasurements::new();
        partial.record(38.0, 170_000.0, 10.0);

        let result = CycleResult::failed(2, partial, "mcu verify failed", 3.0, Utc::now());
        assert!(!result.is_passed);
        assert_eq!(result.measurements.slot_count(), 1);
        assert!(result.error_message.as_deref().unwrap().contains("mcu"));
    }

    #[test]
    fn report_all_passed() {
        let config = config_3x1();
        let mut report = TestReport::new();
        assert!(!report.all_passed());

        report.push(CycleResult::completed(
            1,
            full_matrix([1.0, 2.0, 3.0]),
            &config,
            1.0,
            Utc::now(),
        ));
        assert!(report.all_passed());

        report.push(CycleResult::failed(
            2,
            TestMeasurements::new(),
            "boom",
            1.0,
            Utc::now(),
        ));
        assert!(!report.all_passed());
        assert_eq!(report.cycle_count(), 2);
    }
}
