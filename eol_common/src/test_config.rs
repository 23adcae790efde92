//! Test-cycle parameters and pass criteria.
//!
//! [`TestConfiguration`] is an immutable snapshot captured at cycle start:
//! electrical and thermal setpoints, the temperature × stroke-position
//! matrix, stabilization delays, and execution parameters.

use crate::config::{ConfigError, require_finite, require_non_negative};
use serde::{Deserialize, Serialize};

/// Lowest fan speed level the MCU accepts.
pub const FAN_SPEED_MIN: u8 = 1;
/// Highest fan speed level the MCU accepts.
pub const FAN_SPEED_MAX: u8 = 10;

/// Pass/fail criteria for test evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PassCriteria {
    /// Minimum acceptable force [kgf].
    pub force_limit_min: f64,
    /// Maximum acceptable force [kgf].
    pub force_limit_max: f64,
    /// Minimum acceptable temperature [°C].
    pub temperature_limit_min: f64,
    /// Maximum acceptable temperature [°C].
    pub temperature_limit_max: f64,
}

impl Default for PassCriteria {
    fn default() -> Self {
        Self {
            force_limit_min: 0.0,
            force_limit_max: 100.0,
            temperature_limit_min: -10.0,
            temperature_limit_max: 80.0,
        }
    }
}

impl PassCriteria {
    /// Whether a force sample is inside the acceptance window.
    #[inline]
    pub fn force_in_range(&self, force: f64) -> bool {
        force.is_finite() && force >= self.force_limit_min && force <= self.force_limit_max
    }
}

/// Test configuration value object containing all cycle parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestConfiguration {
    // ── Power supply settings ──
    /// Output voltage setpoint [V].
    pub voltage: f64,
    /// Output current setpoint [A].
    pub current: f64,
    /// Over-current limit [A].
    pub upper_current: f64,

    // ── MCU / temperature settings ──
    /// Safety ceiling the MCU must never exceed [°C].
    pub upper_temperature: f64,
    /// Activation temperature for standby heating [°C].
    pub activation_temperature: f64,
    /// Standby temperature between measurement points [°C].
    pub standby_temperature: f64,
    /// Fan speed level (1..=10).
    pub fan_speed: u8,

    // ── Motion control settings ──
    /// Axis velocity [device units/s].
    pub velocity: f64,
    /// Axis acceleration [device units/s²].
    pub acceleration: f64,
    /// Axis deceleration [device units/s²].
    pub deceleration: f64,

    // ── Position settings ──
    /// Parking position between measurements [µm].
    pub initial_position: f64,
    /// Maximum stroke position reached during standby [µm].
    pub operating_position: f64,

    // ── Test matrix ──
    /// Measurement temperatures, in execution order [°C].
    pub temperature_list: Vec<f64>,
    /// Measurement stroke positions, in execution order [µm].
    pub stroke_positions: Vec<f64>,

    // ── Stabilization delays [s] ──
    /// After every robot move.
    pub robot_move_stabilization: f64,
    /// At the operating position during the standby sequence.
    pub robot_standby_stabilization: f64,
    /// After an operating-temperature setpoint, before verification.
    pub mcu_temperature_stabilization: f64,
    /// After every acknowledged MCU command.
    pub mcu_command_stabilization: f64,
    /// After the MCU boot-complete signal.
    pub mcu_boot_complete_stabilization: f64,
    /// After power output enable.
    pub poweron_stabilization: f64,
    /// Between power supply commands.
    pub power_command_stabilization: f64,
    /// After a loadcell zero calibration.
    pub loadcell_zero_delay: f64,

    // ── Measurement settings ──
    /// Acceptable |actual − expected| during temperature verification [°C].
    pub temperature_tolerance: f64,

    // ── Execution settings ──
    /// Retry attempts for MCU command acknowledgement.
    pub retry_attempts: u32,
    /// MCU acknowledgement / boot-wait deadline [s].
    pub timeout_seconds: f64,
    /// How many times the full matrix is swept (results averaged).
    pub repeat_count: u32,

    /// Pass/fail criteria.
    pub pass_criteria: PassCriteria,
}

impl Default for TestConfiguration {
    fn default() -> Self {
        Self {
            voltage: 18.0,
            current: 20.0,
            upper_current: 30.0,
            upper_temperature: 80.0,
            activation_temperature: 52.0,
            standby_temperature: 38.0,
            fan_speed: 10,
            velocity: 100_000.0,
            acceleration: 85_000.0,
            deceleration: 85_000.0,
            initial_position: 1_000.0,
            operating_position: 170_000.0,
            temperature_list: vec![38.0, 52.0, 66.0],
            stroke_positions: vec![170_000.0],
            robot_move_stabilization: 0.1,
            robot_standby_stabilization: 1.0,
            mcu_temperature_stabilization: 0.1,
            mcu_command_stabilization: 0.1,
            mcu_boot_complete_stabilization: 2.0,
            poweron_stabilization: 0.5,
            power_command_stabilization: 0.2,
            loadcell_zero_delay: 0.1,
            temperature_tolerance: 3.0,
            retry_attempts: 3,
            timeout_seconds: 60.0,
            repeat_count: 1,
            pass_criteria: PassCriteria::default(),
        }
    }
}

impl TestConfiguration {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any numeric field is non-finite,
    /// a list is empty, the thermal ordering
    /// `standby <= activation <= upper` is violated, the fan speed is out of
    /// range, or `repeat_count` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (value, field) in [
            (self.voltage, "voltage"),
            (self.current, "current"),
            (self.upper_current, "upper_current"),
            (self.upper_temperature, "upper_temperature"),
            (self.activation_temperature, "activation_temperature"),
            (self.standby_temperature, "standby_temperature"),
            (self.velocity, "velocity"),
            (self.acceleration, "acceleration"),
            (self.deceleration, "deceleration"),
            (self.initial_position, "initial_position"),
            (self.operating_position, "operating_position"),
            (self.temperature_tolerance, "temperature_tolerance"),
            (self.pass_criteria.force_limit_min, "force_limit_min"),
            (self.pass_criteria.force_limit_max, "force_limit_max"),
            (self.pass_criteria.temperature_limit_min, "temperature_limit_min"),
            (self.pass_criteria.temperature_limit_max, "temperature_limit_max"),
        ] {
            require_finite(value, field)?;
        }

        for (value, field) in [
            (self.robot_move_stabilization, "robot_move_stabilization"),
            (self.robot_standby_stabilization, "robot_standby_stabilization"),
            (self.mcu_temperature_stabilization, "mcu_temperature_stabilization"),
            (self.mcu_command_stabilization, "mcu_command_stabilization"),
            (
                self.mcu_boot_complete_stabilization,
                "mcu_boot_complete_stabilization",
            ),
            (self.poweron_stabilization, "poweron_stabilization"),
            (self.power_command_stabilization, "power_command_stabilization"),
            (self.loadcell_zero_delay, "loadcell_zero_delay"),
            (self.timeout_seconds, "timeout_seconds"),
        ] {
            require_non_negative(value, field)?;
        }

        if self.temperature_list.is_empty() {
            return Err(ConfigError::Validation(
                "temperature_list cannot be empty".to_string(),
            ));
        }
        if self.stroke_positions.is_empty() {
            return Err(ConfigError::Validation(
                "stroke_positions cannot be empty".to_string(),
            ));
        }
        for (idx, temp) in self.temperature_list.iter().enumerate() {
            require_finite(*temp, &format!("temperature_list[{idx}]"))?;
        }
        for (idx, pos) in self.stroke_positions.iter().enumerate() {
            require_finite(*pos, &format!("stroke_positions[{idx}]"))?;
        }

        if !(self.standby_temperature <= self.activation_temperature
            && self.activation_temperature <= self.upper_temperature)
        {
            return Err(ConfigError::Validation(format!(
                "thermal ordering violated: standby {} <= activation {} <= upper {} required",
                self.standby_temperature, self.activation_temperature, self.upper_temperature
            )));
        }

        if !(FAN_SPEED_MIN..=FAN_SPEED_MAX).contains(&self.fan_speed) {
            return Err(ConfigError::Validation(format!(
                "fan_speed must be in {FAN_SPEED_MIN}..={FAN_SPEED_MAX}, got {}",
                self.fan_speed
            )));
        }

        if self.repeat_count == 0 {
            return Err(ConfigError::Validation(
                "repeat_count must be >= 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Total number of matrix slots per sweep.
    #[inline]
    pub fn matrix_size(&self) -> usize {
        self.temperature_list.len() * self.stroke_positions.len()
    }
}
