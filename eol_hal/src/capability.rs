//! Abstract device contracts for the five EOL instruments.
//!
//! Backends (simulator or hardware) implement these traits; the facade owns
//! one boxed instance per device and the orchestrator borrows them for the
//! duration of a cycle. Every operation suspends and is cancellable unless
//! noted.

use async_trait::async_trait;
use eol_common::error::EolResult;
use std::time::Duration;

/// MCU test mode selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestMode {
    /// Production force-test mode.
    Mode1,
    /// Diagnostic mode.
    Mode2,
    /// Burn-in mode.
    Mode3,
}

impl TestMode {
    /// Wire encoding (one u32 field).
    #[inline]
    pub const fn wire_value(self) -> u32 {
        match self {
            Self::Mode1 => 1,
            Self::Mode2 => 2,
            Self::Mode3 => 3,
        }
    }
}

/// Motion profile for one absolute move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionParams {
    /// Velocity [device units/s].
    pub velocity: f64,
    /// Acceleration [device units/s²].
    pub acceleration: f64,
    /// Deceleration [device units/s²].
    pub deceleration: f64,
}

/// Snapshot of the robot backend state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RobotStatus {
    /// Whether the backend is connected.
    pub connected: bool,
    /// Last-known axis positions.
    pub positions: Vec<f64>,
    /// Whether any axis reported in-motion at the last poll.
    pub moving: bool,
}

/// Combined electrical measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerMeasurements {
    /// Measured voltage [V].
    pub voltage: f64,
    /// Measured current [A].
    pub current: f64,
    /// Derived power [W].
    pub power: f64,
}

/// Servo-controlled linear robot axis.
#[async_trait]
pub trait Robot: Send + Sync {
    /// Connect to the motion controller.
    async fn connect(&mut self) -> EolResult<()>;

    /// Disconnect. Idempotent.
    async fn disconnect(&mut self) -> EolResult<()>;

    /// Whether the backend is connected.
    async fn is_connected(&self) -> bool;

    /// Enable the servo on `axis`. Idempotent.
    async fn enable_servo(&mut self, axis: u32) -> EolResult<()>;

    /// Disable the servo on `axis`. Idempotent.
    async fn disable_servo(&mut self, axis: u32) -> EolResult<()>;

    /// Run the homing procedure and block until it reports success.
    ///
    /// Enforces a 60 s wall-clock cap. Any result that is neither Success
    /// nor Searching fails with a motion error.
    async fn home_axis(&mut self, axis: u32) -> EolResult<()>;

    /// Start an absolute move and await completion (polled at >= 10 ms
    /// intervals, 30 s cap).
    async fn move_absolute(
        &mut self,
        position: f64,
        axis: u32,
        motion: &MotionParams,
    ) -> EolResult<()>;

    /// Current actual position of `axis`.
    async fn get_position(&mut self, axis: u32) -> EolResult<f64>;

    /// Decelerated stop. Best-effort, never fails.
    async fn stop_motion(&mut self, axis: u32);

    /// Immediate stop. Must succeed even with the servo off; afterwards the
    /// axis is safe for `disable_servo` and `disconnect`.
    async fn emergency_stop(&mut self, axis: u32) -> EolResult<()>;

    /// Status snapshot.
    async fn get_status(&mut self) -> RobotStatus;
}

/// DUT heating/cooling microcontroller.
#[async_trait]
pub trait Mcu: Send + Sync {
    /// Connect; waits for the boot-complete status (up to 60 s, soft).
    async fn connect(&mut self) -> EolResult<()>;

    /// Disconnect. Idempotent.
    async fn disconnect(&mut self) -> EolResult<()>;

    /// Whether the backend is connected.
    async fn is_connected(&self) -> bool;

    /// Wait for the boot-complete status within `deadline`.
    async fn wait_boot_complete(&mut self, deadline: Duration) -> EolResult<()>;

    /// Enter a test mode; awaits the matching ACK.
    async fn set_test_mode(&mut self, mode: TestMode) -> EolResult<()>;

    /// Set the upper temperature limit [°C]; awaits the matching ACK.
    async fn set_upper_temperature(&mut self, celsius: f64) -> EolResult<()>;

    /// Set the fan speed level (1..=10); awaits the matching ACK.
    async fn set_fan_speed(&mut self, level: u8) -> EolResult<()>;

    /// Set the operating temperature [°C]; awaits the matching ACK.
    async fn set_operating_temperature(&mut self, celsius: f64) -> EolResult<()>;

    /// Set the cooling temperature [°C]; awaits the matching ACK.
    async fn set_cooling_temperature(&mut self, celsius: f64) -> EolResult<()>;

    /// Begin standby heating toward `operating` with fallback `standby`
    /// (wire init with hold_ms = 0).
    async fn start_standby_heating(&mut self, operating: f64, standby: f64) -> EolResult<()>;

    /// Begin driving temperature toward the standby setpoint captured by the
    /// prior [`Mcu::start_standby_heating`] call.
    async fn start_standby_cooling(&mut self) -> EolResult<()>;

    /// Request and return the current temperature [°C].
    async fn get_temperature(&mut self) -> EolResult<f64>;

    /// Notify the controller that stroke initialization finished.
    async fn notify_stroke_init_complete(&mut self) -> EolResult<()>;

    /// Whether this backend is a simulator (temperature verification is
    /// bypassed for simulators).
    fn is_simulator(&self) -> bool {
        false
    }
}

/// Programmable DC power supply.
#[async_trait]
pub trait Power: Send + Sync {
    /// Connect; requires a non-empty `*IDN?` reply.
    async fn connect(&mut self) -> EolResult<()>;

    /// Disconnect. Idempotent.
    async fn disconnect(&mut self) -> EolResult<()>;

    /// Whether the backend is connected.
    async fn is_connected(&self) -> bool;

    /// Set output voltage [V].
    async fn set_voltage(&mut self, volts: f64) -> EolResult<()>;

    /// Set output current [A].
    async fn set_current(&mut self, amps: f64) -> EolResult<()>;

    /// Set the over-current limit [A].
    async fn set_current_limit(&mut self, amps: f64) -> EolResult<()>;

    /// Measure output voltage [V].
    async fn get_voltage(&mut self) -> EolResult<f64>;

    /// Measure output current [A].
    async fn get_current(&mut self) -> EolResult<f64>;

    /// Read the over-current limit [A].
    async fn get_current_limit(&mut self) -> EolResult<f64>;

    /// Measure voltage, current, and derived power in one exchange where
    /// the instrument supports it.
    async fn get_all_measurements(&mut self) -> EolResult<PowerMeasurements>;

    /// Enable the output.
    async fn enable_output(&mut self) -> EolResult<()>;

    /// Disable the output.
    async fn disable_output(&mut self) -> EolResult<()>;

    /// Output state as cached after the last command (no I/O).
    fn is_output_enabled(&self) -> bool;

    /// Identification captured at connect.
    fn device_identity(&self) -> Option<String>;
}

/// Force-sensing loadcell.
#[async_trait]
pub trait Loadcell: Send + Sync {
    /// Connect to the indicator.
    async fn connect(&mut self) -> EolResult<()>;

    /// Disconnect. Idempotent.
    async fn disconnect(&mut self) -> EolResult<()>;

    /// Whether the backend is connected.
    async fn is_connected(&self) -> bool;

    /// Single force sample [kgf].
    async fn read_force(&mut self) -> EolResult<f64>;

    /// Sample for `duration_ms` at `max(200 ms, sample_interval_ms)` pacing
    /// and return the sample with the largest absolute value [kgf].
    ///
    /// Fails only when every sample failed; the error names attempt and
    /// error counts.
    async fn read_peak_force(
        &mut self,
        duration_ms: u64,
        sample_interval_ms: u64,
    ) -> EolResult<f64>;

    /// Enter hold mode. Idempotent.
    async fn hold(&mut self) -> EolResult<()>;

    /// Release hold mode. Idempotent.
    async fn hold_release(&mut self) -> EolResult<()>;

    /// Zero calibration ('Z' then a 1 s settle).
    async fn zero_calibration(&mut self) -> EolResult<()>;
}

/// Digital I/O module driving safety indicators.
#[async_trait]
pub trait DigitalIo: Send + Sync {
    /// Connect to the I/O modules.
    async fn connect(&mut self) -> EolResult<()>;

    /// Disconnect. Idempotent.
    async fn disconnect(&mut self) -> EolResult<()>;

    /// Whether the backend is connected.
    async fn is_connected(&self) -> bool;

    /// Read one input channel.
    async fn read_input(&mut self, channel: u32) -> EolResult<bool>;

    /// Read one output channel back.
    async fn read_output(&mut self, channel: u32) -> EolResult<bool>;

    /// Write one output channel.
    async fn write_output(&mut self, channel: u32, value: bool) -> EolResult<()>;

    /// All inputs in channel order.
    async fn read_all_inputs(&mut self) -> EolResult<Vec<bool>>;

    /// `count` inputs starting at `start`.
    async fn read_inputs(&mut self, start: u32, count: u32) -> EolResult<Vec<bool>>;

    /// Write consecutive outputs starting at `start`.
    async fn write_outputs(&mut self, start: u32, values: &[bool]) -> EolResult<()>;

    /// Drive every output to `value`.
    async fn set_all_outputs(&mut self, value: bool) -> EolResult<()>;

    /// Drive every output low.
    async fn reset_all_outputs(&mut self) -> EolResult<()>;

    /// Number of input channels.
    async fn input_count(&mut self) -> EolResult<u32>;

    /// Number of output channels.
    async fn output_count(&mut self) -> EolResult<u32>;
}
