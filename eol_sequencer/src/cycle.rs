//! The test-cycle state machine.
//!
//! One [`TestSequencer::execute_cycle`] call drives
//! `initialize → setup → measure-matrix → teardown`. Cancellation and the
//! emergency stop are observed at every suspension point; teardown always
//! runs and power output is off on every terminal path.

use crate::emergency::EmergencyStop;
use crate::state::{CycleState, RobotState};
use crate::verify::verify_mcu_temperature;
use chrono::Utc;
use eol_common::cancel::CancelToken;
use eol_common::dut::DutInfo;
use eol_common::error::{EolError, EolResult};
use eol_common::hw_config::HardwareConfig;
use eol_common::measurements::TestMeasurements;
use eol_common::progress::{Phase, ProgressSink};
use eol_common::result::{CycleResult, TestReport};
use eol_common::test_config::TestConfiguration;
use eol_hal::capability::{Loadcell, Mcu, MotionParams, Power, Robot, TestMode};
use eol_hal::facade::HardwareFacade;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{error, info, warn};

/// Peak-force sampling window per measurement point [ms].
const PEAK_FORCE_DURATION_MS: u64 = 1000;
/// Peak-force sampling interval [ms].
const PEAK_FORCE_INTERVAL_MS: u64 = 200;

fn secs(value: f64) -> Duration {
    Duration::from_secs_f64(value.max(0.0))
}

/// Orchestrator for EOL force-test cycles.
///
/// Owns the hardware facade across cycles (preserving the facade's homing
/// memory) and the sticky emergency-stop latch.
pub struct TestSequencer {
    facade: HardwareFacade,
    emergency: EmergencyStop,
    progress: ProgressSink,
    state: CycleState,
    robot_state: RobotState,
}

impl TestSequencer {
    /// Create a sequencer around a composed facade.
    pub fn new(facade: HardwareFacade, progress: ProgressSink) -> Self {
        Self {
            facade,
            emergency: EmergencyStop::new(),
            progress,
            state: CycleState::Created,
            robot_state: RobotState::Unknown,
        }
    }

    /// Clone the emergency-stop handle for external triggering.
    pub fn emergency_handle(&self) -> EmergencyStop {
        self.emergency.clone()
    }

    /// Whether the emergency stop is latched.
    pub fn is_emergency_active(&self) -> bool {
        self.emergency.is_active()
    }

    /// Clear the emergency latch so cycles may start again.
    pub fn reset_emergency(&mut self) {
        self.emergency.reset();
        info!("emergency stop reset");
    }

    /// State the most recent cycle ended in.
    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Orchestrator-tracked robot position state.
    pub fn robot_state(&self) -> RobotState {
        self.robot_state
    }

    /// Borrow the facade (post-cycle inspection, manual device access).
    pub fn facade_mut(&mut self) -> &mut HardwareFacade {
        &mut self.facade
    }

    /// Disconnect all hardware.
    pub async fn shutdown(&mut self) {
        self.facade.shutdown().await;
    }

    /// Execute `cycles` cycles in order, stopping early on cancellation or
    /// emergency stop.
    pub async fn execute(
        &mut self,
        cycles: u32,
        test: &TestConfiguration,
        hw: &HardwareConfig,
        dut: &DutInfo,
        cancel: &CancelToken,
    ) -> TestReport {
        let mut report = TestReport::new();
        for cycle_number in 1..=cycles {
            if cancel.is_cancelled() {
                warn!("run cancelled before cycle {cycle_number}");
                break;
            }
            let result = self.execute_cycle(cycle_number, test, hw, dut, cancel).await;
            let stop_after = self.emergency.is_active();
            report.push(result);
            if stop_after {
                break;
            }
        }
        report
    }

    /// Execute one full cycle and produce its result.
    ///
    /// Never returns an error: failures are recorded in the
    /// [`CycleResult::error_message`] and partial measurements are
    /// preserved. Power output is disabled on every terminal path.
    pub async fn execute_cycle(
        &mut self,
        cycle_number: u32,
        test: &TestConfiguration,
        hw: &HardwareConfig,
        dut: &DutInfo,
        cancel: &CancelToken,
    ) -> CycleResult {
        let started = Instant::now();
        self.state = CycleState::Created;
        self.robot_state = RobotState::Unknown;

        // The latch blocks new cycles outright.
        if self.emergency.is_active() {
            self.state = CycleState::Failed;
            let err = EolError::Safety("emergency stop active, reset required".to_string());
            error!("cycle {cycle_number} refused: {err}");
            return CycleResult::failed(
                cycle_number,
                TestMeasurements::new(),
                err.to_string(),
                started.elapsed().as_secs_f64(),
                Utc::now(),
            );
        }

        // Configuration errors surface before any I/O.
        if let Err(e) = test
            .validate()
            .and_then(|()| hw.validate())
            .and_then(|()| dut.validate())
        {
            self.state = CycleState::Failed;
            let err: EolError = e.into();
            error!("cycle {cycle_number} configuration invalid: {err}");
            return CycleResult::failed(
                cycle_number,
                TestMeasurements::new(),
                err.to_string(),
                started.elapsed().as_secs_f64(),
                Utc::now(),
            );
        }

        info!(
            "cycle {cycle_number} starting for DUT {} ({} / {})",
            dut.dut_id, dut.model_number, dut.serial_number
        );

        let mut measurements = TestMeasurements::new();
        let outcome = self.run_cycle_body(&mut measurements, test, hw, cancel).await;

        // Emergency actions fire before teardown; both are best-effort.
        if self.emergency.is_active() {
            self.progress.emit(Phase::Teardown, "emergency_stop", None);
            self.facade.emergency_stop(hw.robot.axis_id).await;
        }

        self.run_teardown(test, hw).await;

        // Devices are released at cycle end, success or not.
        self.facade.shutdown().await;

        let duration = started.elapsed().as_secs_f64();
        match outcome {
            Ok(()) => {
                self.state = CycleState::Done;
                let result = CycleResult::completed(
                    cycle_number,
                    measurements,
                    test,
                    duration,
                    Utc::now(),
                );
                info!(
                    "cycle {cycle_number} done in {duration:.1} s: {}",
                    if result.is_passed { "PASS" } else { "FAIL" }
                );
                result
            }
            Err(e) => {
                self.state = match &e {
                    EolError::Cancelled | EolError::Safety(_) => CycleState::Cancelled,
                    _ => CycleState::Failed,
                };
                error!("cycle {cycle_number} terminated: {e}");
                CycleResult::failed(cycle_number, measurements, e.to_string(), duration, Utc::now())
            }
        }
    }

    // ── Phases ──────────────────────────────────────────────────────

    async fn run_cycle_body(
        &mut self,
        measurements: &mut TestMeasurements,
        test: &TestConfiguration,
        hw: &HardwareConfig,
        cancel: &CancelToken,
    ) -> EolResult<()> {
        self.run_initialize(test, hw, cancel).await?;
        self.run_setup(test, hw, cancel).await?;
        self.run_measurements(measurements, test, hw, cancel).await?;
        Ok(())
    }

    async fn run_initialize(
        &mut self,
        test: &TestConfiguration,
        hw: &HardwareConfig,
        cancel: &CancelToken,
    ) -> EolResult<()> {
        self.checkpoint(cancel)?;
        self.progress.emit(Phase::Initialize, "connect_all", None);
        self.facade.connect_all().await?;

        self.checkpoint(cancel)?;
        self.progress.emit(Phase::Initialize, "initialize_hardware", None);
        self.facade.initialize_hardware(test, hw).await?;
        self.robot_state = RobotState::InitialPosition;

        self.state = CycleState::Initialized;
        Ok(())
    }

    async fn run_setup(
        &mut self,
        test: &TestConfiguration,
        hw: &HardwareConfig,
        cancel: &CancelToken,
    ) -> EolResult<()> {
        self.checkpoint(cancel)?;
        self.progress.emit(Phase::Setup, "power_on", None);
        self.facade.power().enable_output().await?;
        self.wait(test.poweron_stabilization, cancel).await?;

        self.progress.emit(Phase::Setup, "wait_boot_complete", None);
        self.facade
            .mcu()
            .wait_boot_complete(secs(test.timeout_seconds))
            .await?;
        self.wait(test.mcu_boot_complete_stabilization, cancel).await?;

        self.progress.emit(Phase::Setup, "set_test_mode", None);
        self.facade.mcu().set_test_mode(TestMode::Mode1).await?;
        self.wait(test.mcu_command_stabilization, cancel).await?;

        self.run_standby_sequence(test, hw, cancel).await?;

        self.state = CycleState::SetupComplete;
        info!("setup complete");
        Ok(())
    }

    /// Standby sequence: heat, exercise the stroke, cool back down.
    async fn run_standby_sequence(
        &mut self,
        test: &TestConfiguration,
        hw: &HardwareConfig,
        cancel: &CancelToken,
    ) -> EolResult<()> {
        self.checkpoint(cancel)?;
        self.progress.emit(Phase::Setup, "standby_heating", None);

        self.facade
            .mcu()
            .set_upper_temperature(test.upper_temperature)
            .await?;
        self.wait(test.mcu_command_stabilization, cancel).await?;

        self.facade.mcu().set_fan_speed(test.fan_speed).await?;
        self.wait(test.mcu_command_stabilization, cancel).await?;

        self.facade
            .mcu()
            .start_standby_heating(test.activation_temperature, test.standby_temperature)
            .await?;
        self.wait(test.mcu_command_stabilization, cancel).await?;

        self.verify_temperature(Phase::Setup, test.activation_temperature, test, cancel)
            .await?;

        self.move_robot(
            Phase::Setup,
            test.operating_position,
            RobotState::MaxStroke,
            test,
            hw,
            cancel,
        )
        .await?;
        self.wait(test.robot_standby_stabilization, cancel).await?;

        self.move_robot(
            Phase::Setup,
            test.initial_position,
            RobotState::InitialPosition,
            test,
            hw,
            cancel,
        )
        .await?;

        self.progress.emit(Phase::Setup, "standby_cooling", None);
        self.facade.mcu().start_standby_cooling().await?;
        self.wait(test.mcu_command_stabilization, cancel).await?;

        self.verify_temperature(Phase::Setup, test.standby_temperature, test, cancel)
            .await?;

        info!("standby sequence complete");
        Ok(())
    }

    async fn run_measurements(
        &mut self,
        measurements: &mut TestMeasurements,
        test: &TestConfiguration,
        hw: &HardwareConfig,
        cancel: &CancelToken,
    ) -> EolResult<()> {
        self.state = CycleState::Measuring;
        let matrix = test.matrix_size();
        info!(
            "measuring {} temperatures × {} positions × {} repeats ({matrix} slots)",
            test.temperature_list.len(),
            test.stroke_positions.len(),
            test.repeat_count
        );

        for repeat in 1..=test.repeat_count {
            for (temp_index, &temperature) in test.temperature_list.iter().enumerate() {
                self.checkpoint(cancel)?;
                self.progress.emit(
                    Phase::Measure,
                    "set_temperature",
                    Some(format!("{temperature:.1}")),
                );
                info!(
                    "repeat {repeat}/{}: temperature {temperature:.1} °C ({}/{})",
                    test.repeat_count,
                    temp_index + 1,
                    test.temperature_list.len()
                );

                self.facade.loadcell().hold().await?;

                self.facade
                    .mcu()
                    .set_operating_temperature(temperature)
                    .await?;
                self.wait(test.mcu_command_stabilization, cancel).await?;
                self.wait(test.mcu_temperature_stabilization, cancel).await?;

                self.verify_temperature(Phase::Measure, temperature, test, cancel)
                    .await?;

                for &position in &test.stroke_positions {
                    self.move_robot(
                        Phase::Measure,
                        position,
                        RobotState::MeasurementPosition,
                        test,
                        hw,
                        cancel,
                    )
                    .await?;

                    self.checkpoint(cancel)?;
                    let force = self
                        .facade
                        .loadcell()
                        .read_peak_force(PEAK_FORCE_DURATION_MS, PEAK_FORCE_INTERVAL_MS)
                        .await?;
                    measurements.record(temperature, position, force);
                    self.progress.emit(
                        Phase::Measure,
                        "force_recorded",
                        Some(format!("{temperature:.1}/{position:.1}: {force:.3} kgf")),
                    );
                }

                self.facade.loadcell().hold_release().await?;

                if self.robot_state != RobotState::InitialPosition {
                    self.move_robot(
                        Phase::Measure,
                        test.initial_position,
                        RobotState::InitialPosition,
                        test,
                        hw,
                        cancel,
                    )
                    .await?;
                }

                self.facade.mcu().start_standby_cooling().await?;
                self.wait(test.mcu_command_stabilization, cancel).await?;
                self.verify_temperature(Phase::Measure, test.standby_temperature, test, cancel)
                    .await?;
            }
        }

        if test.repeat_count > 1 {
            measurements.aggregate_mean();
        }

        info!("measurement matrix complete: {} slots", measurements.slot_count());
        Ok(())
    }

    /// Teardown never aborts the cycle; failures are logged and swallowed.
    async fn run_teardown(&mut self, test: &TestConfiguration, hw: &HardwareConfig) {
        self.progress.emit(Phase::Teardown, "teardown", None);

        // Park the robot, unless the emergency latch forbids motion.
        if self.robot_state != RobotState::InitialPosition && !self.emergency.is_active() {
            let motion = MotionParams {
                velocity: test.velocity,
                acceleration: test.acceleration,
                deceleration: test.deceleration,
            };
            match self
                .facade
                .robot()
                .move_absolute(test.initial_position, hw.robot.axis_id, &motion)
                .await
            {
                Ok(()) => {
                    sleep(secs(test.robot_move_stabilization)).await;
                    self.robot_state = RobotState::InitialPosition;
                }
                Err(e) => warn!("teardown: robot return-to-initial failed: {e}"),
            }
        }

        if let Err(e) = self.facade.power().disable_output().await {
            warn!("teardown: power disable failed: {e}");
        }

        self.state = CycleState::TeardownComplete;
        self.progress.emit(Phase::Teardown, "teardown_complete", None);
    }

    // ── Helpers ─────────────────────────────────────────────────────

    /// Fail fast when cancelled or latched.
    fn checkpoint(&self, cancel: &CancelToken) -> EolResult<()> {
        if self.emergency.is_active() {
            return Err(EolError::Safety("emergency stop active".to_string()));
        }
        cancel.check()
    }

    /// Stabilization delay that wakes on cancellation or emergency stop.
    async fn wait(&self, seconds: f64, cancel: &CancelToken) -> EolResult<()> {
        self.checkpoint(cancel)?;
        if seconds <= 0.0 {
            return Ok(());
        }
        tokio::select! {
            () = sleep(secs(seconds)) => Ok(()),
            () = cancel.cancelled() => Err(EolError::Cancelled),
            () = self.emergency.fired() => {
                Err(EolError::Safety("emergency stop active".to_string()))
            }
        }
    }

    /// Move the axis and settle; updates the tracked robot state.
    async fn move_robot(
        &mut self,
        phase: Phase,
        position: f64,
        target: RobotState,
        test: &TestConfiguration,
        hw: &HardwareConfig,
        cancel: &CancelToken,
    ) -> EolResult<()> {
        self.checkpoint(cancel)?;
        self.progress
            .emit(phase, "move_absolute", Some(format!("{position:.1}")));

        self.robot_state = RobotState::Moving;
        let motion = MotionParams {
            velocity: test.velocity,
            acceleration: test.acceleration,
            deceleration: test.deceleration,
        };
        self.facade
            .robot()
            .move_absolute(position, hw.robot.axis_id, &motion)
            .await?;
        self.wait(test.robot_move_stabilization, cancel).await?;
        self.robot_state = target;
        Ok(())
    }

    async fn verify_temperature(
        &mut self,
        phase: Phase,
        expected: f64,
        test: &TestConfiguration,
        cancel: &CancelToken,
    ) -> EolResult<()> {
        self.progress.emit(
            phase,
            "verify_temperature",
            Some(format!("{expected:.1}")),
        );
        verify_mcu_temperature(
            self.facade.mcu(),
            expected,
            test.temperature_tolerance,
            cancel,
            &self.emergency,
        )
        .await
    }
}
