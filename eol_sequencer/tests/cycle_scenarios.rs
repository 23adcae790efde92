//! End-to-end cycle scenarios on simulator backends.
//!
//! All tests run on the paused tokio clock, so stabilization delays and the
//! 1 s verification retries cost no wall time.

use async_trait::async_trait;
use eol_common::cancel::CancelToken;
use eol_common::dut::DutInfo;
use eol_common::error::EolResult;
use eol_common::hw_config::HardwareConfig;
use eol_common::progress::{Phase, ProgressSink};
use eol_common::test_config::TestConfiguration;
use eol_hal::capability::{MotionParams, Power, Robot, RobotStatus};
use eol_hal::facade::HardwareFacade;
use eol_hal::sim::{SimDio, SimLoadcell, SimMcu, SimPower, SimRobot, SimWorld};
use eol_sequencer::cycle::TestSequencer;
use eol_sequencer::state::CycleState;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

fn test_config() -> TestConfiguration {
    TestConfiguration {
        temperature_list: vec![38.0, 52.0, 66.0],
        stroke_positions: vec![170_000.0],
        repeat_count: 1,
        ..Default::default()
    }
}

fn dut() -> DutInfo {
    DutInfo::new("DUT-001", "WF-A1", "SN0001")
}

fn sim_facade_with_mcu(mcu: SimMcu) -> (HardwareFacade, SimWorld) {
    let world = SimWorld::new();
    let facade = HardwareFacade::new(
        Box::new(SimRobot::new(world.clone())),
        Box::new(mcu),
        Box::new(SimLoadcell::new(world.clone())),
        Box::new(SimPower::new()),
        Box::new(SimDio::new()),
    );
    (facade, world)
}

fn sim_sequencer() -> (TestSequencer, SimWorld) {
    let (facade, world) = sim_facade_with_mcu(SimMcu::new());
    (TestSequencer::new(facade, ProgressSink::disabled()), world)
}

#[tokio::test(start_paused = true)]
async fn happy_path_single_repeat() {
    let (mut sequencer, world) = sim_sequencer();
    let test = test_config();
    let hw = HardwareConfig::default();

    let result = sequencer
        .execute_cycle(1, &test, &hw, &dut(), &CancelToken::new())
        .await;

    assert!(result.is_passed, "error: {:?}", result.error_message);
    assert!(result.error_message.is_none());
    assert_eq!(sequencer.state(), CycleState::Done);

    // Key order is bit-identical to the configuration.
    assert_eq!(result.measurements.temperatures(), vec![38.0, 52.0, 66.0]);
    assert_eq!(result.measurements.slot_count(), 3);
    for &temperature in &test.temperature_list {
        assert_eq!(
            result.measurements.positions_at(temperature),
            Some(vec![170_000.0])
        );
        let force = result
            .measurements
            .force_at(temperature, 170_000.0)
            .expect("slot present");
        assert!(force.is_finite() && force > 0.0);
    }

    // Power is off and the robot is parked on the Done path.
    assert!(!sequencer.facade_mut().power().is_output_enabled());
    assert_eq!(world.position(), 1_000.0);
    assert!(result.execution_duration >= 0.0);
}

#[tokio::test(start_paused = true)]
async fn two_repeats_store_the_arithmetic_mean() {
    let (mut sequencer, _world) = sim_sequencer();
    let test = TestConfiguration {
        repeat_count: 2,
        ..test_config()
    };
    let hw = HardwareConfig::default();

    let result = sequencer
        .execute_cycle(1, &test, &hw, &dut(), &CancelToken::new())
        .await;

    assert!(result.is_passed, "error: {:?}", result.error_message);
    assert_eq!(result.measurements.temperatures().len(), 3);

    // The simulated loadcell steps +1.0 kgf per peak read at a position.
    // Reads at 170000 µm run in matrix order: 8.5, 9.5, 10.5 (repeat 1),
    // 11.5, 12.5, 13.5 (repeat 2). At 52.0 °C the two per-repeat samples
    // are 9.5 and 12.5; the stored value is their mean.
    assert_eq!(
        result.measurements.force_at(52.0, 170_000.0),
        Some((9.5 + 12.5) / 2.0)
    );

    // Aggregation collapsed the sample vectors.
    assert_eq!(
        result
            .measurements
            .samples_at(52.0, 170_000.0)
            .map(<[f64]>::len),
        Some(1)
    );
}

#[tokio::test(start_paused = true)]
async fn temperature_out_of_tolerance_fails_in_setup() {
    // A fixed 20.0 °C reading with hardware identity defeats verification
    // of the 52.0 °C activation target (tolerance 3.0 °C).
    let (facade, _world) =
        sim_facade_with_mcu(SimMcu::new().with_fixed_temperature(20.0).with_hardware_identity());
    let mut sequencer = TestSequencer::new(facade, ProgressSink::disabled());

    let result = sequencer
        .execute_cycle(1, &test_config(), &HardwareConfig::default(), &dut(), &CancelToken::new())
        .await;

    assert!(!result.is_passed);
    assert_eq!(sequencer.state(), CycleState::Failed);
    assert!(result.measurements.is_empty());

    let message = result.error_message.expect("failure message");
    assert!(message.contains("mcu"), "message: {message}");
    assert!(message.contains("verify_temperature"), "message: {message}");

    assert!(!sequencer.facade_mut().power().is_output_enabled());
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_measurement_preserves_partial_results() {
    let world = SimWorld::new();
    let facade = HardwareFacade::new(
        Box::new(SimRobot::new(world.clone())),
        Box::new(SimMcu::new()),
        Box::new(SimLoadcell::new(world.clone())),
        Box::new(SimPower::new()),
        Box::new(SimDio::new()),
    );
    let (progress, mut progress_rx) = ProgressSink::channel();
    let mut sequencer = TestSequencer::new(facade, progress);

    // Fire cancellation as soon as the first force sample lands.
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        while let Some(event) = progress_rx.recv().await {
            if event.step == "force_recorded" {
                trigger.cancel();
                break;
            }
        }
    });

    let result = sequencer
        .execute_cycle(1, &test_config(), &HardwareConfig::default(), &dut(), &cancel)
        .await;

    assert!(!result.is_passed);
    assert_eq!(sequencer.state(), CycleState::Cancelled);
    assert_eq!(result.measurements.slot_count(), 1);
    assert_eq!(result.measurements.temperatures(), vec![38.0]);

    // Teardown still parked the robot and dropped power.
    assert_eq!(world.position(), 1_000.0);
    assert!(!sequencer.facade_mut().power().is_output_enabled());
}

/// Robot wrapper counting emergency stops (scenario fixture).
struct CountingRobot {
    inner: SimRobot,
    emergency_stops: Arc<AtomicU32>,
}

#[async_trait]
impl Robot for CountingRobot {
    async fn connect(&mut self) -> EolResult<()> {
        self.inner.connect().await
    }
    async fn disconnect(&mut self) -> EolResult<()> {
        self.inner.disconnect().await
    }
    async fn is_connected(&self) -> bool {
        self.inner.is_connected().await
    }
    async fn enable_servo(&mut self, axis: u32) -> EolResult<()> {
        self.inner.enable_servo(axis).await
    }
    async fn disable_servo(&mut self, axis: u32) -> EolResult<()> {
        self.inner.disable_servo(axis).await
    }
    async fn home_axis(&mut self, axis: u32) -> EolResult<()> {
        self.inner.home_axis(axis).await
    }
    async fn move_absolute(
        &mut self,
        position: f64,
        axis: u32,
        motion: &MotionParams,
    ) -> EolResult<()> {
        self.inner.move_absolute(position, axis, motion).await
    }
    async fn get_position(&mut self, axis: u32) -> EolResult<f64> {
        self.inner.get_position(axis).await
    }
    async fn stop_motion(&mut self, axis: u32) {
        self.inner.stop_motion(axis).await;
    }
    async fn emergency_stop(&mut self, axis: u32) -> EolResult<()> {
        self.emergency_stops.fetch_add(1, Ordering::SeqCst);
        self.inner.emergency_stop(axis).await
    }
    async fn get_status(&mut self) -> RobotStatus {
        self.inner.get_status().await
    }
}

#[tokio::test(start_paused = true)]
async fn emergency_stop_latches_until_reset() {
    let world = SimWorld::new();
    let emergency_stops = Arc::new(AtomicU32::new(0));
    let facade = HardwareFacade::new(
        Box::new(CountingRobot {
            inner: SimRobot::new(world.clone()),
            emergency_stops: emergency_stops.clone(),
        }),
        Box::new(SimMcu::new()),
        Box::new(SimLoadcell::new(world.clone())),
        Box::new(SimPower::new()),
        Box::new(SimDio::new()),
    );
    let (progress, mut progress_rx) = ProgressSink::channel();
    let mut sequencer = TestSequencer::new(facade, progress);

    // Trip the emergency stop at the first measurement-phase move.
    let emergency = sequencer.emergency_handle();
    tokio::spawn(async move {
        while let Some(event) = progress_rx.recv().await {
            if event.phase == Phase::Measure && event.step == "move_absolute" {
                emergency.trigger();
                break;
            }
        }
    });

    let test = test_config();
    let hw = HardwareConfig::default();

    let result = sequencer.execute_cycle(1, &test, &hw, &dut(), &CancelToken::new()).await;

    assert!(!result.is_passed);
    assert_eq!(sequencer.state(), CycleState::Cancelled);
    assert!(sequencer.is_emergency_active());
    assert_eq!(emergency_stops.load(Ordering::SeqCst), 1);
    assert!(!sequencer.facade_mut().power().is_output_enabled());

    // No motion while the latch is set: the robot was NOT parked.
    assert_eq!(world.position(), 170_000.0);

    // A new cycle is refused outright until the latch is cleared.
    let refused = sequencer.execute_cycle(2, &test, &hw, &dut(), &CancelToken::new()).await;
    assert!(!refused.is_passed);
    assert_eq!(sequencer.state(), CycleState::Failed);
    assert!(
        refused
            .error_message
            .as_deref()
            .expect("refusal message")
            .contains("Safety violation")
    );
    assert_eq!(emergency_stops.load(Ordering::SeqCst), 1, "no extra stop issued");

    // After the reset a full cycle runs clean.
    sequencer.reset_emergency();
    let recovered = sequencer.execute_cycle(3, &test, &hw, &dut(), &CancelToken::new()).await;
    assert!(recovered.is_passed, "error: {:?}", recovered.error_message);
    assert_eq!(sequencer.state(), CycleState::Done);
    assert_eq!(world.position(), 1_000.0);
}

#[tokio::test(start_paused = true)]
async fn configuration_error_fails_before_any_io() {
    let (mut sequencer, _world) = sim_sequencer();
    let test = TestConfiguration {
        temperature_list: vec![],
        ..Default::default()
    };

    let result = sequencer
        .execute_cycle(1, &test, &HardwareConfig::default(), &dut(), &CancelToken::new())
        .await;

    assert!(!result.is_passed);
    assert_eq!(sequencer.state(), CycleState::Failed);
    assert!(
        result
            .error_message
            .as_deref()
            .expect("config message")
            .contains("Configuration")
    );
    // Nothing was powered: the cycle never reached the hardware.
    assert!(!sequencer.facade_mut().power().is_output_enabled());
}

#[tokio::test(start_paused = true)]
async fn unordered_temperature_list_order_is_preserved() {
    let (mut sequencer, _world) = sim_sequencer();
    let test = TestConfiguration {
        temperature_list: vec![66.0, 38.0, 52.0],
        stroke_positions: vec![50_000.0, 170_000.0],
        ..Default::default()
    };

    let result = sequencer
        .execute_cycle(1, &test, &HardwareConfig::default(), &dut(), &CancelToken::new())
        .await;

    assert!(result.is_passed, "error: {:?}", result.error_message);
    assert_eq!(result.measurements.temperatures(), vec![66.0, 38.0, 52.0]);
    assert_eq!(
        result.measurements.positions_at(38.0),
        Some(vec![50_000.0, 170_000.0])
    );
    assert_eq!(result.measurements.slot_count(), 6);
}

#[tokio::test(start_paused = true)]
async fn multi_cycle_run_homes_once_and_aggregates() {
    let (mut sequencer, _world) = sim_sequencer();
    let test = test_config();
    let hw = HardwareConfig::default();

    let report = sequencer
        .execute(2, &test, &hw, &dut(), &CancelToken::new())
        .await;

    assert_eq!(report.cycle_count(), 2);
    assert!(report.all_passed());
    assert_eq!(report.cycles[0].cycle_number, 1);
    assert_eq!(report.cycles[1].cycle_number, 2);

    // Homing memory spans cycles; the facade homed the axis exactly once.
    assert!(sequencer.facade_mut().is_robot_homed());
}
