//! Hardware facade: lifecycle and grouped operations across all devices.
//!
//! The facade exclusively owns the five capability instances for the
//! duration of a run. Connect fans out concurrently and either all devices
//! end up connected or every successfully connected device is rolled back.
//! Homing memory lives here, not in the robot: the axis is homed at most
//! once per facade lifetime.

use crate::capability::{DigitalIo, Loadcell, Mcu, MotionParams, Power, Robot};
use eol_common::error::{EolError, EolResult};
use eol_common::hw_config::HardwareConfig;
use eol_common::test_config::TestConfiguration;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

fn secs(value: f64) -> Duration {
    Duration::from_secs_f64(value.max(0.0))
}

/// Per-device connection snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionStatus {
    /// Robot connected.
    pub robot: bool,
    /// MCU connected.
    pub mcu: bool,
    /// Loadcell connected.
    pub loadcell: bool,
    /// Power supply connected.
    pub power: bool,
    /// DIO module connected.
    pub dio: bool,
}

impl ConnectionStatus {
    /// True when every device is connected.
    pub fn all_connected(&self) -> bool {
        self.robot && self.mcu && self.loadcell && self.power && self.dio
    }
}

/// Owner of the five device backends.
pub struct HardwareFacade {
    robot: Box<dyn Robot>,
    mcu: Box<dyn Mcu>,
    loadcell: Box<dyn Loadcell>,
    power: Box<dyn Power>,
    dio: Box<dyn DigitalIo>,
    robot_homed: bool,
}

impl HardwareFacade {
    /// Compose a facade from backend instances.
    pub fn new(
        robot: Box<dyn Robot>,
        mcu: Box<dyn Mcu>,
        loadcell: Box<dyn Loadcell>,
        power: Box<dyn Power>,
        dio: Box<dyn DigitalIo>,
    ) -> Self {
        Self {
            robot,
            mcu,
            loadcell,
            power,
            dio,
            robot_homed: false,
        }
    }

    /// Borrow the robot for the cycle.
    pub fn robot(&mut self) -> &mut dyn Robot {
        self.robot.as_mut()
    }

    /// Borrow the MCU for the cycle.
    pub fn mcu(&mut self) -> &mut dyn Mcu {
        self.mcu.as_mut()
    }

    /// Borrow the loadcell for the cycle.
    pub fn loadcell(&mut self) -> &mut dyn Loadcell {
        self.loadcell.as_mut()
    }

    /// Borrow the power supply for the cycle.
    pub fn power(&mut self) -> &mut dyn Power {
        self.power.as_mut()
    }

    /// Borrow the DIO module for the cycle.
    pub fn dio(&mut self) -> &mut dyn DigitalIo {
        self.dio.as_mut()
    }

    /// Whether the facade has homed the robot in its lifetime.
    pub fn is_robot_homed(&self) -> bool {
        self.robot_homed
    }

    /// Forget the homing memory; the next initialize will home again.
    pub fn reset_homed(&mut self) {
        self.robot_homed = false;
    }

    /// Per-device connection snapshot.
    pub async fn connection_status(&mut self) -> ConnectionStatus {
        ConnectionStatus {
            robot: self.robot.is_connected().await,
            mcu: self.mcu.is_connected().await,
            loadcell: self.loadcell.is_connected().await,
            power: self.power.is_connected().await,
            dio: self.dio.is_connected().await,
        }
    }

    /// Connect every device that is not already connected, concurrently.
    ///
    /// On any failure, every error is collected, devices that did connect
    /// are disconnected again, and a single connection error is returned.
    pub async fn connect_all(&mut self) -> EolResult<()> {
        let robot = &mut self.robot;
        let mcu = &mut self.mcu;
        let loadcell = &mut self.loadcell;
        let power = &mut self.power;
        let dio = &mut self.dio;

        let (robot_r, mcu_r, loadcell_r, power_r, dio_r) = tokio::join!(
            async {
                if robot.is_connected().await {
                    Ok(())
                } else {
                    robot.connect().await
                }
            },
            async {
                if mcu.is_connected().await {
                    Ok(())
                } else {
                    mcu.connect().await
                }
            },
            async {
                if loadcell.is_connected().await {
                    Ok(())
                } else {
                    loadcell.connect().await
                }
            },
            async {
                if power.is_connected().await {
                    Ok(())
                } else {
                    power.connect().await
                }
            },
            async {
                if dio.is_connected().await {
                    Ok(())
                } else {
                    dio.connect().await
                }
            },
        );

        let failures: Vec<String> = [
            ("robot", &robot_r),
            ("mcu", &mcu_r),
            ("loadcell", &loadcell_r),
            ("power", &power_r),
            ("dio", &dio_r),
        ]
        .iter()
        .filter_map(|(name, result)| {
            result.as_ref().err().map(|e| format!("{name}: {e}"))
        })
        .collect();

        if failures.is_empty() {
            info!("all hardware connected");
            return Ok(());
        }

        warn!("hardware connect failed, rolling back: {}", failures.join("; "));
        self.disconnect_connected().await;

        Err(EolError::connection("hardware", failures.join("; ")))
    }

    /// Disconnect every currently connected device, ignoring failures.
    async fn disconnect_connected(&mut self) {
        for (name, result) in [
            ("robot", self.robot.disconnect().await),
            ("mcu", self.mcu.disconnect().await),
            ("loadcell", self.loadcell.disconnect().await),
            ("power", self.power.disconnect().await),
            ("dio", self.dio.disconnect().await),
        ] {
            if let Err(e) = result {
                warn!("{name}: disconnect failed: {e}");
            }
        }
    }

    /// Issue the emergency-stop pair: robot immediate stop and power output
    /// off, concurrently, both best-effort. Never fails.
    pub async fn emergency_stop(&mut self, axis: u32) {
        let robot = &mut self.robot;
        let power = &mut self.power;

        let (robot_r, power_r) = tokio::join!(robot.emergency_stop(axis), power.disable_output());
        if let Err(e) = robot_r {
            warn!("robot: emergency stop failed: {e}");
        }
        if let Err(e) = power_r {
            warn!("power: disable_output during emergency stop failed: {e}");
        }
    }

    /// Disable power output (best-effort) and disconnect everything.
    pub async fn shutdown(&mut self) {
        if self.power.is_connected().await {
            if let Err(e) = self.power.disable_output().await {
                warn!("power: disable_output during shutdown failed: {e}");
            }
        }

        let robot = &mut self.robot;
        let mcu = &mut self.mcu;
        let loadcell = &mut self.loadcell;
        let power = &mut self.power;
        let dio = &mut self.dio;

        let (robot_r, mcu_r, loadcell_r, power_r, dio_r) = tokio::join!(
            robot.disconnect(),
            mcu.disconnect(),
            loadcell.disconnect(),
            power.disconnect(),
            dio.disconnect(),
        );

        for (name, result) in [
            ("robot", robot_r),
            ("mcu", mcu_r),
            ("loadcell", loadcell_r),
            ("power", power_r),
            ("dio", dio_r),
        ] {
            if let Err(e) = result {
                warn!("{name}: disconnect during shutdown failed: {e}");
            }
        }

        info!("hardware shutdown complete");
    }

    /// Bring the hardware to the cycle starting state.
    ///
    /// Brake release, power setpoints (output disabled), servo on, homing
    /// (once per facade lifetime), and the move to the initial position.
    pub async fn initialize_hardware(
        &mut self,
        test: &TestConfiguration,
        hw: &HardwareConfig,
    ) -> EolResult<()> {
        // Release the servo brake before any motion.
        self.dio
            .write_output(u32::from(hw.digital_io.servo1_brake_release), true)
            .await?;

        // Power setpoints with the output held off.
        let settle = secs(test.power_command_stabilization);
        self.power.disable_output().await?;
        sleep(settle).await;
        self.power.set_voltage(test.voltage).await?;
        sleep(settle).await;
        self.power.set_current(test.current).await?;
        sleep(settle).await;
        self.power.set_current_limit(test.upper_current).await?;
        sleep(settle).await;
        info!(
            "power configured: {:.2} V, {:.2} A, limit {:.2} A",
            test.voltage, test.current, test.upper_current
        );

        // Motion: servo on, home once, park at the initial position.
        let axis = hw.robot.axis_id;
        self.robot.enable_servo(axis).await?;
        self.ensure_homed(axis).await?;

        let motion = MotionParams {
            velocity: test.velocity,
            acceleration: test.acceleration,
            deceleration: test.deceleration,
        };
        self.robot
            .move_absolute(test.initial_position, axis, &motion)
            .await?;
        sleep(secs(test.robot_move_stabilization)).await;
        info!("robot parked at initial position {:.1}", test.initial_position);

        Ok(())
    }

    /// Home the axis unless this facade already homed it.
    async fn ensure_homed(&mut self, axis: u32) -> EolResult<()> {
        if self.robot_homed {
            return Ok(());
        }
        info!("homing axis {axis}");
        self.robot.home_axis(axis).await?;
        self.robot_homed = true;
        Ok(())
    }
}
