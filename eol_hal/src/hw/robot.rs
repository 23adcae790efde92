//! AXL robot hardware backend.

use crate::capability::{MotionParams, Robot, RobotStatus};
use crate::driver::axl::{AxlHandle, HomeResult};
use async_trait::async_trait;
use eol_common::error::{EolError, EolResult};
use eol_common::hw_config::RobotConfig;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{info, warn};

/// Wall-clock cap on the homing procedure.
const HOMING_TIMEOUT: Duration = Duration::from_secs(60);
/// Poll interval while homing.
const HOMING_POLL: Duration = Duration::from_millis(100);
/// Wall-clock cap on one absolute move.
const MOTION_TIMEOUT: Duration = Duration::from_secs(30);
/// Poll interval while a move is in flight.
const MOTION_POLL: Duration = Duration::from_millis(10);

/// Servo robot over the AXL motion library.
pub struct AxlRobot {
    config: RobotConfig,
    axl: AxlHandle,
    connected: bool,
}

impl AxlRobot {
    /// Create a backend sharing the given library handle.
    pub fn new(config: RobotConfig, axl: AxlHandle) -> Self {
        Self {
            config,
            axl,
            connected: false,
        }
    }

    fn require_connected(&self) -> EolResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(EolError::connection("robot", "not connected"))
        }
    }

    async fn wait_motion_complete(&self, axis: u32) -> EolResult<()> {
        let deadline = Instant::now() + MOTION_TIMEOUT;
        loop {
            if !self.axl.read_in_motion(axis)? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(EolError::timeout("robot", "move_absolute", MOTION_TIMEOUT));
            }
            sleep(MOTION_POLL).await;
        }
    }
}

#[async_trait]
impl Robot for AxlRobot {
    async fn connect(&mut self) -> EolResult<()> {
        if self.connected {
            return Ok(());
        }
        self.axl.open(self.config.irq_no)?;

        if let Some(param_file) = &self.config.motion_param_file {
            self.axl.load_para_all(param_file)?;
            info!("robot: loaded motion parameters from {param_file}");
        }

        self.connected = true;
        info!(
            "robot: connected ({} boards, {} axes)",
            self.axl.board_count()?,
            self.axl.axis_count()?
        );
        Ok(())
    }

    async fn disconnect(&mut self) -> EolResult<()> {
        if self.connected {
            self.connected = false;
            self.axl.close()?;
        }
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected
    }

    async fn enable_servo(&mut self, axis: u32) -> EolResult<()> {
        self.require_connected()?;
        if self.axl.is_servo_on(axis)? {
            return Ok(());
        }
        self.axl.servo_on(axis, true)
    }

    async fn disable_servo(&mut self, axis: u32) -> EolResult<()> {
        self.require_connected()?;
        if !self.axl.is_servo_on(axis)? {
            return Ok(());
        }
        self.axl.servo_on(axis, false)
    }

    async fn home_axis(&mut self, axis: u32) -> EolResult<()> {
        self.require_connected()?;
        self.axl.home_set_start(axis)?;

        let deadline = Instant::now() + HOMING_TIMEOUT;
        loop {
            match self.axl.home_get_result(axis)? {
                HomeResult::Success => {
                    info!("robot: axis {axis} homed");
                    return Ok(());
                }
                HomeResult::Searching => {
                    if Instant::now() >= deadline {
                        return Err(EolError::operation(
                            "robot",
                            "home_axis",
                            format!("homing did not complete within {HOMING_TIMEOUT:?}"),
                        ));
                    }
                    sleep(HOMING_POLL).await;
                }
                HomeResult::Error(code) => {
                    return Err(EolError::operation(
                        "robot",
                        "home_axis",
                        format!("home search failed with result 0x{code:02X}"),
                    ));
                }
            }
        }
    }

    async fn move_absolute(
        &mut self,
        position: f64,
        axis: u32,
        motion: &MotionParams,
    ) -> EolResult<()> {
        self.require_connected()?;
        self.axl.move_start_pos(
            axis,
            position,
            motion.velocity,
            motion.acceleration,
            motion.deceleration,
        )?;
        self.wait_motion_complete(axis).await
    }

    async fn get_position(&mut self, axis: u32) -> EolResult<f64> {
        self.require_connected()?;
        self.axl.get_act_pos(axis)
    }

    async fn stop_motion(&mut self, axis: u32) {
        if let Err(e) = self.axl.move_smooth_stop(axis) {
            warn!("robot: smooth stop failed: {e}");
        }
    }

    async fn emergency_stop(&mut self, axis: u32) -> EolResult<()> {
        // Issued regardless of servo or connection state.
        self.axl.move_emergency_stop(axis)
    }

    async fn get_status(&mut self) -> RobotStatus {
        let axis = self.config.axis_id;
        let position = self.axl.get_act_pos(axis).unwrap_or(f64::NAN);
        let moving = self.axl.read_in_motion(axis).unwrap_or(false);
        RobotStatus {
            connected: self.connected,
            positions: vec![position],
            moving,
        }
    }
}
