//! Simulated servo robot axis.

use super::SimWorld;
use crate::capability::{MotionParams, Robot, RobotStatus};
use async_trait::async_trait;
use eol_common::error::{EolError, EolResult};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::debug;

const DEFAULT_HOMING_CAP: Duration = Duration::from_secs(60);
const HOMING_POLL: Duration = Duration::from_millis(100);

/// How the simulated homing procedure behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomingBehavior {
    /// Homing completes on the first poll.
    Immediate,
    /// Homing reports Searching until the cap expires (test fixture).
    SearchForever,
}

/// Simulated robot: moves complete synchronously, position feeds the shared
/// world.
#[derive(Debug)]
pub struct SimRobot {
    world: SimWorld,
    connected: bool,
    servo_on: HashMap<u32, bool>,
    homed: bool,
    moving: bool,
    homing_behavior: HomingBehavior,
    homing_cap: Duration,
}

impl SimRobot {
    /// Create a simulator bound to `world`.
    pub fn new(world: SimWorld) -> Self {
        Self {
            world,
            connected: false,
            servo_on: HashMap::new(),
            homed: false,
            moving: false,
            homing_behavior: HomingBehavior::Immediate,
            homing_cap: DEFAULT_HOMING_CAP,
        }
    }

    /// Override the homing behavior (test fixture).
    pub fn with_homing_behavior(mut self, behavior: HomingBehavior) -> Self {
        self.homing_behavior = behavior;
        self
    }

    /// Override the homing wall-clock cap (test fixture).
    pub fn with_homing_cap(mut self, cap: Duration) -> Self {
        self.homing_cap = cap;
        self
    }

    /// Whether homing has completed.
    pub fn is_homed(&self) -> bool {
        self.homed
    }

    fn require_connected(&self) -> EolResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(EolError::connection("robot", "not connected"))
        }
    }

    fn servo_enabled(&self, axis: u32) -> bool {
        self.servo_on.get(&axis).copied().unwrap_or(false)
    }
}

#[async_trait]
impl Robot for SimRobot {
    async fn connect(&mut self) -> EolResult<()> {
        self.connected = true;
        debug!("sim robot connected");
        Ok(())
    }

    async fn disconnect(&mut self) -> EolResult<()> {
        self.connected = false;
        self.servo_on.clear();
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected
    }

    async fn enable_servo(&mut self, axis: u32) -> EolResult<()> {
        self.require_connected()?;
        self.servo_on.insert(axis, true);
        Ok(())
    }

    async fn disable_servo(&mut self, axis: u32) -> EolResult<()> {
        self.require_connected()?;
        self.servo_on.insert(axis, false);
        Ok(())
    }

    async fn home_axis(&mut self, axis: u32) -> EolResult<()> {
        self.require_connected()?;
        if !self.servo_enabled(axis) {
            return Err(EolError::operation(
                "robot",
                "home_axis",
                format!("servo off on axis {axis}"),
            ));
        }

        match self.homing_behavior {
            HomingBehavior::Immediate => {
                self.world.set_position(0.0);
                self.homed = true;
                Ok(())
            }
            HomingBehavior::SearchForever => {
                let deadline = Instant::now() + self.homing_cap;
                while Instant::now() < deadline {
                    sleep(HOMING_POLL).await;
                }
                Err(EolError::operation(
                    "robot",
                    "home_axis",
                    format!("homing did not complete within {:?}", self.homing_cap),
                ))
            }
        }
    }

    async fn move_absolute(
        &mut self,
        position: f64,
        axis: u32,
        _motion: &MotionParams,
    ) -> EolResult<()> {
        self.require_connected()?;
        if !self.servo_enabled(axis) {
            return Err(EolError::operation(
                "robot",
                "move_absolute",
                format!("servo off on axis {axis}"),
            ));
        }
        if !position.is_finite() {
            return Err(EolError::operation(
                "robot",
                "move_absolute",
                format!("non-finite target position {position}"),
            ));
        }

        // Simulated motion completes synchronously.
        self.world.set_position(position);
        self.moving = false;
        debug!("sim robot moved to {position}");
        Ok(())
    }

    async fn get_position(&mut self, _axis: u32) -> EolResult<f64> {
        self.require_connected()?;
        Ok(self.world.position())
    }

    async fn stop_motion(&mut self, _axis: u32) {
        self.moving = false;
    }

    async fn emergency_stop(&mut self, _axis: u32) -> EolResult<()> {
        // Must succeed even when the servo is off or disconnected.
        self.moving = false;
        Ok(())
    }

    async fn get_status(&mut self) -> RobotStatus {
        RobotStatus {
            connected: self.connected,
            positions: vec![self.world.position()],
            moving: self.moving,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn motion() -> MotionParams {
        MotionParams {
            velocity: 100_000.0,
            acceleration: 85_000.0,
            deceleration: 85_000.0,
        }
    }

    #[tokio::test]
    async fn move_updates_world_position() {
        let world = SimWorld::new();
        let mut robot = SimRobot::new(world.clone());
        robot.connect().await.expect("connect");
        robot.enable_servo(0).await.expect("servo");
        robot
            .move_absolute(170_000.0, 0, &motion())
            .await
            .expect("move");
        assert_eq!(world.position(), 170_000.0);
        assert_eq!(robot.get_position(0).await.expect("pos"), 170_000.0);
    }

    #[tokio::test]
    async fn enable_servo_is_idempotent() {
        let mut robot = SimRobot::new(SimWorld::new());
        robot.connect().await.expect("connect");
        robot.enable_servo(0).await.expect("first");
        robot.enable_servo(0).await.expect("second");
        assert!(robot.servo_enabled(0));
    }

    #[tokio::test]
    async fn move_with_servo_off_rejected() {
        let mut robot = SimRobot::new(SimWorld::new());
        robot.connect().await.expect("connect");
        let result = robot.move_absolute(1_000.0, 0, &motion()).await;
        assert!(matches!(result, Err(EolError::Operation { .. })));
    }

    #[tokio::test]
    async fn emergency_stop_succeeds_with_servo_off() {
        let mut robot = SimRobot::new(SimWorld::new());
        robot.connect().await.expect("connect");
        robot.emergency_stop(0).await.expect("estop");
    }

    #[tokio::test]
    async fn immediate_homing_homes_at_zero() {
        let world = SimWorld::new();
        world.set_position(5_000.0);
        let mut robot = SimRobot::new(world.clone());
        robot.connect().await.expect("connect");
        robot.enable_servo(0).await.expect("servo");
        robot.home_axis(0).await.expect("home");
        assert!(robot.is_homed());
        assert_eq!(world.position(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn search_forever_homing_fails_at_cap() {
        let mut robot = SimRobot::new(SimWorld::new())
            .with_homing_behavior(HomingBehavior::SearchForever)
            .with_homing_cap(Duration::from_secs(2));
        robot.connect().await.expect("connect");
        robot.enable_servo(0).await.expect("servo");

        let result = robot.home_axis(0).await;
        assert!(matches!(
            result,
            Err(EolError::Operation {
                device: "robot",
                operation: "home_axis",
                ..
            })
        ));
        assert!(!robot.is_homed());
    }

    #[tokio::test]
    async fn disconnected_robot_rejects_motion() {
        let mut robot = SimRobot::new(SimWorld::new());
        let result = robot.enable_servo(0).await;
        assert!(matches!(result, Err(EolError::Connection { .. })));
    }
}
