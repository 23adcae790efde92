//! Simulated DUT heating/cooling MCU.
//!
//! Temperature converges asymptotically: each `get_temperature` call moves
//! the model 10 % of the remaining distance toward the last target and
//! superimposes a little uniform noise. The noise source is seeded, so runs
//! are reproducible.

use crate::capability::{Mcu, TestMode};
use async_trait::async_trait;
use eol_common::error::{EolError, EolResult};
use eol_common::test_config::{FAN_SPEED_MAX, FAN_SPEED_MIN};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

const AMBIENT: f64 = 25.0;
const CONVERGENCE_STEP: f64 = 0.1;
const NOISE_AMPLITUDE: f64 = 0.2;

/// Simulated MCU backend.
#[derive(Debug)]
pub struct SimMcu {
    connected: bool,
    current_temperature: f64,
    target_temperature: f64,
    standby_setpoint: Option<f64>,
    test_mode: Option<TestMode>,
    fan_speed: u8,
    upper_temperature: f64,
    report_simulator: bool,
    fixed_temperature: Option<f64>,
    rng: StdRng,
}

impl Default for SimMcu {
    fn default() -> Self {
        Self::new()
    }
}

impl SimMcu {
    /// Create a simulator resting at ambient temperature.
    pub fn new() -> Self {
        Self {
            connected: false,
            current_temperature: AMBIENT,
            target_temperature: AMBIENT,
            standby_setpoint: None,
            test_mode: None,
            fan_speed: FAN_SPEED_MAX,
            upper_temperature: 80.0,
            report_simulator: true,
            fixed_temperature: None,
            rng: StdRng::seed_from_u64(0x0e01),
        }
    }

    /// Pin `get_temperature` to a fixed reading (test fixture).
    pub fn with_fixed_temperature(mut self, celsius: f64) -> Self {
        self.fixed_temperature = Some(celsius);
        self
    }

    /// Make the backend deny simulator identity so temperature verification
    /// runs for real (test fixture).
    pub fn with_hardware_identity(mut self) -> Self {
        self.report_simulator = false;
        self
    }

    /// Last commanded target temperature.
    pub fn target_temperature(&self) -> f64 {
        self.target_temperature
    }

    fn require_connected(&self) -> EolResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(EolError::connection("mcu", "not connected"))
        }
    }
}

#[async_trait]
impl Mcu for SimMcu {
    async fn connect(&mut self) -> EolResult<()> {
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> EolResult<()> {
        self.connected = false;
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected
    }

    async fn wait_boot_complete(&mut self, _deadline: Duration) -> EolResult<()> {
        // The simulated controller is booted the instant it connects.
        self.require_connected()
    }

    async fn set_test_mode(&mut self, mode: TestMode) -> EolResult<()> {
        self.require_connected()?;
        self.test_mode = Some(mode);
        Ok(())
    }

    async fn set_upper_temperature(&mut self, celsius: f64) -> EolResult<()> {
        self.require_connected()?;
        if !celsius.is_finite() {
            return Err(EolError::operation(
                "mcu",
                "set_upper_temperature",
                format!("non-finite temperature {celsius}"),
            ));
        }
        self.upper_temperature = celsius;
        Ok(())
    }

    async fn set_fan_speed(&mut self, level: u8) -> EolResult<()> {
        self.require_connected()?;
        if !(FAN_SPEED_MIN..=FAN_SPEED_MAX).contains(&level) {
            return Err(EolError::operation(
                "mcu",
                "set_fan_speed",
                format!("fan speed {level} out of range {FAN_SPEED_MIN}..={FAN_SPEED_MAX}"),
            ));
        }
        self.fan_speed = level;
        Ok(())
    }

    async fn set_operating_temperature(&mut self, celsius: f64) -> EolResult<()> {
        self.require_connected()?;
        self.target_temperature = celsius;
        Ok(())
    }

    async fn set_cooling_temperature(&mut self, celsius: f64) -> EolResult<()> {
        self.require_connected()?;
        self.target_temperature = celsius;
        Ok(())
    }

    async fn start_standby_heating(&mut self, operating: f64, standby: f64) -> EolResult<()> {
        self.require_connected()?;
        self.target_temperature = operating;
        self.standby_setpoint = Some(standby);
        Ok(())
    }

    async fn start_standby_cooling(&mut self) -> EolResult<()> {
        self.require_connected()?;
        let standby = self.standby_setpoint.ok_or_else(|| {
            EolError::operation(
                "mcu",
                "start_standby_cooling",
                "no standby setpoint from a prior standby heating init",
            )
        })?;
        self.target_temperature = standby;
        Ok(())
    }

    async fn get_temperature(&mut self) -> EolResult<f64> {
        self.require_connected()?;
        if let Some(fixed) = self.fixed_temperature {
            return Ok(fixed);
        }

        self.current_temperature +=
            CONVERGENCE_STEP * (self.target_temperature - self.current_temperature);
        let noise = self.rng.random_range(-NOISE_AMPLITUDE..=NOISE_AMPLITUDE);
        Ok(self.current_temperature + noise)
    }

    async fn notify_stroke_init_complete(&mut self) -> EolResult<()> {
        self.require_connected()
    }

    fn is_simulator(&self) -> bool {
        self.report_simulator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn temperature_converges_toward_target() {
        let mut mcu = SimMcu::new();
        mcu.connect().await.expect("connect");
        mcu.set_operating_temperature(66.0).await.expect("set");

        let mut last_distance = f64::MAX;
        for _ in 0..60 {
            let reading = mcu.get_temperature().await.expect("read");
            let distance = (66.0 - reading).abs();
            assert!(distance <= last_distance + 2.0 * NOISE_AMPLITUDE);
            last_distance = distance;
        }
        assert!(last_distance < 1.0);
    }

    #[tokio::test]
    async fn fixed_temperature_fixture_never_moves() {
        let mut mcu = SimMcu::new().with_fixed_temperature(20.0);
        mcu.connect().await.expect("connect");
        mcu.set_operating_temperature(66.0).await.expect("set");
        for _ in 0..5 {
            assert_eq!(mcu.get_temperature().await.expect("read"), 20.0);
        }
    }

    #[tokio::test]
    async fn standby_cooling_requires_prior_heating() {
        let mut mcu = SimMcu::new();
        mcu.connect().await.expect("connect");
        assert!(mcu.start_standby_cooling().await.is_err());

        mcu.start_standby_heating(52.0, 38.0).await.expect("heat");
        mcu.start_standby_cooling().await.expect("cool");
        assert_eq!(mcu.target_temperature(), 38.0);
    }

    #[tokio::test]
    async fn fan_speed_out_of_range_rejected() {
        let mut mcu = SimMcu::new();
        mcu.connect().await.expect("connect");
        assert!(mcu.set_fan_speed(0).await.is_err());
        assert!(mcu.set_fan_speed(11).await.is_err());
        mcu.set_fan_speed(10).await.expect("valid");
    }

    #[test]
    fn simulator_identity_flag() {
        let sim = SimMcu::new();
        assert!(sim.is_simulator());
        let hardware_like = SimMcu::new().with_hardware_identity();
        assert!(!hardware_like.is_simulator());
    }
}
