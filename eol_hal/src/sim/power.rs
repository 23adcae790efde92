//! Simulated programmable DC power supply.

use crate::capability::{Power, PowerMeasurements};
use async_trait::async_trait;
use eol_common::error::{EolError, EolResult};

/// Simulated power backend caching its setpoints.
#[derive(Debug, Default)]
pub struct SimPower {
    connected: bool,
    voltage: f64,
    current: f64,
    current_limit: f64,
    output_enabled: bool,
}

impl SimPower {
    /// Create a powered-down simulator.
    pub fn new() -> Self {
        Self::default()
    }

    fn require_connected(&self) -> EolResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(EolError::connection("power", "not connected"))
        }
    }
}

#[async_trait]
impl Power for SimPower {
    async fn connect(&mut self) -> EolResult<()> {
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> EolResult<()> {
        self.connected = false;
        self.output_enabled = false;
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected
    }

    async fn set_voltage(&mut self, volts: f64) -> EolResult<()> {
        self.require_connected()?;
        if !volts.is_finite() || volts < 0.0 {
            return Err(EolError::operation(
                "power",
                "set_voltage",
                format!("invalid voltage {volts}"),
            ));
        }
        self.voltage = volts;
        Ok(())
    }

    async fn set_current(&mut self, amps: f64) -> EolResult<()> {
        self.require_connected()?;
        if !amps.is_finite() || amps < 0.0 {
            return Err(EolError::operation(
                "power",
                "set_current",
                format!("invalid current {amps}"),
            ));
        }
        self.current = amps;
        Ok(())
    }

    async fn set_current_limit(&mut self, amps: f64) -> EolResult<()> {
        self.require_connected()?;
        if !amps.is_finite() || amps < 0.0 {
            return Err(EolError::operation(
                "power",
                "set_current_limit",
                format!("invalid current limit {amps}"),
            ));
        }
        self.current_limit = amps;
        Ok(())
    }

    async fn get_voltage(&mut self) -> EolResult<f64> {
        self.require_connected()?;
        Ok(if self.output_enabled { self.voltage } else { 0.0 })
    }

    async fn get_current(&mut self) -> EolResult<f64> {
        self.require_connected()?;
        Ok(if self.output_enabled { self.current } else { 0.0 })
    }

    async fn get_current_limit(&mut self) -> EolResult<f64> {
        self.require_connected()?;
        Ok(self.current_limit)
    }

    async fn get_all_measurements(&mut self) -> EolResult<PowerMeasurements> {
        let voltage = self.get_voltage().await?;
        let current = self.get_current().await?;
        Ok(PowerMeasurements {
            voltage,
            current,
            power: voltage * current,
        })
    }

    async fn enable_output(&mut self) -> EolResult<()> {
        self.require_connected()?;
        self.output_enabled = true;
        Ok(())
    }

    async fn disable_output(&mut self) -> EolResult<()> {
        self.require_connected()?;
        self.output_enabled = false;
        Ok(())
    }

    fn is_output_enabled(&self) -> bool {
        self.output_enabled
    }

    fn device_identity(&self) -> Option<String> {
        Some("SIM,POWER,1.0".to_string())
    }
}
