//! ODA power supply hardware backend (SCPI over TCP).

use crate::capability::{Power, PowerMeasurements};
use crate::transport::scpi::ScpiClient;
use async_trait::async_trait;
use eol_common::error::{EolError, EolResult};
use eol_common::hw_config::PowerConfig;
use std::time::Duration;
use tracing::{debug, warn};

/// ODA EX-series supply speaking line-terminated SCPI.
pub struct OdaPower {
    config: PowerConfig,
    client: Option<ScpiClient>,
    output_enabled: bool,
}

impl OdaPower {
    /// Create a backend for the configured endpoint.
    pub fn new(config: PowerConfig) -> Self {
        Self {
            config,
            client: None,
            output_enabled: false,
        }
    }

    fn client_mut(&mut self) -> EolResult<&mut ScpiClient> {
        self.client
            .as_mut()
            .ok_or_else(|| EolError::connection("power", "not connected"))
    }

    fn parse_float(reply: &str, what: &str) -> EolResult<f64> {
        reply.trim().parse::<f64>().map_err(|_| {
            EolError::protocol("power", format!("unparseable {what} reply: '{reply}'"))
        })
    }

    async fn measurements_fallback(&mut self) -> EolResult<PowerMeasurements> {
        let voltage = self.get_voltage().await?;
        let current = self.get_current().await?;
        Ok(PowerMeasurements {
            voltage,
            current,
            power: voltage * current,
        })
    }
}

#[async_trait]
impl Power for OdaPower {
    async fn connect(&mut self) -> EolResult<()> {
        let client = ScpiClient::connect(
            "power",
            &self.config.host,
            self.config.port,
            Duration::from_secs_f64(self.config.timeout),
        )
        .await?;
        debug!("power: connected to {}:{}", self.config.host, self.config.port);
        self.client = Some(client);
        self.output_enabled = false;
        Ok(())
    }

    async fn disconnect(&mut self) -> EolResult<()> {
        if let Some(mut client) = self.client.take() {
            client.disconnect().await;
        }
        self.output_enabled = false;
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.client.as_ref().is_some_and(|c| c.is_connected())
    }

    async fn set_voltage(&mut self, volts: f64) -> EolResult<()> {
        self.client_mut()?
            .send_command(&format!("VOLT {volts:.2}"))
            .await
    }

    async fn set_current(&mut self, amps: f64) -> EolResult<()> {
        self.client_mut()?
            .send_command(&format!("CURR {amps:.2}"))
            .await
    }

    async fn set_current_limit(&mut self, amps: f64) -> EolResult<()> {
        self.client_mut()?
            .send_command(&format!("CURR {amps:.2}"))
            .await
    }

    async fn get_voltage(&mut self) -> EolResult<f64> {
        let reply = self.client_mut()?.query("MEAS:VOLT?").await?;
        Self::parse_float(&reply, "voltage")
    }

    async fn get_current(&mut self) -> EolResult<f64> {
        let reply = self.client_mut()?.query("MEAS:CURR?").await?;
        Self::parse_float(&reply, "current")
    }

    async fn get_current_limit(&mut self) -> EolResult<f64> {
        let reply = self.client_mut()?.query("CURR:UCL?").await?;
        Self::parse_float(&reply, "current limit")
    }

    async fn get_all_measurements(&mut self) -> EolResult<PowerMeasurements> {
        let reply = self.client_mut()?.query("MEAS:ALL?").await?;

        let values: Vec<&str> = reply.split(',').map(str::trim).collect();
        if values.len() != 2 {
            warn!("power: unexpected MEAS:ALL? reply '{reply}', using individual queries");
            return self.measurements_fallback().await;
        }

        match (values[0].parse::<f64>(), values[1].parse::<f64>()) {
            (Ok(voltage), Ok(current)) => Ok(PowerMeasurements {
                voltage,
                current,
                power: voltage * current,
            }),
            _ => {
                warn!("power: unparseable MEAS:ALL? reply '{reply}', using individual queries");
                self.measurements_fallback().await
            }
        }
    }

    async fn enable_output(&mut self) -> EolResult<()> {
        self.client_mut()?.send_command("OUTP ON").await?;
        self.output_enabled = true;
        Ok(())
    }

    async fn disable_output(&mut self) -> EolResult<()> {
        self.client_mut()?.send_command("OUTP OFF").await?;
        self.output_enabled = false;
        Ok(())
    }

    fn is_output_enabled(&self) -> bool {
        self.output_enabled
    }

    fn device_identity(&self) -> Option<String> {
        self.client
            .as_ref()
            .and_then(|c| c.identity().map(str::to_string))
    }
}
