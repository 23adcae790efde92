//! BS205 loadcell hardware backend.
//!
//! Commands on the shared RS-485 bus are serialized through a mutex and
//! paced to at least 200 ms apart; the indicator drops back-to-back
//! requests. Responses are a fixed 10-byte frame plus whatever trailing
//! bytes the converter emits, so reads drain greedily after the first
//! chunk.

use crate::capability::Loadcell;
use crate::codec::loadcell::{
    Command, RESPONSE_LEN, encode_request, normalize_response, parse_weight, select_peak,
};
use crate::transport::serial::{SerialSettings, SerialTransport};
use async_trait::async_trait;
use eol_common::error::{EolError, EolResult};
use eol_common::hw_config::LoadcellConfig;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::{debug, error};

/// Minimum interval between commands on the same connection.
const MIN_COMMAND_INTERVAL: Duration = Duration::from_millis(200);
/// Settle between a write and the first read.
const POST_WRITE_SETTLE: Duration = Duration::from_millis(150);
/// Deadline for a command response.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(3);
/// Deadline for each greedy drain read.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(100);
/// Settle after a zero calibration.
const ZERO_SETTLE: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct Link {
    transport: Option<SerialTransport>,
    last_command: Option<Instant>,
}

/// BS205 indicator over the framed serial protocol.
pub struct Bs205Loadcell {
    config: LoadcellConfig,
    link: Mutex<Link>,
}

impl Bs205Loadcell {
    /// Create a backend for the configured port.
    pub fn new(config: LoadcellConfig) -> Self {
        Self {
            config,
            link: Mutex::new(Link {
                transport: None,
                last_command: None,
            }),
        }
    }

    fn settings(&self) -> SerialSettings {
        SerialSettings {
            port: self.config.port.clone(),
            baud: self.config.baudrate,
            data_bits: self.config.bytesize,
            stop_bits: self.config.stopbits,
            parity: self.config.parity,
            timeout: Duration::from_secs_f64(self.config.timeout),
        }
    }

    /// Send one command under the link mutex, enforcing pacing.
    ///
    /// Returns the normalized response text for Read, `None` for
    /// fire-and-forget commands (hold, release, zero).
    async fn send_command(&self, command: Command) -> EolResult<Option<String>> {
        let mut link = self.link.lock().await;
        let link = &mut *link;
        let transport = link
            .transport
            .as_mut()
            .ok_or_else(|| EolError::connection("loadcell", "not connected"))?;

        if let Some(last) = link.last_command {
            let elapsed = last.elapsed();
            if elapsed < MIN_COMMAND_INTERVAL {
                sleep(MIN_COMMAND_INTERVAL - elapsed).await;
            }
        }

        let request = encode_request(self.config.indicator_id, command);
        debug!("loadcell <- {:02X?}", request);
        transport.write(&request).await?;
        link.last_command = Some(Instant::now());

        sleep(POST_WRITE_SETTLE).await;

        if !matches!(command, Command::Read) {
            return Ok(None);
        }

        let mut response = transport.read(RESPONSE_LEN, COMMAND_TIMEOUT).await?;
        // Drain trailing bytes in short bursts; a timeout here just means
        // the line went quiet.
        loop {
            match transport.read(1024, DRAIN_TIMEOUT).await {
                Ok(bytes) if !bytes.is_empty() => response.extend_from_slice(&bytes),
                _ => break,
            }
        }

        debug!("loadcell -> {:02X?}", response);
        Ok(Some(normalize_response(&response)))
    }
}

#[async_trait]
impl Loadcell for Bs205Loadcell {
    async fn connect(&mut self) -> EolResult<()> {
        let mut link = self.link.lock().await;
        if let Some(mut old) = link.transport.take() {
            old.disconnect().await;
            sleep(Duration::from_millis(100)).await;
        }
        link.transport = Some(SerialTransport::connect("loadcell", &self.settings()).await?);
        link.last_command = None;
        Ok(())
    }

    async fn disconnect(&mut self) -> EolResult<()> {
        let mut link = self.link.lock().await;
        if let Some(mut transport) = link.transport.take() {
            transport.disconnect().await;
        }
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.link.lock().await.transport.is_some()
    }

    async fn read_force(&mut self) -> EolResult<f64> {
        let response = self
            .send_command(Command::Read)
            .await?
            .ok_or_else(|| EolError::protocol("loadcell", "no response to read command"))?;
        if response.is_empty() {
            return Err(EolError::protocol("loadcell", "empty response to read command"));
        }
        parse_weight(&response)
    }

    async fn read_peak_force(
        &mut self,
        duration_ms: u64,
        sample_interval_ms: u64,
    ) -> EolResult<f64> {
        let interval_ms = sample_interval_ms.max(MIN_COMMAND_INTERVAL.as_millis() as u64);
        let min_interval = Duration::from_millis(interval_ms);
        let max_samples = (duration_ms / interval_ms).max(1) as usize;

        let start = Instant::now();
        let end = start + Duration::from_millis(duration_ms);

        let mut samples: Vec<f64> = Vec::with_capacity(max_samples);
        let mut errors: u32 = 0;
        let mut last_error: Option<EolError> = None;

        while Instant::now() < end && samples.len() < max_samples {
            match self.read_force().await {
                Ok(force) => {
                    samples.push(force);
                    if samples.len() < max_samples {
                        sleep(min_interval).await;
                    }
                }
                Err(e) => {
                    errors += 1;
                    error!("loadcell: force sample failed ({errors}): {e}");
                    last_error = Some(e);
                }
            }
        }

        if samples.is_empty() {
            let mut reason = format!(
                "no valid force samples (attempts: {}, errors: {errors})",
                samples.len() as u32 + errors
            );
            if let Some(e) = last_error {
                reason.push_str(&format!(", last error: {e}"));
            }
            return Err(EolError::operation("loadcell", "read_peak_force", reason));
        }

        Ok(select_peak(&samples).expect("samples non-empty"))
    }

    async fn hold(&mut self) -> EolResult<()> {
        self.send_command(Command::Hold).await.map(|_| ())
    }

    async fn hold_release(&mut self) -> EolResult<()> {
        self.send_command(Command::Release).await.map(|_| ())
    }

    async fn zero_calibration(&mut self) -> EolResult<()> {
        self.send_command(Command::Zero).await?;
        sleep(ZERO_SETTLE).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn operations_without_connection_fail() {
        let mut loadcell = Bs205Loadcell::new(LoadcellConfig::default());
        assert!(!loadcell.is_connected().await);
        assert!(matches!(
            loadcell.read_force().await,
            Err(EolError::Connection { device: "loadcell", .. })
        ));
        assert!(loadcell.hold().await.is_err());
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let mut loadcell = Bs205Loadcell::new(LoadcellConfig::default());
        loadcell.disconnect().await.expect("first");
        loadcell.disconnect().await.expect("second");
    }

    #[test]
    fn sample_cap_arithmetic() {
        // duration 1000 ms at the 200 ms floor -> at most 5 samples.
        let min_interval = 200u64.max(MIN_COMMAND_INTERVAL.as_millis() as u64);
        let max_samples = (1000 / min_interval).max(1);
        assert_eq!(max_samples, 5);

        // A shorter requested interval is clamped up to the floor.
        let clamped = 50u64.max(MIN_COMMAND_INTERVAL.as_millis() as u64);
        assert_eq!(clamped, 200);
    }
}
