//! LMA MCU hardware backend.
//!
//! Every command except request-temp expects a specific ACK status frame.
//! The backend clears its frame buffer, sends the command, then pumps
//! incoming frames until the expected ACK or the deadline; unrelated status
//! frames update cached state but never satisfy the ACK. Timeouts retry up
//! to the configured attempt count.

use crate::capability::{Mcu, TestMode};
use crate::codec::mcu::{FrameBuffer, Frame, cmd, encode, encode_temperature, status};
use crate::transport::serial::{SerialSettings, SerialTransport};
use async_trait::async_trait;
use eol_common::error::{EolError, EolResult};
use eol_common::hw_config::McuConfig;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

/// Soft boot-complete wait on first connect.
const BOOT_COMPLETE_TIMEOUT: Duration = Duration::from_secs(60);
/// Transport poll slice while pumping frames.
const READ_POLL: Duration = Duration::from_millis(50);
/// Bytes pulled from the transport per poll.
const READ_CHUNK: usize = 64;
/// Pause between ACK retry attempts.
const RETRY_DELAY: Duration = Duration::from_millis(100);

/// LMA MCU over the framed serial protocol.
pub struct LmaMcu {
    config: McuConfig,
    transport: Option<SerialTransport>,
    buffer: FrameBuffer,
    retry_attempts: u32,
    ack_timeout: Duration,
    boot_seen: bool,
    current_status: Option<u8>,
    current_temperature: Option<f64>,
    standby_setpoint: Option<f64>,
}

impl LmaMcu {
    /// Create a backend for the given port with execution parameters from
    /// the test configuration.
    pub fn new(config: McuConfig, retry_attempts: u32, ack_timeout: Duration) -> Self {
        Self {
            config,
            transport: None,
            buffer: FrameBuffer::new(),
            retry_attempts: retry_attempts.max(1),
            ack_timeout,
            boot_seen: false,
            current_status: None,
            current_temperature: None,
            standby_setpoint: None,
        }
    }

    /// Last status code received from the controller.
    pub fn current_status(&self) -> Option<u8> {
        self.current_status
    }

    /// Last temperature reported by the controller [°C].
    pub fn current_temperature(&self) -> Option<f64> {
        self.current_temperature
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

    fn note_frame(&mut self, frame: &Frame) {
        self.current_status = Some(frame.command);
        debug!(
            "mcu: status 0x{:02X} ({})",
            frame.command,
            status::describe(frame.command)
        );
        match frame.command {
            status::BOOT_COMPLETE => {
                self.boot_seen = true;
            }
            status::TEMP_RESPONSE => {
                if let Some(celsius) = frame.temperature() {
                    self.current_temperature = Some(celsius);
                }
            }
            _ => {}
        }
    }

    /// Pump incoming frames until `accept` matches or `deadline` elapses.
    ///
    /// Every received frame updates cached state regardless of whether it is
    /// the one being waited on.
    async fn await_frame<F>(
        &mut self,
        operation: &'static str,
        deadline: Duration,
        mut accept: F,
    ) -> EolResult<Frame>
    where
        F: FnMut(&Frame) -> bool,
    {
        let end = Instant::now() + deadline;
        loop {
            while let Some(frame) = self.buffer.next_frame() {
                self.note_frame(&frame);
                if accept(&frame) {
                    return Ok(frame);
                }
                debug!(
                    "mcu: unrelated status 0x{:02X} while waiting for {operation}",
                    frame.command
                );
            }

            let now = Instant::now();
            if now >= end {
                return Err(EolError::timeout("mcu", operation, deadline));
            }

            let slice = READ_POLL.min(end - now);
            let chunk = {
                let transport = self
                    .transport
                    .as_mut()
                    .ok_or_else(|| EolError::connection("mcu", "not connected"))?;
                match transport.read(READ_CHUNK, slice).await {
                    Ok(bytes) => Some(bytes),
                    Err(EolError::Timeout { .. }) => None,
                    Err(e) => return Err(e),
                }
            };
            if let Some(bytes) = chunk {
                if !bytes.is_empty() {
                    self.buffer.push(&bytes);
                }
            }
        }
    }

    /// Send a command and wait for its specific ACK status, retrying on
    /// timeout.
    async fn send_and_expect_ack(
        &mut self,
        operation: &'static str,
        command: u8,
        fields: &[u32],
        expected_ack: u8,
    ) -> EolResult<()> {
        let frame_bytes = encode(command, fields)?;

        for attempt in 1..=self.retry_attempts {
            self.buffer.clear();
            {
                let transport = self
                    .transport
                    .as_mut()
                    .ok_or_else(|| EolError::connection("mcu", "not connected"))?;
                transport.flush_input()?;
                transport.write(&frame_bytes).await?;
            }

            match self
                .await_frame(operation, self.ack_timeout, |f| f.command == expected_ack)
                .await
            {
                Ok(_) => {
                    debug!(
                        "mcu: command 0x{command:02X} acknowledged with 0x{expected_ack:02X}"
                    );
                    return Ok(());
                }
                Err(EolError::Timeout { .. }) => {
                    warn!(
                        "mcu: no ACK 0x{expected_ack:02X} for command 0x{command:02X} \
                         (attempt {attempt}/{})",
                        self.retry_attempts
                    );
                    if attempt < self.retry_attempts {
                        sleep(RETRY_DELAY).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(EolError::operation(
            "mcu",
            operation,
            format!(
                "expected ACK 0x{expected_ack:02X} not received after {} attempts",
                self.retry_attempts
            ),
        ))
    }
}

#[async_trait]
impl Mcu for LmaMcu {
    async fn connect(&mut self) -> EolResult<()> {
        if self.transport.is_some() {
            self.disconnect().await?;
        }

        let transport = SerialTransport::connect("mcu", &self.settings()).await?;
        self.transport = Some(transport);
        self.buffer.clear();

        // Boot-complete is advisory on connect: log, never fail.
        match self.wait_boot_complete(BOOT_COMPLETE_TIMEOUT).await {
            Ok(()) => info!("mcu: boot complete"),
            Err(e) => warn!("mcu: boot-complete not observed on connect: {e}"),
        }

        Ok(())
    }

    async fn disconnect(&mut self) -> EolResult<()> {
        if let Some(mut transport) = self.transport.take() {
            transport.disconnect().await;
        }
        self.buffer.clear();
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    async fn wait_boot_complete(&mut self, deadline: Duration) -> EolResult<()> {
        if self.boot_seen {
            return Ok(());
        }
        self.await_frame("wait_boot_complete", deadline, |f| {
            f.command == status::BOOT_COMPLETE
        })
        .await
        .map(|_| ())
    }

    async fn set_test_mode(&mut self, mode: TestMode) -> EolResult<()> {
        self.send_and_expect_ack(
            "set_test_mode",
            cmd::ENTER_TEST_MODE,
            &[mode.wire_value()],
            status::TEST_MODE_OK,
        )
        .await
    }

    async fn set_upper_temperature(&mut self, celsius: f64) -> EolResult<()> {
        self.send_and_expect_ack(
            "set_upper_temperature",
            cmd::SET_UPPER_TEMP,
            &[encode_temperature(celsius)],
            status::UPPER_TEMP_OK,
        )
        .await
    }

    async fn set_fan_speed(&mut self, level: u8) -> EolResult<()> {
        self.send_and_expect_ack(
            "set_fan_speed",
            cmd::SET_FAN_SPEED,
            &[u32::from(level)],
            status::FAN_SPEED_OK,
        )
        .await
    }

    async fn set_operating_temperature(&mut self, celsius: f64) -> EolResult<()> {
        self.send_and_expect_ack(
            "set_operating_temperature",
            cmd::SET_OPERATING_TEMP,
            &[encode_temperature(celsius)],
            status::OPERATING_TEMP_OK,
        )
        .await
    }

    async fn set_cooling_temperature(&mut self, celsius: f64) -> EolResult<()> {
        self.send_and_expect_ack(
            "set_cooling_temperature",
            cmd::SET_COOLING_TEMP,
            &[encode_temperature(celsius)],
            status::COOLING_TEMP_OK,
        )
        .await
    }

    async fn start_standby_heating(&mut self, operating: f64, standby: f64) -> EolResult<()> {
        self.send_and_expect_ack(
            "start_standby_heating",
            cmd::INIT,
            &[encode_temperature(operating), encode_temperature(standby), 0],
            status::INIT_OK,
        )
        .await?;
        self.standby_setpoint = Some(standby);
        Ok(())
    }

    async fn start_standby_cooling(&mut self) -> EolResult<()> {
        let standby = self.standby_setpoint.ok_or_else(|| {
            EolError::operation(
                "mcu",
                "start_standby_cooling",
                "no standby setpoint from a prior standby heating init",
            )
        })?;
        self.send_and_expect_ack(
            "start_standby_cooling",
            cmd::SET_COOLING_TEMP,
            &[encode_temperature(standby)],
            status::COOLING_TEMP_OK,
        )
        .await
    }

    async fn get_temperature(&mut self) -> EolResult<f64> {
        let request = encode(cmd::REQUEST_TEMP, &[])?;

        for attempt in 1..=self.retry_attempts {
            self.buffer.clear();
            {
                let transport = self
                    .transport
                    .as_mut()
                    .ok_or_else(|| EolError::connection("mcu", "not connected"))?;
                transport.flush_input()?;
                transport.write(&request).await?;
            }

            match self
                .await_frame("get_temperature", self.ack_timeout, |f| {
                    f.command == status::TEMP_RESPONSE
                })
                .await
            {
                Ok(frame) => {
                    return frame.temperature().ok_or_else(|| {
                        EolError::protocol("mcu", "temperature response with empty payload")
                    });
                }
                Err(EolError::Timeout { .. }) => {
                    warn!(
                        "mcu: no temperature response (attempt {attempt}/{})",
                        self.retry_attempts
                    );
                    if attempt < self.retry_attempts {
                        sleep(RETRY_DELAY).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(EolError::operation(
            "mcu",
            "get_temperature",
            format!("no temperature response after {} attempts", self.retry_attempts),
        ))
    }

    async fn notify_stroke_init_complete(&mut self) -> EolResult<()> {
        self.send_and_expect_ack(
            "notify_stroke_init_complete",
            cmd::STROKE_INIT_COMPLETE,
            &[],
            status::STROKE_INIT_OK,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> LmaMcu {
        LmaMcu::new(McuConfig::default(), 3, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn operations_without_connection_fail() {
        let mut mcu = backend();
        assert!(!mcu.is_connected().await);
        assert!(matches!(
            mcu.set_test_mode(TestMode::Mode1).await,
            Err(EolError::Connection { device: "mcu", .. })
        ));
        assert!(matches!(
            mcu.get_temperature().await,
            Err(EolError::Connection { .. })
        ));
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let mut mcu = backend();
        mcu.disconnect().await.expect("first");
        mcu.disconnect().await.expect("second");
    }

    #[tokio::test]
    async fn standby_cooling_requires_prior_init() {
        let mut mcu = backend();
        let result = mcu.start_standby_cooling().await;
        assert!(matches!(
            result,
            Err(EolError::Operation {
                device: "mcu",
                operation: "start_standby_cooling",
                ..
            })
        ));
    }

    #[test]
    fn retry_attempts_clamped_to_at_least_one() {
        let mcu = LmaMcu::new(McuConfig::default(), 0, Duration::from_secs(1));
        assert_eq!(mcu.retry_attempts, 1);
    }

    #[test]
    fn hardware_backend_is_not_a_simulator() {
        let mcu = backend();
        assert!(!mcu.is_simulator());
    }
}
