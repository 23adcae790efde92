//! Async serial transport.
//!
//! Thin ownership layer over `tokio-serial`: open/close with configured line
//! settings, flushing writes, deadline-bounded reads. All operations are
//! cancellable at their awaits.

use eol_common::error::{EolError, EolResult};
use eol_common::hw_config::Parity;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::debug;

/// Line settings for one serial connection.
#[derive(Debug, Clone)]
pub struct SerialSettings {
    /// Serial port path.
    pub port: String,
    /// Baud rate.
    pub baud: u32,
    /// Data bits (5..=8).
    pub data_bits: u8,
    /// Stop bits (1 or 2).
    pub stop_bits: u8,
    /// Parity.
    pub parity: Parity,
    /// Default read deadline.
    pub timeout: Duration,
}

fn map_data_bits(bits: u8) -> EolResult<tokio_serial::DataBits> {
    match bits {
        5 => Ok(tokio_serial::DataBits::Five),
        6 => Ok(tokio_serial::DataBits::Six),
        7 => Ok(tokio_serial::DataBits::Seven),
        8 => Ok(tokio_serial::DataBits::Eight),
        other => Err(EolError::Config(
            eol_common::config::ConfigError::Validation(format!(
                "unsupported data bits: {other}"
            )),
        )),
    }
}

fn map_stop_bits(bits: u8) -> EolResult<tokio_serial::StopBits> {
    match bits {
        1 => Ok(tokio_serial::StopBits::One),
        2 => Ok(tokio_serial::StopBits::Two),
        other => Err(EolError::Config(
            eol_common::config::ConfigError::Validation(format!(
                "unsupported stop bits: {other}"
            )),
        )),
    }
}

fn map_parity(parity: Parity) -> tokio_serial::Parity {
    match parity {
        Parity::None => tokio_serial::Parity::None,
        Parity::Even => tokio_serial::Parity::Even,
        Parity::Odd => tokio_serial::Parity::Odd,
    }
}

/// One open serial connection.
#[derive(Debug)]
pub struct SerialTransport {
    stream: Option<SerialStream>,
    device: &'static str,
    port: String,
}

impl SerialTransport {
    /// Open the port with the given line settings.
    ///
    /// # Errors
    ///
    /// `EolError::Connection` if the port cannot be opened;
    /// `EolError::Config` for unrepresentable line settings.
    pub async fn connect(device: &'static str, settings: &SerialSettings) -> EolResult<Self> {
        let builder = tokio_serial::new(&settings.port, settings.baud)
            .data_bits(map_data_bits(settings.data_bits)?)
            .stop_bits(map_stop_bits(settings.stop_bits)?)
            .parity(map_parity(settings.parity))
            .timeout(settings.timeout);

        let stream = builder
            .open_native_async()
            .map_err(|e| EolError::connection(device, format!("open {}: {e}", settings.port)))?;

        debug!(
            "opened serial port {} for {device} at {} baud",
            settings.port, settings.baud
        );

        Ok(Self {
            stream: Some(stream),
            device,
            port: settings.port.clone(),
        })
    }

    /// Close the connection. Idempotent.
    pub async fn disconnect(&mut self) {
        if self.stream.take().is_some() {
            debug!("closed serial port {} for {}", self.port, self.device);
        }
    }

    /// Whether the port is open.
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn stream_mut(&mut self) -> EolResult<&mut SerialStream> {
        let device = self.device;
        self.stream
            .as_mut()
            .ok_or_else(|| EolError::connection(device, "serial port not open"))
    }

    /// Write bytes; flushed to the wire before returning.
    pub async fn write(&mut self, bytes: &[u8]) -> EolResult<()> {
        let device = self.device;
        let stream = self.stream_mut()?;
        stream
            .write_all(bytes)
            .await
            .map_err(|e| EolError::connection(device, format!("write: {e}")))?;
        stream
            .flush()
            .await
            .map_err(|e| EolError::connection(device, format!("flush: {e}")))?;
        Ok(())
    }

    /// Read up to `max` bytes within `deadline`.
    ///
    /// # Errors
    ///
    /// `EolError::Timeout` if nothing arrives before the deadline.
    pub async fn read(&mut self, max: usize, deadline: Duration) -> EolResult<Vec<u8>> {
        let device = self.device;
        let stream = self.stream_mut()?;
        let mut buf = vec![0u8; max];

        let n = timeout(deadline, stream.read(&mut buf))
            .await
            .map_err(|_| EolError::timeout(device, "read", deadline))?
            .map_err(|e| EolError::connection(device, format!("read: {e}")))?;

        buf.truncate(n);
        Ok(buf)
    }

    /// Read until `separator` (inclusive) within `deadline`.
    pub async fn read_until(&mut self, separator: u8, deadline: Duration) -> EolResult<Vec<u8>> {
        let device = self.device;
        let stream = self.stream_mut()?;

        let collect = async {
            let mut out = Vec::new();
            let mut byte = [0u8; 1];
            loop {
                let n = stream
                    .read(&mut byte)
                    .await
                    .map_err(|e| EolError::connection(device, format!("read: {e}")))?;
                if n == 0 {
                    return Err(EolError::connection(device, "serial stream closed"));
                }
                out.push(byte[0]);
                if byte[0] == separator {
                    return Ok(out);
                }
            }
        };

        timeout(deadline, collect)
            .await
            .map_err(|_| EolError::timeout(device, "read_until", deadline))?
    }

    /// Discard any buffered input.
    pub fn flush_input(&mut self) -> EolResult<()> {
        let device = self.device;
        let stream = self.stream_mut()?;
        stream
            .clear(ClearBuffer::Input)
            .map_err(|e| EolError::connection(device, format!("clear input: {e}")))
    }
}
