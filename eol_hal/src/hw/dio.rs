//! AXL digital I/O hardware backend.
//!
//! Reads prefer the library's batched byte/word/dword access when the range
//! is aligned and wide enough, falling back to per-bit reads on any error.

use crate::capability::DigitalIo;
use crate::driver::axl::AxlHandle;
use async_trait::async_trait;
use eol_common::error::{EolError, EolResult};
use eol_common::hw_config::DioConfig;
use tracing::{debug, info, warn};

/// Digital I/O modules over the AXL library.
pub struct AxlDio {
    config: DioConfig,
    axl: AxlHandle,
    connected: bool,
    input_count: u32,
    output_count: u32,
}

impl AxlDio {
    /// Create a backend sharing the given library handle.
    pub fn new(config: DioConfig, axl: AxlHandle) -> Self {
        Self {
            config,
            axl,
            connected: false,
            input_count: 0,
            output_count: 0,
        }
    }

    fn require_connected(&self) -> EolResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(EolError::connection("dio", "not connected"))
        }
    }

    /// Batched read of `count` input bits from `start`, using the widest
    /// aligned access available at each step.
    fn batched_read_inputs(&self, start: u32, count: u32) -> EolResult<Vec<bool>> {
        let module = self.config.input_module_no;
        let mut bits = Vec::with_capacity(count as usize);
        let mut offset = start;

        while bits.len() < count as usize {
            let remaining = count as usize - bits.len();
            if offset % 32 == 0 && remaining >= 32 {
                let value = self.axl.read_input_dword(module, offset)?;
                for bit in 0..32 {
                    bits.push(value & (1 << bit) != 0);
                }
                offset += 32;
            } else if offset % 16 == 0 && remaining >= 16 {
                let value = self.axl.read_input_word(module, offset)?;
                for bit in 0..16 {
                    bits.push(value & (1 << bit) != 0);
                }
                offset += 16;
            } else if offset % 8 == 0 && remaining >= 8 {
                let value = self.axl.read_input_byte(module, offset)?;
                for bit in 0..8 {
                    bits.push(value & (1 << bit) != 0);
                }
                offset += 8;
            } else {
                bits.push(self.axl.read_input_bit(module, offset)?);
                offset += 1;
            }
        }

        Ok(bits)
    }

    /// Per-bit fallback path.
    fn bitwise_read_inputs(&self, start: u32, count: u32) -> EolResult<Vec<bool>> {
        let module = self.config.input_module_no;
        (start..start + count)
            .map(|offset| self.axl.read_input_bit(module, offset))
            .collect()
    }

    fn read_input_range(&self, start: u32, count: u32) -> EolResult<Vec<bool>> {
        match self.batched_read_inputs(start, count) {
            Ok(bits) => Ok(bits),
            Err(e) => {
                debug!("dio: batched input read failed ({e}), falling back to bit loop");
                self.bitwise_read_inputs(start, count)
            }
        }
    }

    fn check_range(&self, start: u32, count: u32, limit: u32, what: &str) -> EolResult<()> {
        let end = start
            .checked_add(count)
            .ok_or_else(|| EolError::operation("dio", "range_check", "range overflow"))?;
        if end > limit {
            return Err(EolError::operation(
                "dio",
                "range_check",
                format!("{what} range {start}..{end} exceeds {limit} channels"),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DigitalIo for AxlDio {
    async fn connect(&mut self) -> EolResult<()> {
        if self.connected {
            return Ok(());
        }
        self.axl.open(0)?;

        self.input_count = self.axl.get_input_count(self.config.input_module_no)?;
        self.output_count = self.axl.get_output_count(self.config.output_module_no)?;
        self.connected = true;
        info!(
            "dio: connected (module {} with {} inputs, module {} with {} outputs)",
            self.config.input_module_no,
            self.input_count,
            self.config.output_module_no,
            self.output_count
        );
        Ok(())
    }

    async fn disconnect(&mut self) -> EolResult<()> {
        if self.connected {
            // Leave outputs in a safe state before releasing the library.
            if let Err(e) = self.reset_all_outputs().await {
                warn!("dio: failed to reset outputs on disconnect: {e}");
            }
            self.connected = false;
            self.axl.close()?;
        }
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected
    }

    async fn read_input(&mut self, channel: u32) -> EolResult<bool> {
        self.require_connected()?;
        self.check_range(channel, 1, self.input_count, "input")?;
        self.axl.read_input_bit(self.config.input_module_no, channel)
    }

    async fn read_output(&mut self, channel: u32) -> EolResult<bool> {
        self.require_connected()?;
        self.check_range(channel, 1, self.output_count, "output")?;
        self.axl
            .read_output_bit(self.config.output_module_no, channel)
    }

    async fn write_output(&mut self, channel: u32, value: bool) -> EolResult<()> {
        self.require_connected()?;
        self.check_range(channel, 1, self.output_count, "output")?;
        self.axl
            .write_output_bit(self.config.output_module_no, channel, value)
    }

    async fn read_all_inputs(&mut self) -> EolResult<Vec<bool>> {
        self.require_connected()?;
        self.read_input_range(0, self.input_count)
    }

    async fn read_inputs(&mut self, start: u32, count: u32) -> EolResult<Vec<bool>> {
        self.require_connected()?;
        self.check_range(start, count, self.input_count, "input")?;
        self.read_input_range(start, count)
    }

    async fn write_outputs(&mut self, start: u32, values: &[bool]) -> EolResult<()> {
        self.require_connected()?;
        self.check_range(start, values.len() as u32, self.output_count, "output")?;
        for (index, &value) in values.iter().enumerate() {
            self.axl.write_output_bit(
                self.config.output_module_no,
                start + index as u32,
                value,
            )?;
        }
        Ok(())
    }

    async fn set_all_outputs(&mut self, value: bool) -> EolResult<()> {
        self.require_connected()?;
        for channel in 0..self.output_count {
            self.axl
                .write_output_bit(self.config.output_module_no, channel, value)?;
        }
        Ok(())
    }

    async fn reset_all_outputs(&mut self) -> EolResult<()> {
        self.set_all_outputs(false).await
    }

    async fn input_count(&mut self) -> EolResult<u32> {
        self.require_connected()?;
        Ok(self.input_count)
    }

    async fn output_count(&mut self) -> EolResult<u32> {
        self.require_connected()?;
        Ok(self.output_count)
    }
}
