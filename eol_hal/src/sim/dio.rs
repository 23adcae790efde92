//! Simulated digital I/O module.

use crate::capability::DigitalIo;
use async_trait::async_trait;
use eol_common::error::{EolError, EolResult};

const INPUT_COUNT: usize = 32;
const OUTPUT_COUNT: usize = 32;

/// Simulated DIO backend with in-memory bit vectors.
#[derive(Debug)]
pub struct SimDio {
    connected: bool,
    inputs: Vec<bool>,
    outputs: Vec<bool>,
}

impl Default for SimDio {
    fn default() -> Self {
        Self::new()
    }
}

impl SimDio {
    /// Create a simulator with all channels low.
    pub fn new() -> Self {
        Self {
            connected: false,
            inputs: vec![false; INPUT_COUNT],
            outputs: vec![false; OUTPUT_COUNT],
        }
    }

    /// Drive a simulated input (test fixture).
    pub fn set_input(&mut self, channel: u32, value: bool) {
        if let Some(slot) = self.inputs.get_mut(channel as usize) {
            *slot = value;
        }
    }

    fn require_connected(&self) -> EolResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(EolError::connection("dio", "not connected"))
        }
    }

    fn check_channel(&self, channel: u32, count: usize, direction: &str) -> EolResult<()> {
        if (channel as usize) < count {
            Ok(())
        } else {
            Err(EolError::operation(
                "dio",
                "channel_check",
                format!("{direction} channel {channel} out of range 0..{count}"),
            ))
        }
    }
}

#[async_trait]
impl DigitalIo for SimDio {
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

    async fn read_input(&mut self, channel: u32) -> EolResult<bool> {
        self.require_connected()?;
        self.check_channel(channel, INPUT_COUNT, "input")?;
        Ok(self.inputs[channel as usize])
    }

    async fn read_output(&mut self, channel: u32) -> EolResult<bool> {
        self.require_connected()?;
        self.check_channel(channel, OUTPUT_COUNT, "output")?;
        Ok(self.outputs[channel as usize])
    }

    async fn write_output(&mut self, channel: u32, value: bool) -> EolResult<()> {
        self.require_connected()?;
        self.check_channel(channel, OUTPUT_COUNT, "output")?;
        self.outputs[channel as usize] = value;
        Ok(())
    }

    async fn read_all_inputs(&mut self) -> EolResult<Vec<bool>> {
        self.require_connected()?;
        Ok(self.inputs.clone())
    }

    async fn read_inputs(&mut self, start: u32, count: u32) -> EolResult<Vec<bool>> {
        self.require_connected()?;
        let end = start
            .checked_add(count)
            .ok_or_else(|| EolError::operation("dio", "read_inputs", "range overflow"))?;
        self.check_channel(end.saturating_sub(1), INPUT_COUNT, "input")?;
        Ok(self.inputs[start as usize..end as usize].to_vec())
    }

    async fn write_outputs(&mut self, start: u32, values: &[bool]) -> EolResult<()> {
        self.require_connected()?;
        let end = start as usize + values.len();
        if end > OUTPUT_COUNT {
            return Err(EolError::operation(
                "dio",
                "write_outputs",
                format!("range {start}..{end} exceeds {OUTPUT_COUNT} outputs"),
            ));
        }
        self.outputs[start as usize..end].copy_from_slice(values);
        Ok(())
    }

    async fn set_all_outputs(&mut self, value: bool) -> EolResult<()> {
        self.require_connected()?;
        self.outputs.fill(value);
        Ok(())
    }

    async fn reset_all_outputs(&mut self) -> EolResult<()> {
        self.set_all_outputs(false).await
    }

    async fn input_count(&mut self) -> EolResult<u32> {
        self.require_connected()?;
        Ok(INPUT_COUNT as u32)
    }

    async fn output_count(&mut self) -> EolResult<u32> {
        self.require_connected()?;
        Ok(OUTPUT_COUNT as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_and_read_back_output() {
        let mut dio = SimDio::new();
        dio.connect().await.expect("connect");

        dio.write_output(4, true).await.expect("write");
        assert!(dio.read_output(4).await.expect("read"));

        dio.reset_all_outputs().await.expect("reset");
        assert!(!dio.read_output(4).await.expect("read"));
    }

    #[tokio::test]
    async fn batched_ranges_are_bounds_checked() {
        let mut dio = SimDio::new();
        dio.connect().await.expect("connect");

        dio.write_outputs(0, &[true, false, true]).await.expect("write");
        assert!(dio.read_output(0).await.expect("read"));
        assert!(dio.read_output(2).await.expect("read"));

        assert!(dio.write_outputs(30, &[true; 4]).await.is_err());
        assert!(dio.read_inputs(30, 4).await.is_err());
    }

    #[tokio::test]
    async fn simulated_inputs_visible_in_reads() {
        let mut dio = SimDio::new();
        dio.connect().await.expect("connect");
        dio.set_input(2, true);

        assert!(dio.read_input(2).await.expect("read"));
        let all = dio.read_all_inputs().await.expect("all");
        assert_eq!(all.len(), INPUT_COUNT);
        assert!(all[2]);

        let window = dio.read_inputs(1, 3).await.expect("window");
        assert_eq!(window, vec![false, true, false]);
    }

    #[tokio::test]
    async fn counts_match_model() {
        let mut dio = SimDio::new();
        dio.connect().await.expect("connect");
        assert_eq!(dio.input_count().await.expect("in"), 32);
        assert_eq!(dio.output_count().await.expect("out"), 32);
    }
}
