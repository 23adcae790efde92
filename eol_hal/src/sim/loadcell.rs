//! Simulated loadcell.
//!
//! Force is a monotone function of the most recent commanded position in the
//! shared [`SimWorld`]. Each `read_peak_force` at the same position adds a
//! deterministic +1.0 kgf step, which gives repeat sweeps distinct,
//! predictable samples.

use super::SimWorld;
use crate::capability::Loadcell;
use async_trait::async_trait;
use eol_common::error::{EolError, EolResult};
use std::collections::HashMap;

/// kgf per µm of stroke.
const FORCE_SLOPE: f64 = 0.000_05;
/// Per-repeat offset at the same position [kgf].
const REPEAT_STEP: f64 = 1.0;

/// Simulated loadcell backend.
#[derive(Debug)]
pub struct SimLoadcell {
    world: SimWorld,
    connected: bool,
    holding: bool,
    peak_reads: HashMap<u64, u32>,
}

impl SimLoadcell {
    /// Create a simulator bound to `world`.
    pub fn new(world: SimWorld) -> Self {
        Self {
            world,
            connected: false,
            holding: false,
            peak_reads: HashMap::new(),
        }
    }

    /// Whether hold mode is active.
    pub fn is_holding(&self) -> bool {
        self.holding
    }

    fn require_connected(&self) -> EolResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(EolError::connection("loadcell", "not connected"))
        }
    }

    fn base_force(&self) -> f64 {
        FORCE_SLOPE * self.world.position()
    }
}

#[async_trait]
impl Loadcell for SimLoadcell {
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

    async fn read_force(&mut self) -> EolResult<f64> {
        self.require_connected()?;
        Ok(self.base_force())
    }

    async fn read_peak_force(
        &mut self,
        _duration_ms: u64,
        _sample_interval_ms: u64,
    ) -> EolResult<f64> {
        self.require_connected()?;
        let key = self.world.position().to_bits();
        let base = self.base_force();
        let count = self.peak_reads.entry(key).or_insert(0);
        let force = base + REPEAT_STEP * f64::from(*count);
        *count += 1;
        Ok(force)
    }

    async fn hold(&mut self) -> EolResult<()> {
        self.require_connected()?;
        self.holding = true;
        Ok(())
    }

    async fn hold_release(&mut self) -> EolResult<()> {
        self.require_connected()?;
        self.holding = false;
        Ok(())
    }

    async fn zero_calibration(&mut self) -> EolResult<()> {
        self.require_connected()
    }
}
