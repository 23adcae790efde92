//! AJINEXTEK AXL motion/DIO library binding.
//!
//! The native library is process-global: one `AxlOpen` serves every board.
//! [`AxlHandle`] is a cloneable ref-counted wrapper so the robot and DIO
//! backends share a single open/close pair instead of fighting over the
//! global.

use eol_common::error::{EolError, EolResult};
use std::ffi::CString;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// AXL return code for success.
const AXT_RT_SUCCESS: i32 = 0;

/// Home search result: success.
const HOME_SUCCESS: u32 = 0x01;
/// Home search result: still searching.
const HOME_SEARCHING: u32 = 0x02;

#[allow(non_snake_case)]
mod ffi {
    #[link(name = "AXL")]
    unsafe extern "C" {
        pub fn AxlOpen(irq_no: i32) -> i32;
        pub fn AxlClose() -> i32;
        pub fn AxlIsOpened() -> i32;
        pub fn AxlGetBoardCount(count: *mut i32) -> i32;
        pub fn AxmInfoGetAxisCount(count: *mut i32) -> i32;
        pub fn AxmSignalServoOn(axis: i32, on_off: i32) -> i32;
        pub fn AxmSignalIsServoOn(axis: i32, on_off: *mut i32) -> i32;
        pub fn AxmHomeSetStart(axis: i32) -> i32;
        pub fn AxmHomeGetResult(axis: i32, result: *mut u32) -> i32;
        pub fn AxmMoveStartPos(axis: i32, pos: f64, vel: f64, accel: f64, decel: f64) -> i32;
        pub fn AxmStatusReadInMotion(axis: i32, in_motion: *mut i32) -> i32;
        pub fn AxmStatusGetActPos(axis: i32, pos: *mut f64) -> i32;
        pub fn AxmMoveSStop(axis: i32) -> i32;
        pub fn AxmMoveEStop(axis: i32) -> i32;
        pub fn AxmMotLoadParaAll(path: *const std::ffi::c_char) -> i32;
        pub fn AxdInfoGetInputCount(module: i32, count: *mut i32) -> u32;
        pub fn AxdInfoGetOutputCount(module: i32, count: *mut i32) -> u32;
        pub fn AxdiReadInportBit(module: i32, offset: i32, value: *mut u32) -> u32;
        pub fn AxdiReadInportByte(module: i32, offset: i32, value: *mut u32) -> u32;
        pub fn AxdiReadInportWord(module: i32, offset: i32, value: *mut u32) -> u32;
        pub fn AxdiReadInportDword(module: i32, offset: i32, value: *mut u32) -> u32;
        pub fn AxdoReadOutportBit(module: i32, offset: i32, value: *mut u32) -> u32;
        pub fn AxdoWriteOutportBit(module: i32, offset: i32, value: u32) -> u32;
    }
}

/// Outcome of one home-result poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomeResult {
    /// Home search still running.
    Searching,
    /// Home search completed successfully.
    Success,
    /// Home search failed with the library's error code.
    Error(u32),
}

fn check(device: &'static str, operation: &'static str, code: i32) -> EolResult<()> {
    if code == AXT_RT_SUCCESS {
        Ok(())
    } else {
        Err(EolError::operation(
            device,
            operation,
            format!("AXL error code {code}"),
        ))
    }
}

fn check_u(device: &'static str, operation: &'static str, code: u32) -> EolResult<()> {
    check(device, operation, code as i32)
}

#[derive(Debug, Default)]
struct OpenState {
    open_count: u32,
}

/// Ref-counted handle over the process-global AXL library.
#[derive(Debug, Clone, Default)]
pub struct AxlHandle {
    state: Arc<Mutex<OpenState>>,
}

impl AxlHandle {
    /// Create a handle; the library is not opened yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the library (first caller) or bump the reference count.
    pub fn open(&self, irq_no: u32) -> EolResult<()> {
        let mut state = self.state.lock().expect("axl state lock");
        if state.open_count == 0 {
            check("robot", "open", unsafe { ffi::AxlOpen(irq_no as i32) })?;
            debug!("AXL library opened (irq {irq_no})");
        }
        state.open_count += 1;
        Ok(())
    }

    /// Drop one reference; closes the library when the count reaches zero.
    pub fn close(&self) -> EolResult<()> {
        let mut state = self.state.lock().expect("axl state lock");
        match state.open_count {
            0 => Ok(()),
            1 => {
                state.open_count = 0;
                check("robot", "close", unsafe { ffi::AxlClose() })?;
                debug!("AXL library closed");
                Ok(())
            }
            _ => {
                state.open_count -= 1;
                Ok(())
            }
        }
    }

    /// Whether the native library reports itself open.
    pub fn is_opened(&self) -> bool {
        unsafe { ffi::AxlIsOpened() == 1 }
    }

    /// Number of boards detected.
    pub fn board_count(&self) -> EolResult<u32> {
        let mut count: i32 = 0;
        check("robot", "board_count", unsafe {
            ffi::AxlGetBoardCount(&mut count)
        })?;
        Ok(count as u32)
    }

    /// Number of axes across all boards.
    pub fn axis_count(&self) -> EolResult<u32> {
        let mut count: i32 = 0;
        check("robot", "axis_count", unsafe {
            ffi::AxmInfoGetAxisCount(&mut count)
        })?;
        Ok(count as u32)
    }

    /// Switch the servo on or off.
    pub fn servo_on(&self, axis: u32, on: bool) -> EolResult<()> {
        check("robot", "servo_on", unsafe {
            ffi::AxmSignalServoOn(axis as i32, i32::from(on))
        })
    }

    /// Whether the servo is energized.
    pub fn is_servo_on(&self, axis: u32) -> EolResult<bool> {
        let mut on: i32 = 0;
        check("robot", "is_servo_on", unsafe {
            ffi::AxmSignalIsServoOn(axis as i32, &mut on)
        })?;
        Ok(on != 0)
    }

    /// Kick off the home search.
    pub fn home_set_start(&self, axis: u32) -> EolResult<()> {
        check("robot", "home_set_start", unsafe {
            ffi::AxmHomeSetStart(axis as i32)
        })
    }

    /// Poll the home search result.
    pub fn home_get_result(&self, axis: u32) -> EolResult<HomeResult> {
        let mut result: u32 = 0;
        check("robot", "home_get_result", unsafe {
            ffi::AxmHomeGetResult(axis as i32, &mut result)
        })?;
        Ok(match result {
            HOME_SUCCESS => HomeResult::Success,
            HOME_SEARCHING => HomeResult::Searching,
            other => HomeResult::Error(other),
        })
    }

    /// Start an absolute positioning move.
    pub fn move_start_pos(
        &self,
        axis: u32,
        position: f64,
        velocity: f64,
        accel: f64,
        decel: f64,
    ) -> EolResult<()> {
        check("robot", "move_start_pos", unsafe {
            ffi::AxmMoveStartPos(axis as i32, position, velocity, accel, decel)
        })
    }

    /// Whether the axis reports in-motion.
    pub fn read_in_motion(&self, axis: u32) -> EolResult<bool> {
        let mut in_motion: i32 = 0;
        check("robot", "read_in_motion", unsafe {
            ffi::AxmStatusReadInMotion(axis as i32, &mut in_motion)
        })?;
        Ok(in_motion != 0)
    }

    /// Actual axis position.
    pub fn get_act_pos(&self, axis: u32) -> EolResult<f64> {
        let mut position: f64 = 0.0;
        check("robot", "get_act_pos", unsafe {
            ffi::AxmStatusGetActPos(axis as i32, &mut position)
        })?;
        Ok(position)
    }

    /// Decelerated stop.
    pub fn move_smooth_stop(&self, axis: u32) -> EolResult<()> {
        check("robot", "move_smooth_stop", unsafe {
            ffi::AxmMoveSStop(axis as i32)
        })
    }

    /// Immediate stop.
    pub fn move_emergency_stop(&self, axis: u32) -> EolResult<()> {
        check("robot", "move_emergency_stop", unsafe {
            ffi::AxmMoveEStop(axis as i32)
        })
    }

    /// Load motion parameters for every axis from a parameter file.
    pub fn load_para_all(&self, path: &str) -> EolResult<()> {
        let c_path = CString::new(path).map_err(|_| {
            EolError::operation("robot", "load_para_all", "parameter path contains NUL")
        })?;
        check("robot", "load_para_all", unsafe {
            ffi::AxmMotLoadParaAll(c_path.as_ptr())
        })
    }

    // ── DIO surface ─────────────────────────────────────────────────

    /// Number of input channels on `module`.
    pub fn get_input_count(&self, module: u32) -> EolResult<u32> {
        let mut count: i32 = 0;
        check_u("dio", "get_input_count", unsafe {
            ffi::AxdInfoGetInputCount(module as i32, &mut count)
        })?;
        Ok(count as u32)
    }

    /// Number of output channels on `module`.
    pub fn get_output_count(&self, module: u32) -> EolResult<u32> {
        let mut count: i32 = 0;
        check_u("dio", "get_output_count", unsafe {
            ffi::AxdInfoGetOutputCount(module as i32, &mut count)
        })?;
        Ok(count as u32)
    }

    /// Read one input bit.
    pub fn read_input_bit(&self, module: u32, offset: u32) -> EolResult<bool> {
        let mut value: u32 = 0;
        check_u("dio", "read_input_bit", unsafe {
            ffi::AxdiReadInportBit(module as i32, offset as i32, &mut value)
        })?;
        Ok(value != 0)
    }

    /// Read 8 input bits starting at `offset` (offset must be byte-aligned).
    pub fn read_input_byte(&self, module: u32, offset: u32) -> EolResult<u32> {
        let mut value: u32 = 0;
        check_u("dio", "read_input_byte", unsafe {
            ffi::AxdiReadInportByte(module as i32, (offset / 8) as i32, &mut value)
        })?;
        Ok(value)
    }

    /// Read 16 input bits starting at `offset` (offset must be word-aligned).
    pub fn read_input_word(&self, module: u32, offset: u32) -> EolResult<u32> {
        let mut value: u32 = 0;
        check_u("dio", "read_input_word", unsafe {
            ffi::AxdiReadInportWord(module as i32, (offset / 16) as i32, &mut value)
        })?;
        Ok(value)
    }

    /// Read 32 input bits starting at `offset` (offset must be dword-aligned).
    pub fn read_input_dword(&self, module: u32, offset: u32) -> EolResult<u32> {
        let mut value: u32 = 0;
        check_u("dio", "read_input_dword", unsafe {
            ffi::AxdiReadInportDword(module as i32, (offset / 32) as i32, &mut value)
        })?;
        Ok(value)
    }

    /// Read one output bit back.
    pub fn read_output_bit(&self, module: u32, offset: u32) -> EolResult<bool> {
        let mut value: u32 = 0;
        check_u("dio", "read_output_bit", unsafe {
            ffi::AxdoReadOutportBit(module as i32, offset as i32, &mut value)
        })?;
        Ok(value != 0)
    }

    /// Write one output bit.
    pub fn write_output_bit(&self, module: u32, offset: u32, value: bool) -> EolResult<()> {
        check_u("dio", "write_output_bit", unsafe {
            ffi::AxdoWriteOutportBit(module as i32, offset as i32, u32::from(value))
        })
    }
}
