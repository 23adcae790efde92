//! Common re-exports for convenience.
//!
//! ```rust
//! use eol_common::prelude::*;
//! ```

pub use crate::cancel::CancelToken;
pub use crate::config::{ConfigError, ConfigLoader};
pub use crate::dut::DutInfo;
pub use crate::error::{EolError, EolResult};
pub use crate::hw_config::HardwareConfig;
pub use crate::measurements::TestMeasurements;
pub use crate::progress::{Phase, ProgressEvent, ProgressSink};
pub use crate::result::{CycleResult, TestReport};
pub use crate::test_config::{PassCriteria, TestConfiguration};
