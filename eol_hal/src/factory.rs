//! Backend factory: simulator or hardware per device, from configuration.
//!
//! Nothing is instantiated until its model tag is matched. The simulated
//! robot and loadcell share one [`SimWorld`] so force tracks position. The
//! hardware robot and DIO share one AXL handle so the native library is
//! opened once.

use crate::capability::{DigitalIo, Loadcell, Mcu, Power, Robot};
use crate::facade::HardwareFacade;
use crate::hw::{Bs205Loadcell, LmaMcu, OdaPower};
use crate::sim::{SimDio, SimLoadcell, SimMcu, SimPower, SimRobot, SimWorld};
use eol_common::config::ConfigError;
use eol_common::error::EolResult;
use eol_common::hw_config::{HardwareConfig, MODEL_SIM};
use eol_common::test_config::TestConfiguration;
use std::time::Duration;

/// Model tag for the AXL robot/DIO hardware backends.
pub const MODEL_AXL: &str = "axl";
/// Model tag for the LMA MCU hardware backend.
pub const MODEL_LMA: &str = "lma";
/// Model tag for the BS205 loadcell hardware backend.
pub const MODEL_BS205: &str = "bs205";
/// Model tag for the ODA power hardware backend.
pub const MODEL_ODA: &str = "oda";

/// The five backend instances for one run.
pub struct Backends {
    /// Robot backend.
    pub robot: Box<dyn Robot>,
    /// MCU backend.
    pub mcu: Box<dyn Mcu>,
    /// Loadcell backend.
    pub loadcell: Box<dyn Loadcell>,
    /// Power backend.
    pub power: Box<dyn Power>,
    /// DIO backend.
    pub dio: Box<dyn DigitalIo>,
}

/// Instantiate one backend per device from the configured model tags.
///
/// # Errors
///
/// `ConfigError::UnknownModel` for an unrecognized tag;
/// `ConfigError::BackendUnavailable` when a hardware robot/DIO is requested
/// without the `axl` feature built in.
pub fn create_backends(hw: &HardwareConfig, test: &TestConfiguration) -> EolResult<Backends> {
    let world = SimWorld::new();

    #[cfg(feature = "axl")]
    let axl = crate::driver::axl::AxlHandle::new();

    let robot: Box<dyn Robot> = match hw.robot.model.as_str() {
        MODEL_SIM => Box::new(SimRobot::new(world.clone())),
        #[cfg(feature = "axl")]
        MODEL_AXL => Box::new(crate::hw::AxlRobot::new(hw.robot.clone(), axl.clone())),
        #[cfg(not(feature = "axl"))]
        MODEL_AXL => {
            return Err(ConfigError::BackendUnavailable(
                "robot model 'axl' requires the native AXL binding".to_string(),
            )
            .into());
        }
        other => {
            return Err(ConfigError::UnknownModel(format!("robot: {other}")).into());
        }
    };

    let mcu: Box<dyn Mcu> = match hw.mcu.model.as_str() {
        MODEL_SIM => Box::new(SimMcu::new()),
        MODEL_LMA => Box::new(LmaMcu::new(
            hw.mcu.clone(),
            test.retry_attempts,
            Duration::from_secs_f64(test.timeout_seconds),
        )),
        other => {
            return Err(ConfigError::UnknownModel(format!("mcu: {other}")).into());
        }
    };

    let loadcell: Box<dyn Loadcell> = match hw.loadcell.model.as_str() {
        MODEL_SIM => Box::new(SimLoadcell::new(world.clone())),
        MODEL_BS205 => Box::new(Bs205Loadcell::new(hw.loadcell.clone())),
        other => {
            return Err(ConfigError::UnknownModel(format!("loadcell: {other}")).into());
        }
    };

    let power: Box<dyn Power> = match hw.power.model.as_str() {
        MODEL_SIM => Box::new(SimPower::new()),
        MODEL_ODA => Box::new(OdaPower::new(hw.power.clone())),
        other => {
            return Err(ConfigError::UnknownModel(format!("power: {other}")).into());
        }
    };

    let dio: Box<dyn DigitalIo> = match hw.digital_io.model.as_str() {
        MODEL_SIM => Box::new(SimDio::new()),
        #[cfg(feature = "axl")]
        MODEL_AXL => Box::new(crate::hw::AxlDio::new(hw.digital_io.clone(), axl.clone())),
        #[cfg(not(feature = "axl"))]
        MODEL_AXL => {
            return Err(ConfigError::BackendUnavailable(
                "dio model 'axl' requires the native AXL binding".to_string(),
            )
            .into());
        }
        other => {
            return Err(ConfigError::UnknownModel(format!("dio: {other}")).into());
        }
    };

    Ok(Backends {
        robot,
        mcu,
        loadcell,
        power,
        dio,
    })
}

/// Create the backends and compose them into a facade.
pub fn create_facade(hw: &HardwareConfig, test: &TestConfiguration) -> EolResult<HardwareFacade> {
    let backends = create_backends(hw, test)?;
    Ok(HardwareFacade::new(
        backends.robot,
        backends.mcu,
        backends.loadcell,
        backends.power,
        backends.dio,
    ))
}
