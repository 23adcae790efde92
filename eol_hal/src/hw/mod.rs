//! Hardware backends binding the capability traits to codecs and
//! transports.
//!
//! The robot and DIO backends sit on the native AXL binding and are only
//! built with the `axl` feature.

#[cfg(feature = "axl")]
mod dio;
mod loadcell;
mod mcu;
mod power;
#[cfg(feature = "axl")]
mod robot;

#[cfg(feature = "axl")]
pub use dio::AxlDio;
pub use loadcell::Bs205Loadcell;
pub use mcu::LmaMcu;
pub use power::OdaPower;
#[cfg(feature = "axl")]
pub use robot::AxlRobot;
