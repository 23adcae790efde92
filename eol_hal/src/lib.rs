//! EOL Instrument Abstraction Layer
//!
//! Device-agnostic capability traits for the five EOL test instruments
//! (robot, MCU, power, loadcell, digital I/O), with two backends per device:
//! a deterministic simulator (always available) and a hardware backend bound
//! to the wire codecs and transports in this crate.
//!
//! # Module Structure
//!
//! - [`capability`] - Abstract device contracts
//! - [`codec`] - MCU and loadcell wire codecs
//! - [`transport`] - Async serial and TCP SCPI transports
//! - [`sim`] - Deterministic in-memory backends
//! - [`hw`] - Hardware backends (robot/DIO require the `axl` feature)
//! - [`driver`] - Native motion-library binding (`axl` feature)
//! - [`facade`] - Lifecycle and grouped operations across all devices
//! - [`factory`] - Simulator/hardware backend selection

pub mod capability;
pub mod codec;
pub mod driver;
pub mod facade;
pub mod factory;
pub mod hw;
pub mod sim;
pub mod transport;
