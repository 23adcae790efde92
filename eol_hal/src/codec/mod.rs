//! Wire codecs for the serial-framed instruments.

pub mod loadcell;
pub mod mcu;
