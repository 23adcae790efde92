//! Native driver bindings.
//!
//! Only the AXL motion/DIO library binding lives here; it is compiled with
//! the `axl` feature and absent otherwise.

#[cfg(feature = "axl")]
pub mod axl;
