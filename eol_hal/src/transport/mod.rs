//! Async transports: serial byte streams and line-terminated TCP SCPI.

pub mod scpi;
pub mod serial;
