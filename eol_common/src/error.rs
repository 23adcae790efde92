//! Error taxonomy shared across the workspace.
//!
//! Kinds map onto how the orchestrator reacts: configuration errors are
//! raised before any I/O, timeouts are retryable inside an operation,
//! protocol errors fail the cycle, safety violations stay latched until an
//! explicit reset.

use crate::config::ConfigError;
use std::time::Duration;
use thiserror::Error;

/// Workspace-wide result alias.
pub type EolResult<T> = Result<T, EolError>;

/// Error type for device and cycle operations.
#[derive(Debug, Clone, Error)]
pub enum EolError {
    /// Invalid configuration input; raised before any I/O.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Device failed to connect or was found disconnected.
    #[error("Connection error [{device}]: {reason}")]
    Connection {
        /// Device identifier ("robot", "mcu", "power", "loadcell", "dio").
        device: &'static str,
        /// Human-readable failure description.
        reason: String,
    },

    /// Malformed frame, unexpected status code, or parse failure.
    #[error("Protocol error [{device}]: {reason}")]
    Protocol {
        /// Device identifier.
        device: &'static str,
        /// Human-readable failure description.
        reason: String,
    },

    /// No response within the operation's deadline.
    #[error("Timeout [{device}/{operation}] after {timeout:?}")]
    Timeout {
        /// Device identifier.
        device: &'static str,
        /// Operation that timed out.
        operation: &'static str,
        /// The deadline that elapsed.
        timeout: Duration,
    },

    /// Semantically invalid request rejected by the device, or an
    /// orchestrator-level verification failure.
    #[error("Operation failed [{device}/{operation}]: {reason}")]
    Operation {
        /// Device identifier.
        device: &'static str,
        /// Operation that failed.
        operation: &'static str,
        /// Human-readable failure description.
        reason: String,
    },

    /// Emergency-stop active or unrecoverable hardware fault.
    /// Unrecoverable without explicit reset.
    #[error("Safety violation: {0}")]
    Safety(String),

    /// The cycle was cancelled by the external token.
    #[error("Cancelled")]
    Cancelled,
}

impl EolError {
    /// Shorthand for a connection error.
    pub fn connection(device: &'static str, reason: impl Into<String>) -> Self {
        Self::Connection {
            device,
            reason: reason.into(),
        }
    }

    /// Shorthand for a protocol error.
    pub fn protocol(device: &'static str, reason: impl Into<String>) -> Self {
        Self::Protocol {
            device,
            reason: reason.into(),
        }
    }

    /// Shorthand for an operation error.
    pub fn operation(
        device: &'static str,
        operation: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::Operation {
            device,
            operation,
            reason: reason.into(),
        }
    }

    /// Shorthand for a timeout error.
    pub fn timeout(device: &'static str, operation: &'static str, timeout: Duration) -> Self {
        Self::Timeout {
            device,
            operation,
            timeout,
        }
    }

    /// Whether this error kind is retryable within an operation.
    ///
    /// Only timeouts are; everything else either fails the cycle or is
    /// latched (safety).
    #[inline]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_device_and_operation() {
        let err = EolError::operation("mcu", "verify_temperature", "expected 38.0, got 20.0");
        let text = err.to_string();
        assert!(text.contains("mcu"));
        assert!(text.contains("verify_temperature"));
        assert!(text.contains("20.0"));
    }

    #[test]
    fn only_timeout_is_retryable() {
        assert!(EolError::timeout("mcu", "ack_wait", Duration::from_secs(5)).is_retryable());
        assert!(!EolError::protocol("mcu", "bad ETX").is_retryable());
        assert!(!EolError::Cancelled.is_retryable());
        assert!(!EolError::Safety("emergency stop active".into()).is_retryable());
    }

    #[test]
    fn config_error_converts() {
        let err: EolError = ConfigError::Validation("fan_speed out of range".into()).into();
        assert!(matches!(err, EolError::Config(_)));
    }
}
