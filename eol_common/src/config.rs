//! Configuration loading traits and types.
//!
//! This module provides a standardized way to load TOML configuration files
//! across the EOL workspace. Value-object modules ([`crate::test_config`],
//! [`crate::hw_config`]) supply `validate()` methods that return
//! [`ConfigError::Validation`].
//!
//! # Usage
//!
//! ```rust,no_run
//! use eol_common::config::{ConfigLoader, ConfigError};
//! use eol_common::test_config::TestConfiguration;
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let cfg = TestConfiguration::load(Path::new("test_config.toml"))?;
//!     cfg.validate()?;
//!     Ok(())
//! }
//! ```

use std::path::Path;
use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    Validation(String),

    /// Backend model tag is not known to the factory.
    #[error("Unknown backend model: {0}")]
    UnknownModel(String),

    /// A hardware backend was requested but its driver binding is not built in.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::Parse` if TOML syntax is invalid
/// - Semantic validation is the caller's job (`validate()` on the value type)
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::Parse(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

/// Validate that a named numeric field is finite.
pub(crate) fn require_finite(value: f64, field: &str) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "{field} must be finite, got {value}"
        )))
    }
}

/// Validate that a named duration field is non-negative (and finite).
pub(crate) fn require_non_negative(value: f64, field: &str) -> Result<(), ConfigError> {
    require_finite(value, field)?;
    if value < 0.0 {
        return Err(ConfigError::Validation(format!(
            "{field} must be >= 0, got {value}"
        )));
    }
    Ok(())
}
