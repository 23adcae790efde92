//! Device-under-test identification.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};

/// Identification of the actuator under test, attached to every cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DutInfo {
    /// Unique DUT identifier.
    pub dut_id: String,
    /// Model number.
    pub model_number: String,
    /// Serial number.
    pub serial_number: String,
    /// Manufacturer name.
    #[serde(default = "default_manufacturer")]
    pub manufacturer: String,
}

fn default_manufacturer() -> String {
    "Unknown".to_string()
}

impl DutInfo {
    /// Create a new DUT record with the default manufacturer.
    pub fn new(
        dut_id: impl Into<String>,
        model_number: impl Into<String>,
        serial_number: impl Into<String>,
    ) -> Self {
        Self {
            dut_id: dut_id.into(),
            model_number: model_number.into(),
            serial_number: serial_number.into(),
            manufacturer: default_manufacturer(),
        }
    }

    /// Validate that required fields are non-empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (value, field) in [
            (&self.dut_id, "dut_id"),
            (&self.model_number, "model_number"),
            (&self.serial_number, "serial_number"),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{field} cannot be empty")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_dut_is_valid() {
        let dut = DutInfo::new("DUT-001", "WF-A1", "SN12345");
        dut.validate().expect("valid");
        assert_eq!(dut.manufacturer, "Unknown");
    }

    #[test]
    fn empty_required_field_rejected() {
        let dut = DutInfo::new("", "WF-A1", "SN12345");
        assert!(dut.validate().is_err());

        let dut = DutInfo::new("DUT-001", "  ", "SN12345");
        assert!(dut.validate().is_err());
    }
}
