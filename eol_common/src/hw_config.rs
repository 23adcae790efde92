//! Per-device connection descriptors.
//!
//! [`HardwareConfig`] selects the backend (`model` tag) and carries the
//! transport parameters for each of the five instruments. The factory in
//! `eol_hal` consumes these records; nothing here performs I/O.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};

/// Backend model tag for the simulator implementations.
pub const MODEL_SIM: &str = "sim";

/// Serial parity setting.
///
/// Mark and space parity are not representable on the async serial stack;
/// configurations requesting them are rejected at connect time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    /// No parity bit.
    None,
    /// Even parity.
    Even,
    /// Odd parity.
    Odd,
}

impl Default for Parity {
    fn default() -> Self {
        Self::None
    }
}

/// Servo robot axis connection descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    /// Backend model tag ("sim" or "axl").
    pub model: String,
    /// Axis index on the motion controller.
    pub axis_id: u32,
    /// IRQ number for the native library open call.
    pub irq_no: u32,
    /// Optional motion parameter file loaded after connect.
    pub motion_param_file: Option<String>,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            model: MODEL_SIM.to_string(),
            axis_id: 0,
            irq_no: 7,
            motion_param_file: None,
        }
    }
}

/// Loadcell serial connection descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadcellConfig {
    /// Backend model tag ("sim" or "bs205").
    pub model: String,
    /// Serial port path.
    pub port: String,
    /// Baud rate.
    pub baudrate: u32,
    /// Read/write deadline [s].
    pub timeout: f64,
    /// Data bits (5..=8).
    pub bytesize: u8,
    /// Stop bits (1 or 2).
    pub stopbits: u8,
    /// Parity.
    pub parity: Parity,
    /// Indicator device ID on the shared RS-485 bus.
    pub indicator_id: u8,
}

impl Default for LoadcellConfig {
    fn default() -> Self {
        Self {
            model: MODEL_SIM.to_string(),
            port: "/dev/ttyUSB0".to_string(),
            baudrate: 9600,
            timeout: 1.0,
            bytesize: 8,
            stopbits: 1,
            parity: Parity::Even,
            indicator_id: 0,
        }
    }
}

/// MCU serial connection descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct McuConfig {
    /// Backend model tag ("sim" or "lma").
    pub model: String,
    /// Serial port path.
    pub port: String,
    /// Baud rate.
    pub baudrate: u32,
    /// Read/write deadline [s].
    pub timeout: f64,
    /// Data bits (5..=8).
    pub bytesize: u8,
    /// Stop bits (1 or 2).
    pub stopbits: u8,
    /// Parity.
    pub parity: Parity,
}

impl Default for McuConfig {
    fn default() -> Self {
        Self {
            model: MODEL_SIM.to_string(),
            port: "/dev/ttyUSB1".to_string(),
            baudrate: 115_200,
            timeout: 10.0,
            bytesize: 8,
            stopbits: 1,
            parity: Parity::None,
        }
    }
}

/// Programmable power supply (SCPI over TCP) descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerConfig {
    /// Backend model tag ("sim" or "oda").
    pub model: String,
    /// IP address or hostname.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Connect/query deadline [s].
    pub timeout: f64,
    /// Output channel number.
    pub channel: u8,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            model: MODEL_SIM.to_string(),
            host: "192.168.11.1".to_string(),
            port: 5000,
            timeout: 5.0,
            channel: 1,
        }
    }
}

/// Digital I/O module descriptor with named output pin assignments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DioConfig {
    /// Backend model tag ("sim" or "axl").
    pub model: String,
    /// Module number carrying the digital inputs.
    pub input_module_no: u32,
    /// Module number carrying the digital outputs.
    pub output_module_no: u32,
    /// Output pin releasing the servo 1 brake.
    pub servo1_brake_release: u8,
    /// Tower lamp red pin.
    pub tower_lamp_red: u8,
    /// Tower lamp yellow pin.
    pub tower_lamp_yellow: u8,
    /// Tower lamp green pin.
    pub tower_lamp_green: u8,
    /// Buzzer pin.
    pub beep: u8,
}

impl Default for DioConfig {
    fn default() -> Self {
        Self {
            model: MODEL_SIM.to_string(),
            input_module_no: 0,
            output_module_no: 1,
            servo1_brake_release: 0,
            tower_lamp_red: 4,
            tower_lamp_yellow: 5,
            tower_lamp_green: 6,
            beep: 7,
        }
    }
}

impl DioConfig {
    /// Named output pins in declaration order.
    pub fn output_pins(&self) -> [u8; 5] {
        [
            self.servo1_brake_release,
            self.tower_lamp_red,
            self.tower_lamp_yellow,
            self.tower_lamp_green,
            self.beep,
        ]
    }
}

/// Unified hardware configuration for all five instruments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// Robot axis descriptor.
    pub robot: RobotConfig,
    /// Loadcell descriptor.
    pub loadcell: LoadcellConfig,
    /// MCU descriptor.
    pub mcu: McuConfig,
    /// Power supply descriptor.
    pub power: PowerConfig,
    /// Digital I/O descriptor.
    pub digital_io: DioConfig,
}

impl HardwareConfig {
    /// True when every device uses the simulator backend.
    pub fn is_all_sim(&self) -> bool {
        [
            &self.robot.model,
            &self.loadcell.model,
            &self.mcu.model,
            &self.power.model,
            &self.digital_io.model,
        ]
        .iter()
        .all(|m| m.as_str() == MODEL_SIM)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if named DIO output pins collide,
    /// or a serial descriptor carries unsupported line settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let pins = self.digital_io.output_pins();
        for i in 0..pins.len() {
            for j in (i + 1)..pins.len() {
                if pins[i] == pins[j] {
                    return Err(ConfigError::Validation(format!(
                        "DIO output pins must be distinct, pin {} assigned twice",
                        pins[i]
                    )));
                }
            }
        }

        for (bytesize, stopbits, device) in [
            (self.loadcell.bytesize, self.loadcell.stopbits, "loadcell"),
            (self.mcu.bytesize, self.mcu.stopbits, "mcu"),
        ] {
            if !(5..=8).contains(&bytesize) {
                return Err(ConfigError::Validation(format!(
                    "{device} bytesize must be 5..=8, got {bytesize}"
                )));
            }
            if !matches!(stopbits, 1 | 2) {
                return Err(ConfigError::Validation(format!(
                    "{device} stopbits must be 1 or 2, got {stopbits}"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_hardware_config_is_valid_all_sim() {
        let cfg = HardwareConfig::default();
        cfg.validate().expect("valid");
        assert!(cfg.is_all_sim());
    }

    #[test]
    fn colliding_output_pins_rejected() {
        let cfg = HardwareConfig {
            digital_io: DioConfig {
                tower_lamp_red: 0, // collides with servo1_brake_release
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn invalid_serial_settings_rejected() {
        let cfg = HardwareConfig {
            mcu: McuConfig {
                bytesize: 9,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = HardwareConfig {
            loadcell: LoadcellConfig {
                stopbits: 3,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn non_sim_model_detected() {
        let cfg = HardwareConfig {
            mcu: McuConfig {
                model: "lma".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(!cfg.is_all_sim());
    }

    #[test]
    fn parity_serde_lowercase() {
        let toml = "model = \"bs205\"\nparity = \"even\"";
        let cfg: LoadcellConfig = toml::from_str(toml).expect("parse");
        assert_eq!(cfg.parity, Parity::Even);
    }
}
