//! Configuration file loading integration tests.

use eol_common::config::{ConfigError, ConfigLoader};
use eol_common::hw_config::{HardwareConfig, Parity};
use eol_common::test_config::TestConfiguration;
use std::io::Write;

fn write_temp(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    file.write_all(content.as_bytes()).expect("write");
    file
}

#[test]
fn full_test_configuration_round_trips_through_toml() {
    let original = TestConfiguration {
        voltage: 24.0,
        temperature_list: vec![40.0, 55.0],
        stroke_positions: vec![120_000.0, 170_000.0],
        repeat_count: 3,
        ..Default::default()
    };

    let serialized = toml::to_string(&original).expect("serialize");
    let file = write_temp(&serialized);

    let loaded = TestConfiguration::load(file.path()).expect("load");
    assert_eq!(loaded, original);
    loaded.validate().expect("valid");
}

#[test]
fn full_hardware_configuration_round_trips_through_toml() {
    let mut original = HardwareConfig::default();
    original.mcu.model = "lma".to_string();
    original.mcu.port = "/dev/ttyS3".to_string();
    original.loadcell.parity = Parity::Odd;
    original.power.host = "10.0.0.20".to_string();

    let serialized = toml::to_string(&original).expect("serialize");
    let file = write_temp(&serialized);

    let loaded = HardwareConfig::load(file.path()).expect("load");
    assert_eq!(loaded, original);
    loaded.validate().expect("valid");
    assert!(!loaded.is_all_sim());
}

#[test]
fn sectioned_hardware_file_parses_by_device() {
    let file = write_temp(
        r#"
[robot]
model = "sim"
axis_id = 1

[mcu]
model = "lma"
port = "/dev/ttyUSB9"
baudrate = 115200

[power]
model = "oda"
host = "192.168.0.5"
port = 5025

[digital_io]
servo1_brake_release = 2
tower_lamp_red = 10
tower_lamp_yellow = 11
tower_lamp_green = 12
beep = 13
"#,
    );

    let hw = HardwareConfig::load(file.path()).expect("load");
    hw.validate().expect("valid");
    assert_eq!(hw.robot.axis_id, 1);
    assert_eq!(hw.mcu.port, "/dev/ttyUSB9");
    assert_eq!(hw.power.port, 5025);
    assert_eq!(hw.digital_io.tower_lamp_green, 12);
    // Loadcell section omitted entirely: defaults apply.
    assert_eq!(hw.loadcell.baudrate, 9600);
}

#[test]
fn invalid_thermal_ordering_is_rejected_after_load() {
    let file = write_temp(
        "standby_temperature = 70.0\nactivation_temperature = 52.0\nupper_temperature = 80.0\n",
    );

    let cfg = TestConfiguration::load(file.path()).expect("load parses");
    assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let file = write_temp("temperature_list = [38.0,\n");
    let result = TestConfiguration::load(file.path());
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}
