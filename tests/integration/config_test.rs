//! Configuration persistence tests.

use ergride::control::PowerEncoding;
use ergride::sensors::types::FrameLayout;
use ergride::storage::config::{
    load_config_from, save_config_to, AppConfig, ConfigError, PowerUnit, Units,
};
use tempfile::TempDir;

#[test]
fn test_config_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = AppConfig::default();
    config.trainer.frame_layout = FrameLayout::FlagGatedSpeed;
    config.trainer.power_encoding = PowerUnit::DeciWatts;
    config.trainer.deci_watt_opcode = 0x06;
    config.control.response_timeout_ms = 2000;
    config.ride.units = Units::Metric;
    config.ride.initial_target_watts = 140;

    save_config_to(&path, &config).unwrap();
    let loaded = load_config_from(&path).unwrap();

    assert_eq!(loaded.trainer, config.trainer);
    assert_eq!(loaded.control, config.control);
    assert_eq!(loaded.ride, config.ride);
    assert_eq!(
        loaded.device_profile().power_encoding,
        PowerEncoding::DeciWatts { opcode: 0x06 }
    );
}

#[test]
fn test_missing_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let config = load_config_from(&dir.path().join("absent.toml")).unwrap();

    assert_eq!(config.ride.units, Units::Imperial);
    assert_eq!(config.control.response_timeout_ms, 3000);
    assert_eq!(config.control.settle_delay_ms, 500);
}

#[test]
fn test_malformed_file_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[ride\nunits = 3").unwrap();

    assert!(matches!(
        load_config_from(&path),
        Err(ConfigError::ParseError(_))
    ));
}
