use std::io::Write;

use crate::bounds::ThresholdBounds;
use crate::config::SwitchConfig;
use crate::error::ConfigError;

#[test]
fn partial_toml_fills_defaults() {
    let cfg = SwitchConfig::from_toml_str(
        r#"
        interval_minutes = 15
        store_key = "sw2"

        [bounds]
        max = 850.0
        min = 120.0
        "#,
    )
    .unwrap();
    assert_eq!(cfg.interval_minutes, 15);
    assert_eq!(cfg.store_key, "sw2");
    assert_eq!(cfg.bounds, ThresholdBounds::new(850.0, 120.0));
    assert_eq!(cfg.sensor.r1_ohms, 30_000.0);
    assert_eq!(cfg.sensor.calibration_key, "SolarRead");
    assert!(!cfg.relay_active_low);
}

#[test]
fn default_config_survives_toml_output() {
    let text = SwitchConfig::default().to_toml_string().unwrap();
    assert!(text.contains("interval_minutes = 5"));
    assert_eq!(SwitchConfig::from_toml_str(&text).unwrap(), SwitchConfig::default());
}

#[test]
fn rejects_out_of_range_interval() {
    let err = SwitchConfig::from_toml_str("interval_minutes = 90").unwrap_err();
    assert!(matches!(err, ConfigError::IntervalOutOfRange(90)));
}

#[test]
fn rejects_inverted_bounds() {
    let err = SwitchConfig::from_toml_str("[bounds]\nmax = 100.0\nmin = 400.0\n").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidBounds { .. }));
}

#[test]
fn rejects_zero_divider_resistor() {
    let err = SwitchConfig::from_toml_str("[sensor]\nr2_ohms = 0.0\n").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue("sensor.r2_ohms")));
}

#[test]
fn loads_from_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "interval_minutes = 1\nrelay_active_low = true").unwrap();
    let cfg = SwitchConfig::load(Some(file.path())).unwrap();
    assert_eq!(cfg.interval_minutes, 1);
    assert!(cfg.relay_active_low);
}

#[test]
fn missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = SwitchConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
    assert!(matches!(err, ConfigError::Load(_)));
}
