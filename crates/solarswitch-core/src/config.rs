use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bounds::ThresholdBounds;
use crate::error::ConfigError;
use crate::validation::{validate_bounds, validate_interval};

pub const ENV_PREFIX: &str = "SOLARSWITCH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchConfig {
    /// Minutes between relay decisions.
    pub interval_minutes: u32,
    /// Settings-store key holding this controller's bounds.
    pub store_key: String,
    pub relay_active_low: bool,
    /// Consecutive sensor faults before the sensor is reported degraded.
    pub sensor_fault_threshold: u32,
    /// Bounds used until the store provides persisted ones.
    pub bounds: ThresholdBounds,
    pub sensor: SensorConfig,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 5,
            store_key: "sw0".to_string(),
            relay_active_low: false,
            sensor_fault_threshold: 5,
            bounds: ThresholdBounds::default(),
            sensor: SensorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub r1_ohms: f64,
    pub r2_ohms: f64,
    pub adc_reference_volts: f64,
    pub adc_max_reading: f64,
    /// Settings-store key holding the highest voltage seen.
    pub calibration_key: String,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            r1_ohms: 30_000.0,
            r2_ohms: 7_500.0,
            adc_reference_volts: 3.3,
            adc_max_reading: 4095.0,
            calibration_key: "SolarRead".to_string(),
        }
    }
}

impl SwitchConfig {
    /// Load from an optional TOML file, then `SOLARSWITCH_*` environment
    /// variables (nested keys separated by `__`, e.g.
    /// `SOLARSWITCH_SENSOR__R1_OHMS`).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let cfg: SwitchConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: SwitchConfig = config::Config::builder()
            .add_source(config::File::from_str(s, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_interval(self.interval_minutes)?;
        validate_bounds(&self.bounds)?;
        let s = &self.sensor;
        for (name, v) in [
            ("sensor.r1_ohms", s.r1_ohms),
            ("sensor.r2_ohms", s.r2_ohms),
            ("sensor.adc_reference_volts", s.adc_reference_volts),
            ("sensor.adc_max_reading", s.adc_max_reading),
        ] {
            if !v.is_finite() || v <= 0.0 {
                return Err(ConfigError::InvalidValue(name));
            }
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        minutes(self.interval_minutes)
    }
}

pub(crate) fn minutes(m: u32) -> Duration {
    Duration::from_secs(u64::from(m) * 60)
}
