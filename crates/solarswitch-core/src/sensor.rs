//! Solar index acquisition.
//!
//! The controller only sees [`IndexSource`]: a value in
//! `[0, MAX_INDEX_VALUE]`, or [`SENSOR_FAULT`] when nothing usable was read.

use crate::bounds::MAX_INDEX_VALUE;
use crate::config::SensorConfig;
use crate::hw::AdcChannel;
use crate::storage::SettingsStore;

/// Sentinel returned by an [`IndexSource`] on a failed read.
pub const SENSOR_FAULT: f64 = -1.0;

pub trait IndexSource {
    fn read_index(&mut self) -> f64;
}

impl<F: FnMut() -> f64> IndexSource for F {
    fn read_index(&mut self) -> f64 {
        self()
    }
}

/// Voltage-divider sensor normalized against the highest voltage seen so
/// far. The highest voltage is kept in the settings store so the scale
/// survives restarts.
pub struct SolarIndexSensor<A, K> {
    adc: A,
    store: K,
    cfg: SensorConfig,
    highest_volts: Option<f64>,
}

impl<A: AdcChannel, K: SettingsStore> SolarIndexSensor<A, K> {
    pub fn new(adc: A, mut store: K, cfg: SensorConfig) -> Self {
        let highest_volts = match store.load_scalar(&cfg.calibration_key) {
            Ok(Some(v)) if v.is_finite() && v > 0.0 => Some(v),
            Ok(Some(v)) => {
                log::warn!("ignoring unusable stored calibration {v} V");
                None
            }
            Ok(None) => None,
            Err(e) => {
                log::warn!("could not load sensor calibration: {e}");
                None
            }
        };
        Self {
            adc,
            store,
            cfg,
            highest_volts,
        }
    }

    pub fn highest_volts(&self) -> Option<f64> {
        self.highest_volts
    }

    /// Input voltage on the high side of the divider for a raw ADC count.
    pub fn volts_from_raw(&self, raw: u16) -> f64 {
        let adc_volts = f64::from(raw) * self.cfg.adc_reference_volts / self.cfg.adc_max_reading;
        adc_volts / (self.cfg.r2_ohms / (self.cfg.r1_ohms + self.cfg.r2_ohms))
    }

    fn calibrate(&mut self, volts: f64) {
        if volts <= 0.0 || self.highest_volts.is_some_and(|h| volts <= h) {
            return;
        }
        // Only adopt a new peak once it is persisted, so the scale in use
        // always matches the stored one.
        match self.store.save_scalar(&self.cfg.calibration_key, volts) {
            Ok(()) => {
                log::debug!("new calibration peak {volts:.3} V");
                self.highest_volts = Some(volts);
            }
            Err(e) => log::warn!("could not persist calibration peak {volts:.3} V: {e}"),
        }
    }
}

impl<A: AdcChannel, K: SettingsStore> IndexSource for SolarIndexSensor<A, K> {
    fn read_index(&mut self) -> f64 {
        let raw = match self.adc.read_raw() {
            Ok(raw) => raw,
            Err(e) => {
                log::debug!("ADC read failed: {e}");
                return SENSOR_FAULT;
            }
        };
        let volts = self.volts_from_raw(raw);
        if !volts.is_finite() {
            return SENSOR_FAULT;
        }
        self.calibrate(volts);
        match self.highest_volts {
            Some(peak) if peak > 0.0 => (MAX_INDEX_VALUE * volts / peak).clamp(0.0, MAX_INDEX_VALUE),
            _ => SENSOR_FAULT,
        }
    }
}
