use std::collections::HashMap;

use crate::bounds::ThresholdBounds;
use crate::error::StorageError;

/// Non-volatile key/value storage for thresholds and calibration scalars.
///
/// A missing key is `Ok(None)`, not an error.
pub trait SettingsStore {
    fn load_bounds(&mut self, key: &str) -> Result<Option<ThresholdBounds>, StorageError>;
    fn save_bounds(&mut self, key: &str, bounds: &ThresholdBounds) -> Result<(), StorageError>;
    fn load_scalar(&mut self, key: &str) -> Result<Option<f64>, StorageError>;
    fn save_scalar(&mut self, key: &str, value: f64) -> Result<(), StorageError>;
}

impl<T: SettingsStore + ?Sized> SettingsStore for Box<T> {
    fn load_bounds(&mut self, key: &str) -> Result<Option<ThresholdBounds>, StorageError> {
        (**self).load_bounds(key)
    }
    fn save_bounds(&mut self, key: &str, bounds: &ThresholdBounds) -> Result<(), StorageError> {
        (**self).save_bounds(key, bounds)
    }
    fn load_scalar(&mut self, key: &str) -> Result<Option<f64>, StorageError> {
        (**self).load_scalar(key)
    }
    fn save_scalar(&mut self, key: &str, value: f64) -> Result<(), StorageError> {
        (**self).save_scalar(key, value)
    }
}

/// In-memory store. Counts writes so callers can check for redundant ones,
/// and can be told to fail to exercise the degraded paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    bounds: HashMap<String, ThresholdBounds>,
    scalars: HashMap<String, f64>,
    writes: usize,
    fail_writes: bool,
    fail_reads: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bounds(mut self, key: &str, bounds: ThresholdBounds) -> Self {
        self.bounds.insert(key.to_string(), bounds);
        self
    }

    pub fn with_scalar(mut self, key: &str, value: f64) -> Self {
        self.scalars.insert(key.to_string(), value);
        self
    }

    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn set_fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    /// Successful writes so far.
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn bounds(&self, key: &str) -> Option<ThresholdBounds> {
        self.bounds.get(key).copied()
    }

    pub fn scalar(&self, key: &str) -> Option<f64> {
        self.scalars.get(key).copied()
    }

    fn check_read(&self) -> Result<(), StorageError> {
        if self.fail_reads {
            return Err(StorageError::Backend("read failure injected".into()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Backend("write failure injected".into()));
        }
        Ok(())
    }
}

impl SettingsStore for MemoryStore {
    fn load_bounds(&mut self, key: &str) -> Result<Option<ThresholdBounds>, StorageError> {
        self.check_read()?;
        Ok(self.bounds.get(key).copied())
    }

    fn save_bounds(&mut self, key: &str, bounds: &ThresholdBounds) -> Result<(), StorageError> {
        self.check_write()?;
        self.bounds.insert(key.to_string(), *bounds);
        self.writes += 1;
        Ok(())
    }

    fn load_scalar(&mut self, key: &str) -> Result<Option<f64>, StorageError> {
        self.check_read()?;
        Ok(self.scalars.get(key).copied())
    }

    fn save_scalar(&mut self, key: &str, value: f64) -> Result<(), StorageError> {
        self.check_write()?;
        self.scalars.insert(key.to_string(), value);
        self.writes += 1;
        Ok(())
    }
}
