/// Input validation for index samples and configuration values.
use crate::bounds::{ThresholdBounds, MAX_INDEX_VALUE};
use crate::error::ConfigError;

pub const MIN_INTERVAL_MINUTES: u32 = 1;
pub const MAX_INTERVAL_MINUTES: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorFault {
    /// Negative sentinel reported by the sensor.
    Sentinel(f64),
    NotFinite,
}

/// Accept a raw index sample, rejecting sentinels and NaN/Inf.
pub fn validate_sample(sample: f64) -> Result<f64, SensorFault> {
    if !sample.is_finite() {
        return Err(SensorFault::NotFinite);
    }
    if sample < 0.0 {
        return Err(SensorFault::Sentinel(sample));
    }
    Ok(sample)
}

/// Ordering check only; used by the monitor, which accepts any ordered pair.
pub fn validate_ordering(bounds: &ThresholdBounds) -> Result<(), ConfigError> {
    if !bounds.max.is_finite() || !bounds.min.is_finite() {
        return Err(ConfigError::InvalidValue("bounds"));
    }
    if !bounds.is_ordered() {
        return Err(ConfigError::InvalidBounds { max: bounds.max, min: bounds.min });
    }
    Ok(())
}

/// Full check applied to operator-supplied bounds: `0 <= min <= max <= MAX_INDEX_VALUE`.
pub fn validate_bounds(bounds: &ThresholdBounds) -> Result<(), ConfigError> {
    validate_ordering(bounds)?;
    if bounds.min < 0.0 || bounds.max > MAX_INDEX_VALUE {
        return Err(ConfigError::BoundsOutOfRange {
            max: bounds.max,
            min: bounds.min,
            limit: MAX_INDEX_VALUE,
        });
    }
    Ok(())
}

pub fn validate_interval(minutes: u32) -> Result<(), ConfigError> {
    if !(MIN_INTERVAL_MINUTES..=MAX_INTERVAL_MINUTES).contains(&minutes) {
        return Err(ConfigError::IntervalOutOfRange(minutes));
    }
    Ok(())
}

/// Counts consecutive failures and opens after `threshold` of them.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    failure_count: u32,
    last_failure_ms: Option<u64>,
    threshold: u32,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(5)
    }
}

impl CircuitBreaker {
    pub fn new(threshold: u32) -> Self {
        Self {
            failure_count: 0,
            last_failure_ms: None,
            threshold: threshold.max(1),
        }
    }

    /// Record a failure. Returns true on the call that opens the breaker.
    pub fn trip(&mut self, now_ms: u64) -> bool {
        self.failure_count = self.failure_count.saturating_add(1);
        self.last_failure_ms = Some(now_ms);
        self.failure_count == self.threshold
    }

    pub fn is_open(&self) -> bool {
        self.failure_count >= self.threshold
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn last_failure_ms(&self) -> Option<u64> {
        self.last_failure_ms
    }

    pub fn reset(&mut self) {
        self.failure_count = 0;
        self.last_failure_ms = None;
    }
}
