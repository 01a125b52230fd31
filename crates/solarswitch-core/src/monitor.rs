//! Time-in-state accounting for the solar index.
//!
//! Each of the three conditions (above max, below min, within bounds) is an
//! independent window tracker. A window opens when a sample enters its
//! condition and commits its elapsed time to the running total when a later
//! sample leaves it. Totals are zeroed at each accounting boundary by
//! [`ThresholdMonitor::reset_accumulators`], which leaves open windows open.

use std::time::Duration;

use serde::Serialize;

use crate::bounds::{SetOutcome, ThresholdBounds};
use crate::error::ConfigError;
use crate::validation::{validate_ordering, validate_sample, SensorFault};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    AboveMax,
    BelowMin,
    WithinBounds,
}

impl Condition {
    pub fn classify(sample: f64, bounds: &ThresholdBounds) -> Self {
        if bounds.contains(sample) {
            Condition::WithinBounds
        } else if sample > bounds.max {
            Condition::AboveMax
        } else {
            Condition::BelowMin
        }
    }
}

pub(crate) fn elapsed(now_ms: u64, since_ms: u64) -> Duration {
    Duration::from_millis(now_ms.saturating_sub(since_ms))
}

#[derive(Debug, Clone, Default)]
struct WindowTracker {
    window_start_ms: Option<u64>,
    accumulated: Duration,
    boundary_at_entry: Option<f64>,
}

impl WindowTracker {
    fn observe(&mut self, active: bool, now_ms: u64, boundary: Option<f64>) {
        match (active, self.window_start_ms) {
            (true, None) => {
                self.window_start_ms = Some(now_ms);
                self.boundary_at_entry = boundary;
            }
            (false, Some(start)) => {
                self.accumulated += elapsed(now_ms, start);
                self.window_start_ms = None;
            }
            _ => {}
        }
    }

    /// Committed time plus the live part of an open window.
    fn total(&self, now_ms: u64) -> Duration {
        match self.window_start_ms {
            Some(start) => self.accumulated + elapsed(now_ms, start),
            None => self.accumulated,
        }
    }

    fn is_open(&self) -> bool {
        self.window_start_ms.is_some()
    }

    fn snapshot(&self, now_ms: u64) -> ConditionSnapshot {
        ConditionSnapshot {
            committed: self.accumulated,
            total: self.total(now_ms),
            open_since_ms: self.window_start_ms,
            boundary_at_entry: self.boundary_at_entry,
        }
    }
}

/// Per-condition view used by diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionSnapshot {
    /// Time from closed windows only.
    pub committed: Duration,
    /// `committed` plus the live part of an open window.
    pub total: Duration,
    pub open_since_ms: Option<u64>,
    /// Bound in force when the most recent window opened.
    pub boundary_at_entry: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorSnapshot {
    pub taken_at_ms: u64,
    pub bounds: ThresholdBounds,
    pub last_sample: Option<f64>,
    pub condition: Option<Condition>,
    pub above_max: ConditionSnapshot,
    pub below_min: ConditionSnapshot,
    pub within_bounds: ConditionSnapshot,
}

#[derive(Debug, Clone, Default)]
pub struct ThresholdMonitor {
    bounds: ThresholdBounds,
    last_sample: Option<f64>,
    last_fault: Option<SensorFault>,
    above_max: WindowTracker,
    below_min: WindowTracker,
    within_bounds: WindowTracker,
}

impl ThresholdMonitor {
    /// Unusable initial bounds fall back to the permissive default.
    pub fn new(bounds: ThresholdBounds) -> Self {
        let mut monitor = Self::default();
        if let Err(e) = monitor.set_bounds(bounds) {
            log::warn!("{e}, monitoring with {:?}", monitor.bounds);
        }
        monitor
    }

    pub fn bounds(&self) -> ThresholdBounds {
        self.bounds
    }

    pub fn last_sample(&self) -> Option<f64> {
        self.last_sample
    }

    /// Why the most recent sample was rejected; cleared by the next
    /// accepted one.
    pub fn last_fault(&self) -> Option<SensorFault> {
        self.last_fault
    }

    /// Replace the bounds if they are ordered and differ from the current
    /// ones. Windows that are already open keep the bound captured at entry.
    pub fn set_bounds(&mut self, bounds: ThresholdBounds) -> Result<SetOutcome, ConfigError> {
        validate_ordering(&bounds)?;
        if bounds == self.bounds {
            return Ok(SetOutcome::Unchanged);
        }
        self.bounds = bounds;
        Ok(SetOutcome::Applied)
    }

    /// Feed one sample taken at `now_ms`. Sentinel and non-finite samples
    /// are ignored and return `None`; otherwise the active condition is
    /// returned.
    pub fn update(&mut self, sample: f64, now_ms: u64) -> Option<Condition> {
        let sample = match validate_sample(sample) {
            Ok(sample) => sample,
            Err(fault) => {
                self.last_fault = Some(fault);
                return None;
            }
        };
        let condition = Condition::classify(sample, &self.bounds);

        self.above_max.observe(
            condition == Condition::AboveMax,
            now_ms,
            Some(self.bounds.max),
        );
        self.below_min.observe(
            condition == Condition::BelowMin,
            now_ms,
            Some(self.bounds.min),
        );
        self.within_bounds
            .observe(condition == Condition::WithinBounds, now_ms, None);

        self.last_sample = Some(sample);
        self.last_fault = None;
        Some(condition)
    }

    /// Time spent above max and below min since the last reset, including
    /// the live part of whichever window is still open at `now_ms`.
    pub fn get_out_of_range_durations(&self, now_ms: u64) -> (Duration, Duration) {
        (self.above_max.total(now_ms), self.below_min.total(now_ms))
    }

    pub fn within_bounds_duration(&self, now_ms: u64) -> Duration {
        self.within_bounds.total(now_ms)
    }

    /// Condition of the currently open window, if any sample was accepted.
    pub fn current_condition(&self) -> Option<Condition> {
        if self.above_max.is_open() {
            Some(Condition::AboveMax)
        } else if self.below_min.is_open() {
            Some(Condition::BelowMin)
        } else if self.within_bounds.is_open() {
            Some(Condition::WithinBounds)
        } else {
            None
        }
    }

    /// Zero all totals. Open windows stay open from their original entry.
    pub fn reset_accumulators(&mut self) {
        self.above_max.accumulated = Duration::ZERO;
        self.below_min.accumulated = Duration::ZERO;
        self.within_bounds.accumulated = Duration::ZERO;
    }

    pub fn debug_snapshot(&self, now_ms: u64) -> MonitorSnapshot {
        MonitorSnapshot {
            taken_at_ms: now_ms,
            bounds: self.bounds,
            last_sample: self.last_sample,
            condition: self.current_condition(),
            above_max: self.above_max.snapshot(now_ms),
            below_min: self.below_min.snapshot(now_ms),
            within_bounds: self.within_bounds.snapshot(now_ms),
        }
    }
}
