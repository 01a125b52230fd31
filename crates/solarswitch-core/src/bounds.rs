use serde::{Deserialize, Serialize};

/// Upper end of the normalized solar index range.
pub const MAX_INDEX_VALUE: f64 = 1000.0;

/// Acceptable range for the solar index. `max >= min` must hold; a zero-width
/// band (`max == min`) is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBounds {
    pub max: f64,
    pub min: f64,
}

impl ThresholdBounds {
    pub const fn new(max: f64, min: f64) -> Self {
        Self { max, min }
    }

    /// Only a lower bound; the upper bound sits at the top of the index range.
    pub const fn min_only(min: f64) -> Self {
        Self { max: MAX_INDEX_VALUE, min }
    }

    pub fn is_ordered(&self) -> bool {
        self.max >= self.min
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl Default for ThresholdBounds {
    fn default() -> Self {
        Self { max: MAX_INDEX_VALUE, min: 0.0 }
    }
}

/// Result of an accepted setter call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    Applied,
    /// Value equal to the current one; nothing was touched.
    Unchanged,
}

impl SetOutcome {
    pub fn is_applied(self) -> bool {
        matches!(self, SetOutcome::Applied)
    }
}
