//! Logarithmic parameter grids

use crate::core::{ParamId, Result, SVMError};
use serde::{Deserialize, Serialize};

/// Relative slack on the upper bound so `max` survives rounding in `min * step^k`
const UPPER_BOUND_TOLERANCE: f64 = 1e-9;

/// Most values a single grid may enumerate
pub const MAX_GRID_VALUES: usize = 1000;

/// Search range `min, min*step, min*step^2, ... <= max` for one hyperparameter
///
/// A grid with `step <= 1` or `max <= min` is inactive and pins the value at `min`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub min_val: f64,
    pub max_val: f64,
    pub log_step: f64,
}

impl ParamGrid {
    pub fn new(min_val: f64, max_val: f64, log_step: f64) -> Self {
        Self {
            min_val,
            max_val,
            log_step,
        }
    }

    /// Inactive grid holding `value`
    pub fn fixed(value: f64) -> Self {
        Self::new(value, value, 0.0)
    }

    /// Built-in search range for `id`
    pub fn default_for(id: ParamId) -> Self {
        match id {
            ParamId::C => Self::new(0.1, 500.0, 5.0),
            ParamId::Gamma => Self::new(1e-5, 0.6, 15.0),
            ParamId::P => Self::new(0.01, 100.0, 7.0),
            ParamId::Nu => Self::new(0.01, 0.2, 3.0),
            ParamId::Coef => Self::new(0.1, 300.0, 14.0),
            ParamId::Degree => Self::new(0.01, 4.0, 7.0),
        }
    }

    pub fn is_active(&self) -> bool {
        self.log_step > 1.0 && self.max_val > self.min_val
    }

    /// Reject an active grid that cannot be enumerated
    pub fn validate(&self, id: ParamId) -> Result<()> {
        if !self.is_active() {
            return Ok(());
        }
        if !(self.min_val > 0.0 && self.max_val.is_finite() && self.log_step.is_finite()) {
            return Err(SVMError::InvalidArgument(format!(
                "{id} grid ({}, {}, {}) needs a positive minimum and finite bounds",
                self.min_val, self.max_val, self.log_step
            )));
        }
        let steps = (self.upper_limit() / self.min_val).ln() / self.log_step.ln();
        if !(steps < MAX_GRID_VALUES as f64) {
            return Err(SVMError::InvalidArgument(format!(
                "{id} grid ({}, {}, {}) enumerates more than {MAX_GRID_VALUES} values",
                self.min_val, self.max_val, self.log_step
            )));
        }
        Ok(())
    }

    fn upper_limit(&self) -> f64 {
        self.max_val * (1.0 + UPPER_BOUND_TOLERANCE)
    }

    /// Values visited by the search, ascending
    pub fn values(&self) -> Vec<f64> {
        if !self.is_active() {
            return vec![self.min_val];
        }
        let limit = self.upper_limit();
        let mut values = Vec::new();
        let mut value = self.min_val;
        while value <= limit && values.len() < MAX_GRID_VALUES {
            values.push(value);
            value *= self.log_step;
        }
        values
    }
}
