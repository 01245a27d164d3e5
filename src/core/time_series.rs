//! TimeSeries data structure: one named series of a summary.

use crate::core::period::TimeKey;
use crate::error::{ModelError, ModelResult};

/// A univariate series indexed by time keys.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    label: String,
    index: Vec<TimeKey>,
    values: Vec<f64>,
}

impl TimeSeries {
    /// Create a series, validating that the index is strictly increasing and
    /// matches the values in length.
    pub fn new(label: impl Into<String>, index: Vec<TimeKey>, values: Vec<f64>) -> ModelResult<Self> {
        if index.len() != values.len() {
            return Err(ModelError::InvalidParameter(format!(
                "index has {} entries but there are {} values",
                index.len(),
                values.len()
            )));
        }

        if index.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ModelError::InvalidParameter(
                "time index must be strictly increasing".to_string(),
            ));
        }

        Ok(Self {
            label: label.into(),
            index,
            values,
        })
    }

    /// Get the number of observations.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the series is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn index(&self) -> &[TimeKey] {
        &self.index
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn last_key(&self) -> Option<TimeKey> {
        self.index.last().copied()
    }

    /// Check for NaN or infinite values.
    pub fn has_missing_values(&self) -> bool {
        self.values.iter().any(|v| !v.is_finite())
    }

    /// Check whether every observation is the same value.
    pub fn is_constant(&self) -> bool {
        match self.values.first() {
            Some(first) => self.values.iter().all(|v| (v - first).abs() <= f64::EPSILON * first.abs().max(1.0)),
            None => true,
        }
    }
}
