//! Outlier detection utilities.
//!
//! Flags anomalous values with the interquartile range rule.

use crate::error::{Error, Result};
use crate::utils::stats::quantile;
use serde::{Deserialize, Serialize};

/// Which side of the IQR fences to flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlierSide {
    #[default]
    Both,
    Upper,
    Lower,
}

/// IQR fences computed for a series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IqrFences {
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
}

impl IqrFences {
    /// Compute fences `q1 - k * iqr` and `q3 + k * iqr`.
    ///
    /// Quartiles use linear interpolation between order statistics.
    pub fn compute(series: &[f64], iqr_multiplier: f64) -> Result<Self> {
        if !(iqr_multiplier > 0.0) {
            return Err(Error::invalid(format!(
                "iqr_multiplier must be positive, got {iqr_multiplier}"
            )));
        }
        let finite: Vec<f64> = series.iter().copied().filter(|x| x.is_finite()).collect();
        if finite.is_empty() {
            return Err(Error::invalid("cannot compute quartiles of an empty series"));
        }

        let q1 = quantile(&finite, 0.25);
        let q3 = quantile(&finite, 0.75);
        let iqr = q3 - q1;

        Ok(Self {
            q1,
            q3,
            lower: q1 - iqr_multiplier * iqr,
            upper: q3 + iqr_multiplier * iqr,
        })
    }
}

/// Flag outliers in `series`; the result has one entry per input value.
///
/// Values on a fence count as outliers. Non-finite values are never flagged.
pub fn detect_outliers(series: &[f64], iqr_multiplier: f64, how: OutlierSide) -> Result<Vec<bool>> {
    let fences = IqrFences::compute(series, iqr_multiplier)?;

    Ok(series
        .iter()
        .map(|&x| {
            let low = x <= fences.lower;
            let high = x >= fences.upper;
            match how {
                OutlierSide::Both => low || high,
                OutlierSide::Upper => high,
                OutlierSide::Lower => low,
            }
        })
        .collect())
}
