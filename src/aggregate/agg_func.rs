//! Reductions applied to each bucket/group cell.

use crate::error::{Error, Result};
use crate::utils::stats;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Aggregation function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggFunc {
    #[default]
    Sum,
    #[serde(alias = "avg")]
    Mean,
    Median,
    Min,
    Max,
    Count,
    First,
    Last,
    Std,
}

impl AggFunc {
    pub fn name(&self) -> &'static str {
        match self {
            AggFunc::Sum => "sum",
            AggFunc::Mean => "mean",
            AggFunc::Median => "median",
            AggFunc::Min => "min",
            AggFunc::Max => "max",
            AggFunc::Count => "count",
            AggFunc::First => "first",
            AggFunc::Last => "last",
            AggFunc::Std => "std",
        }
    }

    /// Reduce the values of one cell.
    ///
    /// NaN values are skipped; infinities take part. `None` means the cell
    /// has no defined result and is later replaced by the fill value; `Sum`
    /// and `Count` of a cell without values are 0.
    pub fn reduce(&self, values: &[f64]) -> Option<f64> {
        let present: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();

        match self {
            AggFunc::Sum => Some(present.iter().sum()),
            AggFunc::Count => Some(present.len() as f64),
            _ if present.is_empty() => None,
            AggFunc::Mean => Some(stats::mean(&present)),
            AggFunc::Median => Some(stats::median(&present)),
            AggFunc::Min => present.iter().copied().reduce(f64::min),
            AggFunc::Max => present.iter().copied().reduce(f64::max),
            AggFunc::First => present.first().copied(),
            AggFunc::Last => present.last().copied(),
            AggFunc::Std => {
                let sd = stats::std_dev(&present);
                sd.is_finite().then_some(sd)
            }
        }
    }
}

impl fmt::Display for AggFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AggFunc {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum" => Ok(AggFunc::Sum),
            "mean" | "avg" => Ok(AggFunc::Mean),
            "median" => Ok(AggFunc::Median),
            "min" => Ok(AggFunc::Min),
            "max" => Ok(AggFunc::Max),
            "count" => Ok(AggFunc::Count),
            "first" => Ok(AggFunc::First),
            "last" => Ok(AggFunc::Last),
            "std" => Ok(AggFunc::Std),
            other => Err(Error::invalid(format!("unsupported aggregation '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn reductions() {
        let v = [3.0, 1.0, 2.0, 6.0];
        assert_eq!(AggFunc::Sum.reduce(&v), Some(12.0));
        assert_eq!(AggFunc::Mean.reduce(&v), Some(3.0));
        assert_eq!(AggFunc::Median.reduce(&v), Some(2.5));
        assert_eq!(AggFunc::Min.reduce(&v), Some(1.0));
        assert_eq!(AggFunc::Max.reduce(&v), Some(6.0));
        assert_eq!(AggFunc::Count.reduce(&v), Some(4.0));
        assert_eq!(AggFunc::First.reduce(&v), Some(3.0));
        assert_eq!(AggFunc::Last.reduce(&v), Some(6.0));
        assert_relative_eq!(AggFunc::Std.reduce(&v).unwrap(), (14.0_f64 / 3.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn nan_values_are_skipped() {
        let v = [f64::NAN, 4.0, 2.0];
        assert_eq!(AggFunc::Sum.reduce(&v), Some(6.0));
        assert_eq!(AggFunc::Count.reduce(&v), Some(2.0));
        assert_eq!(AggFunc::First.reduce(&v), Some(4.0));
    }

    #[test]
    fn infinities_are_kept() {
        let v = [f64::INFINITY, 2.0];
        assert_eq!(AggFunc::Sum.reduce(&v), Some(f64::INFINITY));
        assert_eq!(AggFunc::Count.reduce(&v), Some(2.0));
        assert_eq!(AggFunc::Max.reduce(&v), Some(f64::INFINITY));
        assert_eq!(AggFunc::Median.reduce(&[f64::INFINITY, 1.0, f64::INFINITY]), Some(f64::INFINITY));
        assert_eq!(AggFunc::Min.reduce(&[f64::NEG_INFINITY, f64::NAN, 1.0]), Some(f64::NEG_INFINITY));
    }

    #[test]
    fn empty_cells() {
        assert_eq!(AggFunc::Sum.reduce(&[f64::NAN]), Some(0.0));
        assert_eq!(AggFunc::Mean.reduce(&[]), None);
        assert_eq!(AggFunc::Std.reduce(&[1.0]), None);
    }

    #[test]
    fn sum_is_order_independent() {
        let a = [1.5, 2.25, 10.0];
        let b = [10.0, 1.5, 2.25];
        assert_eq!(AggFunc::Sum.reduce(&a), AggFunc::Sum.reduce(&b));
        assert_eq!(AggFunc::Median.reduce(&a), AggFunc::Median.reduce(&b));
    }

    #[test]
    fn parse_names() {
        assert_eq!("SUM".parse::<AggFunc>().unwrap(), AggFunc::Sum);
        assert_eq!("avg".parse::<AggFunc>().unwrap(), AggFunc::Mean);
        assert!("mode".parse::<AggFunc>().is_err());
    }
}
