//! Detection utilities for aggregated series.
//!
//! Flags unusual bucket totals before they are handed to the forecaster.

mod outlier;

pub use outlier::{detect_outliers, IqrFences, OutlierSide};
