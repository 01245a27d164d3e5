//! Numerical helpers shared by the models.

pub mod optimization;
pub mod stats;

pub use optimization::{nelder_mead, NelderMeadConfig, NelderMeadResult};
pub use stats::{critical_value, quantile_normal};
