//! ARIMA and SARIMA (Autoregressive Integrated Moving Average) models.
//!
//! This module provides:
//! - ARIMA models with various (p, d, q) specifications
//! - SARIMA models with seasonal components (P, D, Q)\[s\]
//! - AutoARIMA for automatic order selection

mod auto_arima;
mod diff;
mod model;
mod polynomial;

pub use auto_arima::{AutoARIMA, AutoARIMAConfig, InformationCriterion, MIN_OBSERVATIONS};
pub use diff::{
    difference, integrate, seasonal_difference, seasonal_integrate, suggest_differencing,
    suggest_seasonal_differencing,
};
pub use model::{ARIMASpec, SARIMASpec, ARIMA, SARIMA};
pub use polynomial::psi_weights;
