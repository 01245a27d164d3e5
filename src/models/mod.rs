//! Forecasting models.

mod traits;

pub mod arima;

pub use arima::{AutoARIMA, AutoARIMAConfig, InformationCriterion};
pub use traits::{BoxedForecaster, Forecaster};
