//! # salescast
//!
//! Time-bucket aggregation and per-series seasonal ARIMA forecasting for
//! transactional sales data.
//!
//! [`summarize_by_time`] rolls raw order rows up into regular buckets
//! (day, month, quarter, year), optionally split by group columns and
//! pivoted one column per series. [`forecast`] then fits an automatically
//! selected seasonal ARIMA model to every series independently and returns
//! the history followed by point forecasts and prediction intervals.

#![allow(clippy::upper_case_acronyms)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::needless_range_loop)]

pub mod aggregate;
pub mod batch;
pub mod core;
pub mod detection;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod sink;
pub mod utils;

pub use aggregate::summarize_by_time;
pub use batch::{forecast, forecast_with};
pub use error::{Error, ModelError, ModelResult, Result};

pub mod prelude {
    pub use crate::aggregate::{summarize_by_time, AggFunc, SummarizeOptions, Summary, TimeFormat};
    pub use crate::batch::{forecast, forecast_with, FailurePolicy, ForecastConfig, ForecastTable};
    pub use crate::core::{Column, Forecast, Period, Rule, Table, TimeKey, TimeSeries};
    pub use crate::error::{Error, ModelError, Result};
    pub use crate::models::{AutoARIMA, Forecaster};
    pub use crate::pipeline::{run_pipeline, PipelineConfig};
    pub use crate::sink::{ForecastSink, IfExists, MemorySink};
}
