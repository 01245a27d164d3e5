//! Core data structures: tables, calendar keys, series and forecasts.

mod forecast;
mod period;
mod rule;
mod table;
mod time_series;

pub use forecast::Forecast;
pub use period::{Period, PeriodFreq, TimeKey};
pub use rule::Rule;
pub use table::{Column, Table};
pub use time_series::TimeSeries;
