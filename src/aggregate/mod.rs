//! Time aggregation of raw observations into regular series.
//!
//! [`summarize_by_time`] floors timestamps to a [`Rule`](crate::core::Rule),
//! crosses the buckets with optional group columns, reduces each value
//! column with an [`AggFunc`] and reshapes the result into a wide or long
//! [`Summary`].

mod agg_func;
mod summarize;

pub use agg_func::AggFunc;
pub use summarize::{
    summarize_by_time, ColumnKey, RowKey, SummarizeOptions, Summary, SummaryColumn, TimeFormat,
};
