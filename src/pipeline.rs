//! End-to-end run: aggregate raw rows, then forecast every series.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregate::{summarize_by_time, SummarizeOptions};
use crate::batch::{forecast_with, ForecastConfig, ForecastTable};
use crate::core::Table;
use crate::error::{Error, Result};

/// Configuration of [`run_pipeline`], loadable from TOML.
///
/// ```
/// use salescast::pipeline::PipelineConfig;
///
/// let config = PipelineConfig::from_toml_str(r#"
///     series_id = "Total Revenue"
///
///     [summarize]
///     value_columns = ["total_price"]
///     date_column = "order_date"
///     rule = "MS"
///
///     [forecast]
///     horizon = 12
///     seasonal_period = 12
/// "#)?;
/// assert_eq!(config.forecast.horizon, 12);
/// assert_eq!(config.series_id.as_deref(), Some("Total Revenue"));
/// # Ok::<(), salescast::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Fixed id for the single series of an ungrouped run.
    pub series_id: Option<String>,
    pub summarize: SummarizeOptions,
    pub forecast: ForecastConfig,
}

impl PipelineConfig {
    pub fn new(summarize: SummarizeOptions, forecast: ForecastConfig) -> Self {
        Self {
            series_id: None,
            summarize,
            forecast,
        }
    }

    pub fn with_series_id(mut self, id: impl Into<String>) -> Self {
        self.series_id = Some(id.into());
        self
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}

/// Aggregate `table` and forecast the resulting series.
///
/// A `series_id` override requires the aggregation to yield exactly one
/// series.
pub fn run_pipeline(table: &Table, config: &PipelineConfig) -> Result<ForecastTable> {
    info!(rows = table.num_rows(), rule = %config.summarize.rule, "aggregating");
    let summary = summarize_by_time(table, &config.summarize)?;
    info!(
        buckets = summary.num_rows(),
        series = summary.num_columns(),
        "aggregated"
    );

    if config.series_id.is_some() && summary.num_columns() != 1 {
        return Err(Error::invalid(format!(
            "series_id override needs exactly one series, got {}",
            summary.num_columns()
        )));
    }

    let mut result = forecast_with(&summary, &config.forecast)?;
    if let Some(id) = &config.series_id {
        for record in &mut result.records {
            record.series_id.clone_from(id);
        }
        for model in &mut result.models {
            model.series_id.clone_from(id);
        }
        for failure in &mut result.failures {
            failure.series_id.clone_from(id);
        }
    }
    Ok(result)
}
