//! Long-format result of a batch forecast.

use serde::Serialize;

use crate::core::{Column, Rule, Table, TimeKey};
use crate::error::{Error, ModelError, Result};

/// One row of a forecast table: a historical observation or a prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastRecord {
    pub series_id: String,
    pub time_bucket: TimeKey,
    /// Observed value; `None` on forecast rows.
    pub value: Option<f64>,
    /// Point prediction; `None` on historical rows.
    pub prediction: Option<f64>,
    pub ci_lo: Option<f64>,
    pub ci_hi: Option<f64>,
}

impl ForecastRecord {
    pub fn is_forecast(&self) -> bool {
        self.value.is_none()
    }

    /// Interval check for forecast rows: finite bounds with
    /// `ci_lo <= prediction <= ci_hi`.
    pub fn interval_is_valid(&self) -> bool {
        match (self.ci_lo, self.prediction, self.ci_hi) {
            (Some(lo), Some(pred), Some(hi)) => {
                lo.is_finite() && pred.is_finite() && hi.is_finite() && lo <= pred && pred <= hi
            }
            _ => !self.is_forecast(),
        }
    }
}

/// A series that could not be forecast under [`FailurePolicy::Skip`](super::FailurePolicy::Skip).
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesFailure {
    pub series_id: String,
    pub error: ModelError,
}

/// Model selected for one series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesModel {
    pub series_id: String,
    /// Selected order, e.g. `ARIMA(0,1,1)(0,1,1)[12]`.
    pub order: String,
    pub observations: usize,
}

/// Concatenated per-series forecasts in series order, each block running
/// from the first historical bucket through the last forecast bucket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForecastTable {
    pub(crate) records: Vec<ForecastRecord>,
    pub(crate) failures: Vec<SeriesFailure>,
    pub(crate) models: Vec<SeriesModel>,
    pub(crate) rule: Option<Rule>,
}

impl ForecastTable {
    pub fn records(&self) -> &[ForecastRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Series skipped because their fit failed.
    pub fn failures(&self) -> &[SeriesFailure] {
        &self.failures
    }

    pub fn models(&self) -> &[SeriesModel] {
        &self.models
    }

    /// Distinct series ids in output order.
    pub fn series_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for record in &self.records {
            if ids.last() != Some(&record.series_id.as_str()) {
                ids.push(&record.series_id);
            }
        }
        ids
    }

    pub fn rows_for<'a>(&'a self, series_id: &'a str) -> impl Iterator<Item = &'a ForecastRecord> + 'a {
        self.records.iter().filter(move |r| r.series_id == series_id)
    }

    /// Forecast rows whose interval is non-finite or does not bracket the
    /// prediction.
    pub fn interval_violations(&self) -> Vec<&ForecastRecord> {
        self.records.iter().filter(|r| !r.interval_is_valid()).collect()
    }

    /// Flatten into a table with columns
    /// `{id_column, date_column, value, prediction, ci_lo, ci_hi}`.
    ///
    /// Period keys become bucket dates; missing values become NaN.
    pub fn to_table(&self, id_column: &str, date_column: &str) -> Result<Table> {
        let dates = self
            .records
            .iter()
            .map(|r| match (r.time_bucket, self.rule) {
                (TimeKey::Date(d), _) => d,
                (TimeKey::Period(p), Some(rule)) => rule.bucket_of(&p),
                (TimeKey::Period(p), None) => p.start_date(),
            })
            .collect();
        let floats = |f: fn(&ForecastRecord) -> Option<f64>| {
            Column::Float(self.records.iter().map(|r| f(r).unwrap_or(f64::NAN)).collect())
        };

        Table::new()
            .with_column(id_column, Column::text(self.records.iter().map(|r| r.series_id.as_str())))?
            .with_column(date_column, Column::dates(dates))?
            .with_column("value", floats(|r| r.value))?
            .with_column("prediction", floats(|r| r.prediction))?
            .with_column("ci_lo", floats(|r| r.ci_lo))?
            .with_column("ci_hi", floats(|r| r.ci_hi))
    }

    /// Records as a JSON array; missing values are `null`.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.records).map_err(|e| Error::Serialization(e.to_string()))
    }
}
