//! Per-series forecasting of an aggregated summary.
//!
//! Every column of a wide [`Summary`] is fitted with its own [`AutoARIMA`]
//! model; no state is shared between series. The per-series blocks are then
//! concatenated, in column order, into one long [`ForecastTable`].

mod config;
mod table;

pub use config::{FailurePolicy, ForecastConfig, SUPPORTED_SEASONAL_PERIODS};
pub use table::{ForecastRecord, ForecastTable, SeriesFailure, SeriesModel};

use tracing::{debug, info, warn};

use crate::aggregate::Summary;
use crate::core::{Rule, TimeKey, TimeSeries};
use crate::error::{Error, ModelResult, Result};
use crate::models::{AutoARIMA, Forecaster};

/// Forecast every series of `data` with default search settings.
///
/// # Example
/// ```
/// use salescast::aggregate::{summarize_by_time, SummarizeOptions, TimeFormat};
/// use salescast::batch::forecast;
/// use salescast::core::{Column, Rule, Table};
///
/// let dates: Vec<String> = (0..36)
///     .map(|i| format!("{}-{:02}-15", 2013 + i / 12, i % 12 + 1))
///     .collect();
/// let revenue: Vec<f64> = (0..36)
///     .map(|i| 500.0 + 4.0 * i as f64 + 60.0 * ((i % 12) as f64 - 5.5).abs() + (i as f64 * 2.3).sin())
///     .collect();
/// let table = Table::new()
///     .with_column("order_date", Column::text(dates))?
///     .parse_datetimes("order_date")?
///     .with_column("total_price", Column::Float(revenue))?;
///
/// let options = SummarizeOptions::new(["total_price"])
///     .date_column("order_date")
///     .rule(Rule::MonthStart)
///     .time_format(TimeFormat::Period);
/// let summary = summarize_by_time(&table, &options)?;
///
/// let result = forecast(&summary, 12, 12, 0.95)?;
/// assert_eq!(result.len(), 36 + 12);
/// assert!(result.interval_violations().is_empty());
/// # Ok::<(), salescast::Error>(())
/// ```
pub fn forecast(
    data: &Summary,
    horizon: usize,
    seasonal_period: usize,
    confidence_level: f64,
) -> Result<ForecastTable> {
    forecast_with(data, &ForecastConfig::new(horizon, seasonal_period, confidence_level))
}

/// Forecast every series of `data` with full control over the search.
pub fn forecast_with(data: &Summary, config: &ForecastConfig) -> Result<ForecastTable> {
    config.validate_for(data)?;
    let rule = data.rule().ok_or_else(|| Error::invalid("summary has no time index"))?;

    let n_series = data.num_columns();
    info!(
        series = n_series,
        observations = data.num_rows(),
        horizon = config.horizon,
        seasonal_period = config.seasonal_period,
        parallel = config.parallel,
        "forecasting summary"
    );

    let outcomes = fit_all(data, config, rule);

    let mut result = ForecastTable {
        rule: Some(rule),
        ..Default::default()
    };
    for (i, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(block) => {
                result.models.push(block.model);
                result.records.extend(block.records);
            }
            Err(error) => {
                let series_id = data.series_label(i);
                match config.failure_policy {
                    FailurePolicy::Abort => {
                        return Err(Error::Forecast {
                            series: series_id,
                            source: error,
                        })
                    }
                    FailurePolicy::Skip => {
                        warn!(series = %series_id, %error, "skipping series");
                        result.failures.push(SeriesFailure { series_id, error });
                    }
                }
            }
        }
    }

    let violations = result.interval_violations().len();
    if violations > 0 {
        warn!(violations, "prediction intervals do not bracket their forecasts");
    }
    info!(
        rows = result.len(),
        fitted = result.models.len(),
        skipped = result.failures.len(),
        "forecast complete"
    );
    Ok(result)
}

/// Records and model summary of one series.
struct SeriesBlock {
    records: Vec<ForecastRecord>,
    model: SeriesModel,
}

/// Fit every column; the outcome of column `i` lands in slot `i`.
#[cfg(feature = "parallel")]
fn fit_all(data: &Summary, config: &ForecastConfig, rule: Rule) -> Vec<ModelResult<SeriesBlock>> {
    use rayon::prelude::*;

    if config.parallel {
        (0..data.num_columns())
            .into_par_iter()
            .map(|i| forecast_series(data, i, config, rule))
            .collect()
    } else {
        (0..data.num_columns())
            .map(|i| forecast_series(data, i, config, rule))
            .collect()
    }
}

#[cfg(not(feature = "parallel"))]
fn fit_all(data: &Summary, config: &ForecastConfig, rule: Rule) -> Vec<ModelResult<SeriesBlock>> {
    if config.parallel {
        debug!("built without the parallel feature, fitting sequentially");
    }
    (0..data.num_columns())
        .map(|i| forecast_series(data, i, config, rule))
        .collect()
}

fn forecast_series(data: &Summary, i: usize, config: &ForecastConfig, rule: Rule) -> ModelResult<SeriesBlock> {
    let series = data.series(i)?;
    let mut model = AutoARIMA::with_config(config.search_config());
    model.fit(&series)?;
    let prediction = model.predict_with_intervals(config.horizon, config.confidence_level)?;

    let order = model
        .selected_full_order()
        .map(|o| o.to_string())
        .unwrap_or_else(|| model.name().to_string());
    debug!(series = series.label(), order = %order, "fitted series");

    let future = future_keys(&series, config.horizon, rule);
    let lower = prediction.lower().unwrap_or_default();
    let upper = prediction.upper().unwrap_or_default();

    let mut records = Vec::with_capacity(series.len() + config.horizon);
    for (key, value) in series.index().iter().zip(series.values()) {
        records.push(ForecastRecord {
            series_id: series.label().to_string(),
            time_bucket: *key,
            value: Some(*value),
            prediction: None,
            ci_lo: None,
            ci_hi: None,
        });
    }
    for (h, key) in future.into_iter().enumerate() {
        records.push(ForecastRecord {
            series_id: series.label().to_string(),
            time_bucket: key,
            value: None,
            prediction: prediction.primary().get(h).copied(),
            ci_lo: lower.get(h).copied(),
            ci_hi: upper.get(h).copied(),
        });
    }

    Ok(SeriesBlock {
        records,
        model: SeriesModel {
            series_id: series.label().to_string(),
            order,
            observations: series.len(),
        },
    })
}

/// The `horizon` buckets following the last observation of `series`.
fn future_keys(series: &TimeSeries, horizon: usize, rule: Rule) -> Vec<TimeKey> {
    let mut keys = Vec::with_capacity(horizon);
    let mut current = series.last_key();
    for _ in 0..horizon {
        let next = match current {
            Some(TimeKey::Date(d)) => TimeKey::Date(rule.next(d)),
            Some(TimeKey::Period(p)) => TimeKey::Period(p.succ()),
            None => break,
        };
        keys.push(next);
        current = Some(next);
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{summarize_by_time, SummarizeOptions, TimeFormat};
    use crate::core::{Column, Period, Table};
    use crate::error::ModelError;
    use chrono::NaiveDate;

    fn monthly_table(months: usize) -> Table {
        let mut dates = Vec::new();
        let mut price = Vec::new();
        let mut category = Vec::new();
        for i in 0..months {
            let date = format!("{}-{:02}-10", 2012 + i / 12, i % 12 + 1);
            let season = 40.0 * (2.0 * std::f64::consts::PI * (i % 12) as f64 / 12.0).cos();
            for (cat, scale) in [("Mountain", 1.0), ("Road", 0.6)] {
                dates.push(date.clone());
                price.push(scale * (400.0 + 3.0 * i as f64 + season) + (i as f64 * 1.9).sin());
                category.push(cat.to_string());
            }
        }
        Table::new()
            .with_column("order_date", Column::text(dates))
            .and_then(|t| t.parse_datetimes("order_date"))
            .and_then(|t| t.with_column("total_price", Column::Float(price)))
            .and_then(|t| t.with_column("category_1", Column::Text(category)))
            .unwrap()
    }

    fn summary(months: usize, format: TimeFormat) -> Summary {
        let options = SummarizeOptions::new(["total_price"])
            .date_column("order_date")
            .groups(["category_1"])
            .rule(Rule::MonthStart)
            .time_format(format);
        summarize_by_time(&monthly_table(months), &options).unwrap()
    }

    #[test]
    fn forecasts_each_series_in_column_order() {
        let data = summary(36, TimeFormat::Period);
        let result = forecast(&data, 6, 12, 0.9).unwrap();

        assert_eq!(result.series_ids(), vec!["Mountain", "Road"]);
        assert_eq!(result.len(), 2 * (36 + 6));
        assert_eq!(result.models().len(), 2);

        let road: Vec<_> = result.rows_for("Road").collect();
        assert!(road[..36].iter().all(|r| r.value.is_some() && r.prediction.is_none()));
        assert!(road[..36].iter().all(|r| r.ci_lo.is_none() && r.ci_hi.is_none()));
        assert!(road[36..].iter().all(|r| r.value.is_none() && r.prediction.is_some()));
        assert_eq!(
            road[36].time_bucket,
            TimeKey::Period(Period::month(2015, 1).unwrap())
        );
        assert!(road.windows(2).all(|w| w[0].time_bucket < w[1].time_bucket));
    }

    #[test]
    fn timestamp_index_continues_with_rule() {
        let data = summary(30, TimeFormat::Timestamp);
        let result = forecast(&data, 3, 12, 0.95).unwrap();

        let future: Vec<TimeKey> = result
            .rows_for("Mountain")
            .filter(|r| r.is_forecast())
            .map(|r| r.time_bucket)
            .collect();
        let expected: Vec<TimeKey> = [(2014, 7), (2014, 8), (2014, 9)]
            .iter()
            .map(|&(y, m)| TimeKey::Date(NaiveDate::from_ymd_opt(y, m, 1).unwrap()))
            .collect();
        assert_eq!(future, expected);
    }

    #[test]
    fn parallel_matches_sequential() {
        let data = summary(30, TimeFormat::Period);
        let sequential = forecast_with(&data, &ForecastConfig::new(4, 12, 0.95)).unwrap();
        let parallel =
            forecast_with(&data, &ForecastConfig::new(4, 12, 0.95).with_parallel(true)).unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn rejects_invalid_configuration() {
        let data = summary(24, TimeFormat::Period);
        for config in [
            ForecastConfig::new(0, 12, 0.95),
            ForecastConfig::new(12, 12, 1.5),
            ForecastConfig::new(12, 5, 0.95),
            ForecastConfig::new(12, 4, 0.95),
        ] {
            assert!(matches!(
                forecast_with(&data, &config),
                Err(Error::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn rejects_long_and_untimed_summaries() {
        let table = monthly_table(24);
        let long = SummarizeOptions::new(["total_price"])
            .date_column("order_date")
            .groups(["category_1"])
            .rule(Rule::MonthStart)
            .wide_format(false);
        let long = summarize_by_time(&table, &long).unwrap();
        assert!(matches!(forecast(&long, 12, 12, 0.95), Err(Error::InvalidArgument(_))));

        let untimed = SummarizeOptions::new(["total_price"]).groups(["category_1"]);
        let untimed = summarize_by_time(&table, &untimed).unwrap();
        assert!(matches!(forecast(&untimed, 12, 12, 0.95), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn rejects_summaries_with_missing_buckets() {
        // two rows per month; drop March and April of the first year
        let table = monthly_table(36);
        let kept: Vec<usize> = (0..table.num_rows()).filter(|i| !(4..8).contains(i)).collect();
        let table = table.select_rows(&kept);

        for format in [TimeFormat::Period, TimeFormat::Timestamp] {
            let options = SummarizeOptions::new(["total_price"])
                .date_column("order_date")
                .groups(["category_1"])
                .rule(Rule::MonthStart)
                .time_format(format);
            let data = summarize_by_time(&table, &options).unwrap();
            assert_eq!(data.num_rows(), 34);

            match forecast(&data, 6, 12, 0.9) {
                Err(Error::InvalidArgument(message)) => assert!(message.contains("gap"), "{message}"),
                other => panic!("expected invalid argument, got {other:?}"),
            }
        }
    }

    #[test]
    fn failure_policy_controls_short_series() {
        let data = summary(6, TimeFormat::Period);

        let err = forecast(&data, 3, 12, 0.95).unwrap_err();
        assert!(matches!(
            err,
            Error::Forecast {
                ref series,
                source: ModelError::InsufficientData { needed: 10, got: 6 },
            } if series == "Mountain"
        ));

        let config = ForecastConfig::new(3, 12, 0.95).with_failure_policy(FailurePolicy::Skip);
        let result = forecast_with(&data, &config).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.failures().len(), 2);
        assert_eq!(result.failures()[1].series_id, "Road");
    }
}
