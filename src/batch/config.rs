//! Configuration of a batch forecast run.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::aggregate::Summary;
use crate::core::{Rule, TimeKey};
use crate::error::{Error, Result};
use crate::models::{AutoARIMAConfig, InformationCriterion};

/// Seasonal periods accepted by the forecaster.
pub const SUPPORTED_SEASONAL_PERIODS: [usize; 7] = [1, 3, 4, 6, 7, 12, 24];

/// What to do when one series cannot be fitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the batch and return the error.
    #[default]
    Abort,
    /// Record the failure, log it and continue with the next series.
    Skip,
}

/// Options for [`forecast_with`](crate::batch::forecast_with).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Number of future buckets to predict.
    pub horizon: usize,
    pub seasonal_period: usize,
    /// Coverage of the prediction interval, strictly between 0 and 1.
    pub confidence_level: f64,
    pub failure_policy: FailurePolicy,
    /// Fit series on the rayon thread pool.
    pub parallel: bool,
    /// Per-series time budget for the order search.
    pub fit_timeout_ms: Option<u64>,
    pub max_p: usize,
    pub max_d: usize,
    pub max_q: usize,
    pub max_seasonal_p: usize,
    pub max_seasonal_d: usize,
    pub max_seasonal_q: usize,
    pub criterion: InformationCriterion,
    /// Stepwise order search instead of the full grid.
    pub stepwise: bool,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        let search = AutoARIMAConfig::default();
        Self {
            horizon: 12,
            seasonal_period: 12,
            confidence_level: 0.95,
            failure_policy: FailurePolicy::Abort,
            parallel: false,
            fit_timeout_ms: None,
            max_p: search.max_p,
            max_d: search.max_d,
            max_q: search.max_q,
            max_seasonal_p: search.max_cap_p,
            max_seasonal_d: search.max_cap_d,
            max_seasonal_q: search.max_cap_q,
            criterion: search.criterion,
            stepwise: search.stepwise,
        }
    }
}

impl ForecastConfig {
    pub fn new(horizon: usize, seasonal_period: usize, confidence_level: f64) -> Self {
        Self {
            horizon,
            seasonal_period,
            confidence_level,
            ..Default::default()
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_fit_timeout(mut self, timeout: Duration) -> Self {
        self.fit_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Set maximum non-seasonal orders.
    pub fn with_max_orders(mut self, max_p: usize, max_d: usize, max_q: usize) -> Self {
        self.max_p = max_p;
        self.max_d = max_d;
        self.max_q = max_q;
        self
    }

    /// Set maximum seasonal orders.
    pub fn with_seasonal_orders(mut self, max_p: usize, max_d: usize, max_q: usize) -> Self {
        self.max_seasonal_p = max_p;
        self.max_seasonal_d = max_d;
        self.max_seasonal_q = max_q;
        self
    }

    pub fn with_criterion(mut self, criterion: InformationCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_stepwise(mut self, stepwise: bool) -> Self {
        self.stepwise = stepwise;
        self
    }

    /// Check the parameters on their own.
    pub fn validate(&self) -> Result<()> {
        if self.horizon == 0 {
            return Err(Error::invalid("horizon must be positive"));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(Error::invalid(format!(
                "confidence_level must be in (0, 1), got {}",
                self.confidence_level
            )));
        }
        if !SUPPORTED_SEASONAL_PERIODS.contains(&self.seasonal_period) {
            return Err(Error::invalid(format!(
                "seasonal_period must be one of {SUPPORTED_SEASONAL_PERIODS:?}, got {}",
                self.seasonal_period
            )));
        }
        Ok(())
    }

    /// Check the parameters against the summary they will be applied to.
    pub fn validate_for(&self, summary: &Summary) -> Result<()> {
        self.validate()?;

        let rule = summary
            .rule()
            .ok_or_else(|| Error::invalid("summary has no time index; aggregate with a date column"))?;
        if !summary.is_wide() {
            return Err(Error::invalid(
                "summary must be in wide format with one column per series",
            ));
        }
        if summary.num_columns() == 0 {
            return Err(Error::invalid("summary has no series columns"));
        }
        if !rule.seasonal_periods().contains(&self.seasonal_period) {
            return Err(Error::invalid(format!(
                "seasonal_period {} is not valid for rule {rule}; expected one of {:?}",
                self.seasonal_period,
                rule.seasonal_periods()
            )));
        }
        check_contiguous(summary, rule)
    }

    /// Order-search configuration for one series.
    pub fn search_config(&self) -> AutoARIMAConfig {
        let mut config = AutoARIMAConfig::default()
            .with_seasonal_period(self.seasonal_period)
            .with_max_orders(self.max_p, self.max_d, self.max_q)
            .with_seasonal_orders(self.max_seasonal_p, self.max_seasonal_d, self.max_seasonal_q)
            .with_criterion(self.criterion);
        config.stepwise = self.stepwise;
        if let Some(ms) = self.fit_timeout_ms {
            config = config.with_time_budget(Duration::from_millis(ms));
        }
        config
    }
}

/// Buckets with no observations are absent from a summary; a gap would make
/// seasonal lags and forecast steps land on the wrong bucket.
fn check_contiguous(summary: &Summary, rule: Rule) -> Result<()> {
    let index = summary.time_index().unwrap_or_default();
    for pair in index.windows(2) {
        let expected = match pair[0] {
            TimeKey::Date(date) => TimeKey::Date(rule.next(date)),
            TimeKey::Period(period) => TimeKey::Period(period.succ()),
        };
        if pair[1] != expected {
            return Err(Error::invalid(format!(
                "time index has a gap between {} and {}; every {rule} bucket needs a row",
                pair[0], pair[1]
            )));
        }
    }
    Ok(())
}
