//! Automatic ARIMA and SARIMA model selection.

use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::{Forecast, TimeSeries};
use crate::error::{ModelError, ModelResult};
use crate::models::arima::diff::{seasonal_difference, suggest_differencing, suggest_seasonal_differencing};
use crate::models::arima::model::{SARIMASpec, ARIMA, SARIMA};
use crate::models::Forecaster;

/// Fewest observations AutoARIMA will fit.
pub const MIN_OBSERVATIONS: usize = 10;

/// Information criterion used to rank candidate models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InformationCriterion {
    Aic,
    #[default]
    Aicc,
    Bic,
}

impl fmt::Display for InformationCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Aic => "AIC",
            Self::Aicc => "AICc",
            Self::Bic => "BIC",
        })
    }
}

/// Configuration for AutoARIMA.
#[derive(Debug, Clone)]
pub struct AutoARIMAConfig {
    /// Maximum non-seasonal AR order to consider.
    pub max_p: usize,
    /// Maximum non-seasonal MA order to consider.
    pub max_q: usize,
    /// Maximum non-seasonal differencing order.
    pub max_d: usize,
    /// Maximum seasonal AR order.
    pub max_cap_p: usize,
    /// Maximum seasonal MA order.
    pub max_cap_q: usize,
    /// Maximum seasonal differencing order.
    pub max_cap_d: usize,
    /// Seasonal period (0 or 1 for non-seasonal).
    pub seasonal_period: usize,
    /// Use stepwise search (faster) vs exhaustive.
    pub stepwise: bool,
    /// Criterion minimised during selection.
    pub criterion: InformationCriterion,
    /// Upper bound on the number of candidate fits.
    pub max_models: usize,
    /// Stop evaluating new candidates once this much time has passed.
    pub time_budget: Option<Duration>,
}

impl Default for AutoARIMAConfig {
    fn default() -> Self {
        Self {
            max_p: 5,
            max_q: 5,
            max_d: 2,
            max_cap_p: 2,
            max_cap_q: 2,
            max_cap_d: 1,
            seasonal_period: 0,
            stepwise: true,
            criterion: InformationCriterion::Aicc,
            max_models: 94,
            time_budget: None,
        }
    }
}

impl AutoARIMAConfig {
    /// Set maximum non-seasonal orders.
    pub fn with_max_orders(mut self, max_p: usize, max_d: usize, max_q: usize) -> Self {
        self.max_p = max_p;
        self.max_d = max_d;
        self.max_q = max_q;
        self
    }

    /// Set maximum seasonal orders.
    pub fn with_seasonal_orders(mut self, max_p: usize, max_d: usize, max_q: usize) -> Self {
        self.max_cap_p = max_p;
        self.max_cap_d = max_d;
        self.max_cap_q = max_q;
        self
    }

    /// Set seasonal period.
    pub fn with_seasonal_period(mut self, period: usize) -> Self {
        self.seasonal_period = period;
        self
    }

    pub fn with_criterion(mut self, criterion: InformationCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    /// Use exhaustive search instead of stepwise.
    pub fn exhaustive(mut self) -> Self {
        self.stepwise = false;
        self
    }

    fn period(&self) -> usize {
        if self.seasonal_period > 1 {
            self.seasonal_period
        } else {
            0
        }
    }
}

/// Selected model type.
#[derive(Debug, Clone)]
enum SelectedModel {
    ARIMA(ARIMA),
    SARIMA(SARIMA),
}

impl SelectedModel {
    fn fit(series: &TimeSeries, order: SARIMASpec) -> Option<Self> {
        if order.is_seasonal() {
            let mut model = SARIMA::from_spec(order);
            model.fit(series).ok().map(|_| Self::SARIMA(model))
        } else {
            let mut model = ARIMA::new(order.p, order.d, order.q);
            model.fit(series).ok().map(|_| Self::ARIMA(model))
        }
    }

    fn score(&self, criterion: InformationCriterion) -> Option<f64> {
        let (aic, aicc, bic) = match self {
            Self::ARIMA(m) => (m.aic(), m.aicc(), m.bic()),
            Self::SARIMA(m) => (m.aic(), m.aicc(), m.bic()),
        };
        match criterion {
            InformationCriterion::Aic => aic,
            InformationCriterion::Aicc => aicc,
            InformationCriterion::Bic => bic,
        }
        .filter(|score| score.is_finite())
    }

    fn as_forecaster(&self) -> &dyn Forecaster {
        match self {
            Self::ARIMA(m) => m,
            Self::SARIMA(m) => m,
        }
    }
}

/// Bookkeeping for one order search.
struct Search<'a> {
    series: &'a TimeSeries,
    criterion: InformationCriterion,
    started: Instant,
    budget: Option<Duration>,
    max_models: usize,
    tried: HashSet<SARIMASpec>,
    evaluated: usize,
    scores: Vec<(SARIMASpec, f64)>,
    best: Option<(SARIMASpec, SelectedModel, f64)>,
    exhausted: bool,
}

impl<'a> Search<'a> {
    fn new(series: &'a TimeSeries, config: &AutoARIMAConfig) -> Self {
        Self {
            series,
            criterion: config.criterion,
            started: Instant::now(),
            budget: config.time_budget,
            max_models: config.max_models,
            tried: HashSet::new(),
            evaluated: 0,
            scores: Vec::new(),
            best: None,
            exhausted: false,
        }
    }

    /// Whether the search must stop before fitting another candidate.
    fn should_stop(&mut self) -> bool {
        if let Some(budget) = self.budget {
            if self.started.elapsed() >= budget {
                self.exhausted = true;
            }
        }
        self.exhausted || self.evaluated >= self.max_models
    }

    fn best_order(&self) -> Option<SARIMASpec> {
        self.best.as_ref().map(|(order, _, _)| *order)
    }

    /// Fit `order` unless already tried or infeasible; true when it becomes
    /// the new best model.
    fn consider(&mut self, order: SARIMASpec) -> bool {
        if !self.tried.insert(order) || self.series.len() < order.min_observations() {
            return false;
        }
        self.evaluated += 1;

        let Some(model) = SelectedModel::fit(self.series, order) else {
            return false;
        };
        let Some(score) = model.score(self.criterion) else {
            return false;
        };
        self.scores.push((order, score));

        let improves = self.best.as_ref().map_or(true, |(_, _, best)| score < *best);
        if improves {
            self.best = Some((order, model, score));
        }
        improves
    }
}

/// Automatic ARIMA/SARIMA model selection.
///
/// Chooses differencing orders with variance-ratio tests, then searches
/// ARMA(p, q)(P, Q) orders and keeps the model minimising the configured
/// information criterion.
///
/// # Example
/// ```
/// use salescast::core::{Period, TimeKey, TimeSeries};
/// use salescast::models::arima::AutoARIMA;
/// use salescast::models::Forecaster;
///
/// let values: Vec<f64> = (0..36)
///     .map(|i| 120.0 + 2.0 * i as f64 + [9.0, -4.0, 3.0, -8.0][i % 4] + (i as f64 * 1.7).sin())
///     .collect();
/// let index = (0..36)
///     .map(|i| TimeKey::Period(Period::quarter(2014 + (i / 4) as i32, (i % 4) as u32 + 1).unwrap()))
///     .collect();
/// let series = TimeSeries::new("revenue", index, values).unwrap();
///
/// let mut model = AutoARIMA::seasonal(4);
/// model.fit(&series).unwrap();
/// assert!(model.selected_full_order().is_some());
/// assert_eq!(model.predict(4).unwrap().horizon(), 4);
/// ```
#[derive(Debug, Clone)]
pub struct AutoARIMA {
    config: AutoARIMAConfig,
    selected_model: Option<SelectedModel>,
    selected_order: Option<SARIMASpec>,
    /// All fitted models and their scores, best first.
    model_scores: Vec<(SARIMASpec, f64)>,
}

impl AutoARIMA {
    /// Create a new AutoARIMA with default configuration.
    pub fn new() -> Self {
        Self::with_config(AutoARIMAConfig::default())
    }

    /// Create AutoARIMA with custom configuration.
    pub fn with_config(config: AutoARIMAConfig) -> Self {
        Self {
            config,
            selected_model: None,
            selected_order: None,
            model_scores: Vec::new(),
        }
    }

    /// Create AutoARIMA with seasonal period.
    pub fn seasonal(period: usize) -> Self {
        Self::with_config(AutoARIMAConfig::default().with_seasonal_period(period))
    }

    pub fn config(&self) -> &AutoARIMAConfig {
        &self.config
    }

    /// Get the selected non-seasonal order.
    pub fn selected_order(&self) -> Option<(usize, usize, usize)> {
        self.selected_order.map(|o| (o.p, o.d, o.q))
    }

    /// Get the full selected order including seasonal components.
    pub fn selected_full_order(&self) -> Option<SARIMASpec> {
        self.selected_order
    }

    /// Get all model scores.
    pub fn model_scores(&self) -> &[(SARIMASpec, f64)] {
        &self.model_scores
    }

    fn clamp_order(&self, p: usize, d: usize, q: usize, cap_p: usize, cap_d: usize, cap_q: usize) -> SARIMASpec {
        let c = &self.config;
        let s = c.period();
        let (cap_p, cap_q) = if s > 0 {
            (cap_p.min(c.max_cap_p), cap_q.min(c.max_cap_q))
        } else {
            (0, 0)
        };
        SARIMASpec::new(p.min(c.max_p), d, q.min(c.max_q), cap_p, cap_d, cap_q, s)
    }

    /// Orders one step away from `order` in p, q, P, Q or jointly in (p, q)
    /// and (P, Q).
    fn neighbours(&self, order: SARIMASpec) -> Vec<SARIMASpec> {
        const STEPS: [(isize, isize, isize, isize); 12] = [
            (1, 0, 0, 0),
            (-1, 0, 0, 0),
            (0, 1, 0, 0),
            (0, -1, 0, 0),
            (1, 1, 0, 0),
            (-1, -1, 0, 0),
            (0, 0, 1, 0),
            (0, 0, -1, 0),
            (0, 0, 0, 1),
            (0, 0, 0, -1),
            (0, 0, 1, 1),
            (0, 0, -1, -1),
        ];
        let c = &self.config;
        let seasonal = c.period() > 0;
        let shift = |value: usize, delta: isize, max: usize| {
            value.checked_add_signed(delta).filter(|v| *v <= max)
        };

        STEPS
            .iter()
            .filter(|(_, _, dp, dq)| seasonal || (*dp == 0 && *dq == 0))
            .filter_map(|&(dp, dq, dcp, dcq)| {
                Some(SARIMASpec {
                    p: shift(order.p, dp, c.max_p)?,
                    q: shift(order.q, dq, c.max_q)?,
                    cap_p: shift(order.cap_p, dcp, c.max_cap_p)?,
                    cap_q: shift(order.cap_q, dcq, c.max_cap_q)?,
                    ..order
                })
            })
            .collect()
    }

    fn stepwise_search(&self, search: &mut Search<'_>, d: usize, cap_d: usize) {
        let starts = [(2, 2, 1, 1), (0, 0, 0, 0), (1, 0, 1, 0), (0, 1, 0, 1)];
        for (p, q, cap_p, cap_q) in starts {
            if search.should_stop() {
                return;
            }
            search.consider(self.clamp_order(p, d, q, cap_p, cap_d, cap_q));
        }

        'moves: while let Some(current) = search.best_order() {
            for candidate in self.neighbours(current) {
                if search.should_stop() {
                    return;
                }
                if search.consider(candidate) {
                    continue 'moves;
                }
            }
            return;
        }
    }

    fn exhaustive_search(&self, search: &mut Search<'_>, d: usize, cap_d: usize) {
        let c = &self.config;
        let (max_cap_p, max_cap_q) = if c.period() > 0 {
            (c.max_cap_p, c.max_cap_q)
        } else {
            (0, 0)
        };
        for p in 0..=c.max_p {
            for q in 0..=c.max_q {
                for cap_p in 0..=max_cap_p {
                    for cap_q in 0..=max_cap_q {
                        if search.should_stop() {
                            return;
                        }
                        search.consider(self.clamp_order(p, d, q, cap_p, cap_d, cap_q));
                    }
                }
            }
        }
    }
}

impl Default for AutoARIMA {
    fn default() -> Self {
        Self::new()
    }
}

impl Forecaster for AutoARIMA {
    fn fit(&mut self, series: &TimeSeries) -> ModelResult<()> {
        self.selected_model = None;
        self.selected_order = None;
        self.model_scores.clear();

        let values = series.values();
        if values.is_empty() {
            return Err(ModelError::EmptyData);
        }
        if series.has_missing_values() {
            return Err(ModelError::MissingValues);
        }
        if values.len() < MIN_OBSERVATIONS {
            return Err(ModelError::InsufficientData {
                needed: MIN_OBSERVATIONS,
                got: values.len(),
            });
        }
        if series.is_constant() {
            return Err(ModelError::DegenerateSeries(values.len()));
        }

        let s = self.config.period();
        let suggested_cap_d = if s > 0 {
            suggest_seasonal_differencing(values, s).min(self.config.max_cap_d)
        } else {
            0
        };
        let suggested_d = suggest_differencing(&seasonal_difference(values, suggested_cap_d, s))
            .min(self.config.max_d);

        let mut search = Search::new(series, &self.config);
        'differencing: for d in (0..=suggested_d).rev() {
            for cap_d in (0..=suggested_cap_d).rev() {
                if self.config.stepwise {
                    self.stepwise_search(&mut search, d, cap_d);
                } else {
                    self.exhaustive_search(&mut search, d, cap_d);
                }
                if search.best.is_some() || search.should_stop() {
                    break 'differencing;
                }
            }
        }

        let elapsed_ms = search.started.elapsed().as_millis() as u64;
        let mut scores = std::mem::take(&mut search.scores);
        scores.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        self.model_scores = scores;

        let Some((order, model, score)) = search.best.take() else {
            if search.exhausted {
                return Err(ModelError::Timeout { elapsed_ms });
            }
            return Err(ModelError::ComputationError(
                "no valid ARIMA/SARIMA model could be fitted".to_string(),
            ));
        };

        if search.exhausted {
            warn!(
                series = series.label(),
                elapsed_ms,
                candidates = self.model_scores.len(),
                "time budget exhausted, keeping best model so far"
            );
        }
        debug!(
            series = series.label(),
            order = %order,
            criterion = %self.config.criterion,
            score,
            candidates = self.model_scores.len(),
            "selected model"
        );

        self.selected_model = Some(model);
        self.selected_order = Some(order);
        Ok(())
    }

    fn predict(&self, horizon: usize) -> ModelResult<Forecast> {
        self.selected_model
            .as_ref()
            .ok_or(ModelError::FitRequired)?
            .as_forecaster()
            .predict(horizon)
    }

    fn predict_with_intervals(&self, horizon: usize, level: f64) -> ModelResult<Forecast> {
        self.selected_model
            .as_ref()
            .ok_or(ModelError::FitRequired)?
            .as_forecaster()
            .predict_with_intervals(horizon, level)
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.selected_model.as_ref()?.as_forecaster().fitted_values()
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.selected_model.as_ref()?.as_forecaster().residuals()
    }

    fn name(&self) -> &str {
        match &self.selected_model {
            Some(SelectedModel::SARIMA(_)) => "AutoARIMA (SARIMA)",
            _ => "AutoARIMA",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Period, TimeKey};
    use std::f64::consts::PI;

    fn make_series(values: Vec<f64>) -> TimeSeries {
        let index = (0..values.len())
            .map(|i| {
                TimeKey::Period(Period::month(2012 + (i / 12) as i32, (i % 12) as u32 + 1).unwrap())
            })
            .collect();
        TimeSeries::new("sales", index, values).unwrap()
    }

    fn noise(t: usize) -> f64 {
        ((t as f64 * 12.9898).sin() * 43758.5453).fract().abs() - 0.5
    }

    fn seasonal_sales(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 200.0 + 1.5 * i as f64 + 20.0 * (2.0 * PI * i as f64 / 12.0).sin() + noise(i))
            .collect()
    }

    #[test]
    fn auto_arima_selects_model() {
        let values: Vec<f64> = (0..100).map(|i| 10.0 + (i as f64 * 0.2).sin() + noise(i)).collect();
        let mut model = AutoARIMA::new();
        model.fit(&make_series(values)).unwrap();

        assert!(model.selected_order().is_some());
        assert!(!model.model_scores().is_empty());
        assert!(model.is_fitted());
        assert_eq!(model.predict(5).unwrap().horizon(), 5);
    }

    #[test]
    fn auto_arima_with_trend() {
        let values: Vec<f64> = (0..80)
            .map(|i| 10.0 + 1.5 * i as f64 + (i as f64 * 0.2).sin() + noise(i))
            .collect();
        let mut model = AutoARIMA::new();
        model.fit(&make_series(values)).unwrap();

        let (_, d, _) = model.selected_order().unwrap();
        assert!(d >= 1);
        let preds = model.predict(3).unwrap();
        assert!(preds.primary()[0] > 120.0);
    }

    #[test]
    fn auto_arima_exhaustive() {
        let values: Vec<f64> = (0..60)
            .map(|i| 10.0 + i as f64 * 0.5 + (i as f64 * 0.3).sin() + noise(i))
            .collect();
        let config = AutoARIMAConfig::default().with_max_orders(2, 2, 2).exhaustive();
        let mut model = AutoARIMA::with_config(config);
        model.fit(&make_series(values)).unwrap();

        assert!(model.selected_order().is_some());
        assert!(model.model_scores().len() > 3);
    }

    #[test]
    fn auto_arima_model_scores_sorted() {
        let values: Vec<f64> = (0..80).map(|i| 10.0 + (i as f64 * 0.3).sin() + noise(i)).collect();
        let mut model = AutoARIMA::new();
        model.fit(&make_series(values)).unwrap();

        let scores = model.model_scores();
        assert!(scores.windows(2).all(|w| w[0].1 <= w[1].1));
        assert_eq!(Some(scores[0].0), model.selected_full_order());
    }

    #[test]
    fn auto_arima_confidence_intervals() {
        let values: Vec<f64> = (0..60)
            .map(|i| 10.0 + i as f64 * 0.5 + (i as f64 * 0.3).sin() + noise(i))
            .collect();
        let mut model = AutoARIMA::new();
        model.fit(&make_series(values)).unwrap();

        let forecast = model.predict_with_intervals(5, 0.95).unwrap();
        let (lower, upper) = (forecast.lower().unwrap(), forecast.upper().unwrap());
        for h in 0..5 {
            assert!(lower[h] <= forecast.primary()[h]);
            assert!(forecast.primary()[h] <= upper[h]);
        }
    }

    #[test]
    fn auto_arima_insufficient_data() {
        let mut model = AutoARIMA::new();
        assert_eq!(
            model.fit(&make_series(vec![1.0, 2.0, 3.0, 4.0, 5.0])),
            Err(ModelError::InsufficientData { needed: 10, got: 5 })
        );
    }

    #[test]
    fn auto_arima_rejects_constant_series() {
        let mut model = AutoARIMA::seasonal(12);
        assert_eq!(
            model.fit(&make_series(vec![42.0; 30])),
            Err(ModelError::DegenerateSeries(30))
        );
    }

    #[test]
    fn auto_arima_rejects_missing_values() {
        let mut values = seasonal_sales(30);
        values[3] = f64::INFINITY;
        let mut model = AutoARIMA::new();
        assert_eq!(model.fit(&make_series(values)), Err(ModelError::MissingValues));
    }

    #[test]
    fn auto_arima_requires_fit() {
        let model = AutoARIMA::new();
        assert!(matches!(model.predict(5), Err(ModelError::FitRequired)));
        assert!(model.fitted_values().is_none());
    }

    #[test]
    fn auto_arima_zero_time_budget_times_out() {
        let config = AutoARIMAConfig::default().with_time_budget(Duration::ZERO);
        let mut model = AutoARIMA::with_config(config);
        assert!(matches!(
            model.fit(&make_series(seasonal_sales(40))),
            Err(ModelError::Timeout { .. })
        ));
        assert!(!model.is_fitted());
    }

    #[test]
    fn auto_arima_fitted_and_residuals() {
        let values: Vec<f64> = (0..60).map(|i| 10.0 + i as f64 + (i as f64 * 0.2).sin() + noise(i)).collect();
        let mut model = AutoARIMA::new();
        model.fit(&make_series(values)).unwrap();

        assert_eq!(model.fitted_values().unwrap().len(), 60);
        assert_eq!(model.residuals().unwrap().len(), 60);
    }

    #[test]
    fn auto_arima_name() {
        assert_eq!(AutoARIMA::new().name(), "AutoARIMA");
    }

    #[test]
    fn auto_arima_config() {
        let config = AutoARIMAConfig::default()
            .with_max_orders(3, 1, 4)
            .with_seasonal_period(12)
            .with_seasonal_orders(1, 1, 1)
            .with_criterion(InformationCriterion::Bic)
            .exhaustive();

        assert_eq!((config.max_p, config.max_d, config.max_q), (3, 1, 4));
        assert_eq!((config.max_cap_p, config.max_cap_d, config.max_cap_q), (1, 1, 1));
        assert_eq!(config.seasonal_period, 12);
        assert_eq!(config.criterion, InformationCriterion::Bic);
        assert!(!config.stepwise);
    }

    #[test]
    fn neighbours_stay_within_bounds() {
        let model = AutoARIMA::with_config(
            AutoARIMAConfig::default()
                .with_seasonal_period(12)
                .with_max_orders(1, 1, 1)
                .with_seasonal_orders(1, 1, 1),
        );
        let order = SARIMASpec::new(0, 1, 1, 0, 1, 1, 12);
        let neighbours = model.neighbours(order);

        assert_eq!(
            neighbours,
            vec![
                SARIMASpec::new(1, 1, 1, 0, 1, 1, 12),
                SARIMASpec::new(0, 1, 0, 0, 1, 1, 12),
                SARIMASpec::new(0, 1, 1, 1, 1, 1, 12),
                SARIMASpec::new(0, 1, 1, 0, 1, 0, 12),
            ]
        );
        // single steps only: q and Q are never dropped together
        assert!(!neighbours.contains(&SARIMASpec::new(0, 1, 0, 0, 1, 0, 12)));
        assert!(neighbours.iter().all(|o| o.p <= 1 && o.q <= 1 && o.cap_p <= 1 && o.cap_q <= 1));
        assert!(neighbours.iter().all(|o| o.d == 1 && o.cap_d == 1 && o.s == 12));
    }

    #[test]
    fn auto_arima_seasonal_tracks_pattern() {
        let values = seasonal_sales(60);
        let (history, future) = values.split_at(48);
        let mut model = AutoARIMA::seasonal(12);
        model.fit(&make_series(history.to_vec())).unwrap();

        let order = model.selected_full_order().unwrap();
        assert_eq!(order.cap_d, 1);
        assert_eq!(model.name(), "AutoARIMA (SARIMA)");

        let forecast = model.predict(12).unwrap();
        let mae = forecast
            .primary()
            .iter()
            .zip(future)
            .map(|(p, y)| (p - y).abs())
            .sum::<f64>()
            / 12.0;
        assert!(mae < 5.0, "mean absolute error {mae}");
    }

    #[test]
    fn auto_arima_two_years_of_monthly_data() {
        let mut model = AutoARIMA::seasonal(12);
        model.fit(&make_series(seasonal_sales(24))).unwrap();

        let forecast = model.predict_with_intervals(12, 0.95).unwrap();
        assert_eq!(forecast.horizon(), 12);
        assert!(forecast.primary().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn criterion_display() {
        assert_eq!(InformationCriterion::Aicc.to_string(), "AICc");
        assert_eq!(InformationCriterion::default(), InformationCriterion::Aicc);
    }
}
