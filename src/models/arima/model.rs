//! ARIMA and seasonal ARIMA models.
//!
//! Both models share one estimator: the series is seasonally differenced
//! `D` times at lag `s`, then differenced `d` times, and a multiplicative
//! ARMA model is fitted to the result by conditional sum of squares.

use std::fmt;

use crate::core::{Forecast, TimeSeries};
use crate::error::{ModelError, ModelResult};
use crate::models::arima::diff::{difference, integrate, seasonal_difference, seasonal_integrate};
use crate::models::arima::polynomial::{expand_ar, expand_ma, integrated_ar, psi_weights};
use crate::models::Forecaster;
use crate::utils::optimization::{nelder_mead, NelderMeadConfig};
use crate::utils::stats::{critical_value, mean};

/// Coefficients are kept inside (-COEF_BOUND, COEF_BOUND).
const COEF_BOUND: f64 = 0.99;
/// Floor for the innovation variance of an exact fit.
const MIN_VARIANCE: f64 = 1e-12;

/// ARIMA model specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ARIMASpec {
    /// AR order (p)
    pub p: usize,
    /// Differencing order (d)
    pub d: usize,
    /// MA order (q)
    pub q: usize,
}

impl ARIMASpec {
    /// Create a new ARIMA specification.
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }

    /// Whether a constant (mean or drift) is estimated.
    pub fn has_intercept(&self) -> bool {
        SARIMASpec::from(*self).has_intercept()
    }

    /// Total number of estimated parameters.
    pub fn num_params(&self) -> usize {
        SARIMASpec::from(*self).num_params()
    }

    /// Fewest observations a fit of this order accepts.
    pub fn min_observations(&self) -> usize {
        SARIMASpec::from(*self).min_observations()
    }
}

impl Default for ARIMASpec {
    fn default() -> Self {
        Self::new(1, 1, 1)
    }
}

impl fmt::Display for ARIMASpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ARIMA({},{},{})", self.p, self.d, self.q)
    }
}

/// Seasonal ARIMA specification `(p, d, q)(P, D, Q)[s]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SARIMASpec {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    /// Seasonal AR order (P)
    pub cap_p: usize,
    /// Seasonal differencing order (D)
    pub cap_d: usize,
    /// Seasonal MA order (Q)
    pub cap_q: usize,
    /// Seasonal period; 0 or 1 disables the seasonal part.
    pub s: usize,
}

impl SARIMASpec {
    pub fn new(p: usize, d: usize, q: usize, cap_p: usize, cap_d: usize, cap_q: usize, s: usize) -> Self {
        Self {
            p,
            d,
            q,
            cap_p,
            cap_d,
            cap_q,
            s,
        }
    }

    /// Seasonal lag in use, 0 when the model has no seasonal part.
    fn period(&self) -> usize {
        if self.s > 1 {
            self.s
        } else {
            0
        }
    }

    fn seasonal_orders(&self) -> (usize, usize, usize) {
        if self.period() == 0 {
            (0, 0, 0)
        } else {
            (self.cap_p, self.cap_d, self.cap_q)
        }
    }

    /// Check if this order has any seasonal component.
    pub fn is_seasonal(&self) -> bool {
        let (cap_p, cap_d, cap_q) = self.seasonal_orders();
        cap_p + cap_d + cap_q > 0
    }

    /// A constant is estimated while the total differencing order is below 2.
    pub fn has_intercept(&self) -> bool {
        self.d + self.seasonal_orders().1 < 2
    }

    /// Total number of estimated parameters.
    pub fn num_params(&self) -> usize {
        let (cap_p, _, cap_q) = self.seasonal_orders();
        self.p + self.q + cap_p + cap_q + usize::from(self.has_intercept())
    }

    /// Highest autoregressive lag after expanding the seasonal polynomial.
    pub fn ar_lags(&self) -> usize {
        self.p + self.seasonal_orders().0 * self.period()
    }

    /// Highest moving-average lag after expanding the seasonal polynomial.
    pub fn ma_lags(&self) -> usize {
        self.q + self.seasonal_orders().2 * self.period()
    }

    /// Observations consumed by differencing.
    pub fn differencing_loss(&self) -> usize {
        self.d + self.seasonal_orders().1 * self.period()
    }

    /// Fewest observations a fit of this order accepts.
    pub fn min_observations(&self) -> usize {
        self.differencing_loss() + self.ar_lags() + self.num_params() + 1
    }
}

impl From<ARIMASpec> for SARIMASpec {
    fn from(spec: ARIMASpec) -> Self {
        Self::new(spec.p, spec.d, spec.q, 0, 0, 0, 0)
    }
}

impl fmt::Display for SARIMASpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (cap_p, cap_d, cap_q) = self.seasonal_orders();
        write!(f, "ARIMA({},{},{})", self.p, self.d, self.q)?;
        if self.is_seasonal() {
            write!(f, "({},{},{})[{}]", cap_p, cap_d, cap_q, self.s)?;
        }
        Ok(())
    }
}

/// Estimated coefficients of a (seasonal) ARMA model.
#[derive(Debug, Clone, Default, PartialEq)]
struct Coefficients {
    intercept: f64,
    ar: Vec<f64>,
    seasonal_ar: Vec<f64>,
    ma: Vec<f64>,
    seasonal_ma: Vec<f64>,
}

impl Coefficients {
    /// Parameter vector layout: `[intercept?, φ.., Φ.., θ.., Θ..]`.
    fn unpack(spec: &SARIMASpec, params: &[f64]) -> Self {
        let (cap_p, _, cap_q) = spec.seasonal_orders();
        let mut rest = params;
        let mut take = |n: usize| {
            let (head, tail) = rest.split_at(n.min(rest.len()));
            rest = tail;
            head.to_vec()
        };
        let intercept = if spec.has_intercept() {
            take(1).first().copied().unwrap_or(0.0)
        } else {
            0.0
        };
        Self {
            intercept,
            ar: take(spec.p),
            seasonal_ar: take(cap_p),
            ma: take(spec.q),
            seasonal_ma: take(cap_q),
        }
    }

    fn ar_lags(&self, s: usize) -> Vec<f64> {
        expand_ar(&self.ar, &self.seasonal_ar, s)
    }

    fn ma_lags(&self, s: usize) -> Vec<f64> {
        expand_ma(&self.ma, &self.seasonal_ma, s)
    }
}

/// One-step prediction of `z[t]` from its past and past innovations.
fn one_step(z: &[f64], innovations: &[f64], t: usize, intercept: f64, ar: &[f64], ma: &[f64]) -> f64 {
    let mut pred = intercept;
    for (k, &a) in ar.iter().enumerate() {
        if a != 0.0 && t > k {
            pred += a * (z[t - 1 - k] - intercept);
        }
    }
    for (k, &b) in ma.iter().enumerate() {
        if b != 0.0 && t > k {
            pred += b * innovations[t - 1 - k];
        }
    }
    pred
}

/// Innovations of `z` under the given lag coefficients; the first
/// `ar.len()` entries are conditioned to zero.
fn innovations(z: &[f64], intercept: f64, ar: &[f64], ma: &[f64]) -> Vec<f64> {
    let mut e = vec![0.0; z.len()];
    for t in ar.len()..z.len() {
        let pred = one_step(z, &e, t, intercept, ar, ma);
        e[t] = z[t] - pred;
    }
    e
}

fn conditional_sum_of_squares(z: &[f64], intercept: f64, ar: &[f64], ma: &[f64]) -> f64 {
    let css: f64 = innovations(z, intercept, ar, ma).iter().map(|e| e * e).sum();
    if css.is_finite() {
        css
    } else {
        f64::MAX
    }
}

/// Everything a fitted model needs to forecast.
#[derive(Debug, Clone)]
struct FittedState {
    spec: SARIMASpec,
    coefficients: Coefficients,
    ar: Vec<f64>,
    ma: Vec<f64>,
    original: Vec<f64>,
    /// Series after seasonal differencing.
    seasonal_base: Vec<f64>,
    /// Fully differenced series.
    differenced: Vec<f64>,
    innovations: Vec<f64>,
    fitted: Vec<f64>,
    residuals: Vec<f64>,
    sigma2: f64,
    aic: f64,
    aicc: f64,
    bic: f64,
}

impl FittedState {
    fn fit(spec: SARIMASpec, values: &[f64]) -> ModelResult<Self> {
        if values.is_empty() {
            return Err(ModelError::EmptyData);
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::MissingValues);
        }
        let needed = spec.min_observations();
        if values.len() < needed {
            return Err(ModelError::InsufficientData {
                needed,
                got: values.len(),
            });
        }

        let s = spec.period();
        let (_, cap_d, _) = spec.seasonal_orders();
        let seasonal_base = seasonal_difference(values, cap_d, s);
        let differenced = difference(&seasonal_base, spec.d);

        let coefficients = Self::estimate(&spec, &differenced)?;
        let ar = coefficients.ar_lags(s);
        let ma = coefficients.ma_lags(s);
        let innovations = innovations(&differenced, coefficients.intercept, &ar, &ma);

        let start = ar.len();
        let n_eff = differenced.len() - start;
        let css: f64 = innovations[start..].iter().map(|e| e * e).sum();
        let sigma2 = (css / n_eff as f64).max(MIN_VARIANCE);

        let n = n_eff as f64;
        let k = spec.num_params() as f64;
        let log_likelihood = -0.5 * n * (1.0 + sigma2.ln() + (2.0 * std::f64::consts::PI).ln());
        let aic = -2.0 * log_likelihood + 2.0 * k;
        let bic = -2.0 * log_likelihood + k * n.ln();
        let aicc = if n - k - 1.0 > 0.0 {
            aic + 2.0 * k * (k + 1.0) / (n - k - 1.0)
        } else {
            f64::INFINITY
        };

        // Differencing is linear, so one-step residuals carry over to the
        // original scale unchanged.
        let offset = values.len() - differenced.len() + start;
        let mut fitted = vec![f64::NAN; values.len()];
        let mut residuals = vec![f64::NAN; values.len()];
        for (i, e) in innovations[start..].iter().enumerate() {
            residuals[offset + i] = *e;
            fitted[offset + i] = values[offset + i] - e;
        }

        Ok(Self {
            spec,
            coefficients,
            ar,
            ma,
            original: values.to_vec(),
            seasonal_base,
            differenced,
            innovations,
            fitted,
            residuals,
            sigma2,
            aic,
            aicc,
            bic,
        })
    }

    fn estimate(spec: &SARIMASpec, z: &[f64]) -> ModelResult<Coefficients> {
        let (cap_p, _, cap_q) = spec.seasonal_orders();
        let z_mean = mean(z);
        let intercept_start = if spec.has_intercept() { z_mean } else { 0.0 };

        if spec.p + spec.q + cap_p + cap_q == 0 {
            return Ok(Coefficients {
                intercept: intercept_start,
                ..Default::default()
            });
        }

        let mut initial = Vec::with_capacity(spec.num_params());
        let mut bounds = Vec::with_capacity(spec.num_params());
        if spec.has_intercept() {
            initial.push(z_mean);
            bounds.push((f64::NEG_INFINITY, f64::INFINITY));
        }
        for order in [spec.p, cap_p, spec.q, cap_q] {
            for i in 0..order {
                initial.push(0.1 / (i + 1) as f64);
                bounds.push((-COEF_BOUND, COEF_BOUND));
            }
        }

        let s = spec.period();
        let result = nelder_mead(
            |params| {
                let c = Coefficients::unpack(spec, params);
                conditional_sum_of_squares(z, c.intercept, &c.ar_lags(s), &c.ma_lags(s))
            },
            &initial,
            Some(&bounds),
            NelderMeadConfig {
                max_iter: 1000,
                tolerance: 1e-8,
                ..Default::default()
            },
        );

        if !result.optimal_value.is_finite() || result.optimal_value == f64::MAX {
            return Err(ModelError::ComputationError(format!(
                "conditional sum of squares diverged for {spec}"
            )));
        }
        Ok(Coefficients::unpack(spec, &result.optimal_point))
    }

    fn forecast(&self, horizon: usize) -> Vec<f64> {
        let n = self.differenced.len();
        let mut z = self.differenced.clone();
        let mut e = self.innovations.clone();
        for t in n..n + horizon {
            let pred = one_step(&z, &e, t, self.coefficients.intercept, &self.ar, &self.ma);
            z.push(pred);
            e.push(0.0);
        }

        let (_, cap_d, _) = self.spec.seasonal_orders();
        let w = integrate(&z[n..], &self.seasonal_base, self.spec.d);
        seasonal_integrate(&w, &self.original, cap_d, self.spec.period())
    }

    /// Forecast standard errors from the MA(∞) representation of the
    /// integrated process: `se_h² = σ² Σ_{j<h} ψ_j²`.
    fn standard_errors(&self, horizon: usize) -> Vec<f64> {
        let (_, cap_d, _) = self.spec.seasonal_orders();
        let full_ar = integrated_ar(&self.ar, self.spec.d, cap_d, self.spec.period());
        let psi = psi_weights(&full_ar, &self.ma, horizon);

        let mut cumulative = 0.0;
        psi.iter()
            .map(|w| {
                cumulative += w * w;
                (self.sigma2 * cumulative).sqrt()
            })
            .collect()
    }

    fn forecast_with_intervals(&self, horizon: usize, level: f64) -> ModelResult<Forecast> {
        if !(level > 0.0 && level < 1.0) {
            return Err(ModelError::InvalidParameter(format!(
                "confidence level must be in (0, 1), got {level}"
            )));
        }
        let point = self.forecast(horizon);
        let z = critical_value(level);
        let se = self.standard_errors(horizon);

        let lower = point.iter().zip(&se).map(|(p, s)| p - z * s).collect();
        let upper = point.iter().zip(&se).map(|(p, s)| p + z * s).collect();
        Ok(Forecast::from_values_with_intervals(point, lower, upper))
    }
}

/// ARIMA forecasting model.
///
/// ARIMA(p, d, q) combines:
/// - AR(p): Autoregressive component
/// - I(d): Differencing for stationarity
/// - MA(q): Moving average component
///
/// A constant is estimated when `d < 2`: the mean for `d = 0`, a drift
/// for `d = 1`.
#[derive(Debug, Clone)]
pub struct ARIMA {
    spec: ARIMASpec,
    state: Option<FittedState>,
}

impl ARIMA {
    /// Create a new ARIMA model.
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self {
            spec: ARIMASpec::new(p, d, q),
            state: None,
        }
    }

    /// Create an AR(p) model (ARIMA with d=0, q=0).
    pub fn ar(p: usize) -> Self {
        Self::new(p, 0, 0)
    }

    /// Create an MA(q) model (ARIMA with p=0, d=0).
    pub fn ma(q: usize) -> Self {
        Self::new(0, 0, q)
    }

    /// Get the model specification.
    pub fn spec(&self) -> ARIMASpec {
        self.spec
    }

    /// Get AR coefficients.
    pub fn ar_coefficients(&self) -> &[f64] {
        self.state.as_ref().map(|s| s.coefficients.ar.as_slice()).unwrap_or(&[])
    }

    /// Get MA coefficients.
    pub fn ma_coefficients(&self) -> &[f64] {
        self.state.as_ref().map(|s| s.coefficients.ma.as_slice()).unwrap_or(&[])
    }

    /// Get the intercept (mean or drift of the differenced series).
    pub fn intercept(&self) -> f64 {
        self.state.as_ref().map_or(0.0, |s| s.coefficients.intercept)
    }

    /// Innovation variance estimate.
    pub fn residual_variance(&self) -> Option<f64> {
        self.state.as_ref().map(|s| s.sigma2)
    }

    pub fn aic(&self) -> Option<f64> {
        self.state.as_ref().map(|s| s.aic)
    }

    /// Small-sample corrected AIC; infinite when too few observations remain.
    pub fn aicc(&self) -> Option<f64> {
        self.state.as_ref().map(|s| s.aicc)
    }

    pub fn bic(&self) -> Option<f64> {
        self.state.as_ref().map(|s| s.bic)
    }
}

impl Default for ARIMA {
    fn default() -> Self {
        Self::new(1, 1, 1)
    }
}

impl Forecaster for ARIMA {
    fn fit(&mut self, series: &TimeSeries) -> ModelResult<()> {
        self.state = None;
        self.state = Some(FittedState::fit(self.spec.into(), series.values())?);
        Ok(())
    }

    fn predict(&self, horizon: usize) -> ModelResult<Forecast> {
        let state = self.state.as_ref().ok_or(ModelError::FitRequired)?;
        Ok(Forecast::from_values(state.forecast(horizon)))
    }

    fn predict_with_intervals(&self, horizon: usize, level: f64) -> ModelResult<Forecast> {
        let state = self.state.as_ref().ok_or(ModelError::FitRequired)?;
        state.forecast_with_intervals(horizon, level)
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.fitted.as_slice())
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.residuals.as_slice())
    }

    fn name(&self) -> &str {
        "ARIMA"
    }
}

/// Seasonal ARIMA model `(p, d, q)(P, D, Q)[s]` with multiplicative
/// seasonal polynomials.
///
/// # Example
/// ```
/// use salescast::core::{Period, TimeKey, TimeSeries};
/// use salescast::models::arima::SARIMA;
/// use salescast::models::Forecaster;
///
/// let values: Vec<f64> = (0..36)
///     .map(|i| 100.0 + [8.0, -2.0, 5.0, -11.0][i % 4] + i as f64)
///     .collect();
/// let index = (0..36)
///     .map(|i| TimeKey::Period(Period::quarter(2015 + (i / 4) as i32, (i % 4) as u32 + 1).unwrap()))
///     .collect();
/// let series = TimeSeries::new("sales", index, values).unwrap();
///
/// let mut model = SARIMA::new(0, 0, 0, 0, 1, 0, 4);
/// model.fit(&series).unwrap();
/// let forecast = model.predict_with_intervals(4, 0.95).unwrap();
/// assert_eq!(forecast.horizon(), 4);
/// ```
#[derive(Debug, Clone)]
pub struct SARIMA {
    spec: SARIMASpec,
    state: Option<FittedState>,
}

impl SARIMA {
    pub fn new(p: usize, d: usize, q: usize, cap_p: usize, cap_d: usize, cap_q: usize, s: usize) -> Self {
        Self::from_spec(SARIMASpec::new(p, d, q, cap_p, cap_d, cap_q, s))
    }

    pub fn from_spec(spec: SARIMASpec) -> Self {
        Self { spec, state: None }
    }

    pub fn spec(&self) -> SARIMASpec {
        self.spec
    }

    pub fn ar_coefficients(&self) -> &[f64] {
        self.state.as_ref().map(|s| s.coefficients.ar.as_slice()).unwrap_or(&[])
    }

    pub fn ma_coefficients(&self) -> &[f64] {
        self.state.as_ref().map(|s| s.coefficients.ma.as_slice()).unwrap_or(&[])
    }

    pub fn seasonal_ar_coefficients(&self) -> &[f64] {
        self.state.as_ref().map(|s| s.coefficients.seasonal_ar.as_slice()).unwrap_or(&[])
    }

    pub fn seasonal_ma_coefficients(&self) -> &[f64] {
        self.state.as_ref().map(|s| s.coefficients.seasonal_ma.as_slice()).unwrap_or(&[])
    }

    pub fn intercept(&self) -> f64 {
        self.state.as_ref().map_or(0.0, |s| s.coefficients.intercept)
    }

    pub fn residual_variance(&self) -> Option<f64> {
        self.state.as_ref().map(|s| s.sigma2)
    }

    pub fn aic(&self) -> Option<f64> {
        self.state.as_ref().map(|s| s.aic)
    }

    pub fn aicc(&self) -> Option<f64> {
        self.state.as_ref().map(|s| s.aicc)
    }

    pub fn bic(&self) -> Option<f64> {
        self.state.as_ref().map(|s| s.bic)
    }
}

impl Forecaster for SARIMA {
    fn fit(&mut self, series: &TimeSeries) -> ModelResult<()> {
        self.state = None;
        self.state = Some(FittedState::fit(self.spec, series.values())?);
        Ok(())
    }

    fn predict(&self, horizon: usize) -> ModelResult<Forecast> {
        let state = self.state.as_ref().ok_or(ModelError::FitRequired)?;
        Ok(Forecast::from_values(state.forecast(horizon)))
    }

    fn predict_with_intervals(&self, horizon: usize, level: f64) -> ModelResult<Forecast> {
        let state = self.state.as_ref().ok_or(ModelError::FitRequired)?;
        state.forecast_with_intervals(horizon, level)
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.fitted.as_slice())
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.residuals.as_slice())
    }

    fn name(&self) -> &str {
        "SARIMA"
    }
}
