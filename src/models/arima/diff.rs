//! Differencing utilities for ARIMA models.

use crate::utils::stats::variance;

/// Apply differencing to a time series.
///
/// # Arguments
/// * `series` - The input series
/// * `d` - Differencing order (number of times to difference)
///
/// # Returns
/// The differenced series.
pub fn difference(series: &[f64], d: usize) -> Vec<f64> {
    if d == 0 || series.is_empty() {
        return series.to_vec();
    }

    let mut result = series.to_vec();
    for _ in 0..d {
        if result.len() <= 1 {
            break;
        }
        result = result.windows(2).map(|w| w[1] - w[0]).collect();
    }
    result
}

/// Apply seasonal differencing to a time series.
///
/// # Arguments
/// * `series` - The input series
/// * `d` - Seasonal differencing order
/// * `period` - Seasonal period
///
/// # Returns
/// The seasonally differenced series.
pub fn seasonal_difference(series: &[f64], d: usize, period: usize) -> Vec<f64> {
    if d == 0 || period == 0 || series.len() <= period {
        return series.to_vec();
    }

    let mut result = series.to_vec();
    for _ in 0..d {
        if result.len() <= period {
            break;
        }
        result = result
            .iter()
            .skip(period)
            .zip(result.iter())
            .map(|(curr, prev)| curr - prev)
            .collect();
    }
    result
}

/// Integrate (reverse differencing) a differenced series.
///
/// # Arguments
/// * `differenced` - The differenced series
/// * `original` - The original series (needed for initial values)
/// * `d` - Differencing order used
///
/// # Returns
/// The integrated series.
pub fn integrate(differenced: &[f64], original: &[f64], d: usize) -> Vec<f64> {
    if d == 0 || differenced.is_empty() {
        return differenced.to_vec();
    }

    let mut result = differenced.to_vec();

    // We need to reverse the differencing d times
    for level in (0..d).rev() {
        // Get the initial value at this differencing level
        let init_value = if level == 0 {
            *original.last().unwrap_or(&0.0)
        } else {
            // For higher levels, we need the last value of the intermediate difference
            let intermediate = difference(original, level);
            *intermediate.last().unwrap_or(&0.0)
        };

        // Cumulative sum starting from the initial value
        let mut integrated = Vec::with_capacity(result.len());
        let mut cumsum = init_value;
        for &diff in &result {
            cumsum += diff;
            integrated.push(cumsum);
        }
        result = integrated;
    }

    result
}

/// Undo `d` rounds of seasonal differencing at lag `period`.
///
/// `original` is the series before seasonal differencing; each forecast
/// step adds the value one season back, which may itself be a forecast.
pub fn seasonal_integrate(differenced: &[f64], original: &[f64], d: usize, period: usize) -> Vec<f64> {
    if d == 0 || period == 0 || differenced.is_empty() {
        return differenced.to_vec();
    }

    let mut result = differenced.to_vec();
    for level in (0..d).rev() {
        let base = seasonal_difference(original, level, period);
        let mut extended = base.clone();
        for &diff in &result {
            let lagged = extended
                .len()
                .checked_sub(period)
                .and_then(|i| extended.get(i))
                .copied()
                .unwrap_or(0.0);
            extended.push(diff + lagged);
        }
        result = extended.split_off(base.len());
    }
    result
}

/// Check if a series needs differencing using a simple variance ratio test.
///
/// # Arguments
/// * `series` - The input series
///
/// # Returns
/// Suggested differencing order (0, 1, or 2).
pub fn suggest_differencing(series: &[f64]) -> usize {
    if series.len() < 3 {
        return 0;
    }

    let var_0 = variance(series);
    let diff_1 = difference(series, 1);

    if diff_1.len() < 2 {
        return 0;
    }

    let var_1 = variance(&diff_1);

    // If variance decreases significantly after differencing, difference is needed
    if var_0.is_finite() && var_0 > 0.0 && var_1 / var_0 < 0.9 {
        // Check if second difference helps more
        let diff_2 = difference(&diff_1, 1);
        if diff_2.len() >= 2 {
            let var_2 = variance(&diff_2);
            if var_2 / var_1 < 0.9 && var_2 < var_0 {
                return 2;
            }
        }
        return 1;
    }

    0
}

/// Suggest a seasonal differencing order from the strength of seasonality.
///
/// Returns 1 when differencing at lag `period` removes at least 30% of the
/// variance, 0 otherwise or when fewer than two full seasons are available.
pub fn suggest_seasonal_differencing(series: &[f64], period: usize) -> usize {
    if period < 2 || series.len() < 2 * period {
        return 0;
    }

    let orig_var = variance(series);
    let diff_var = variance(&seasonal_difference(series, 1, period));

    if orig_var.is_finite() && diff_var.is_finite() && diff_var < orig_var * 0.7 {
        1
    } else {
        0
    }
}
