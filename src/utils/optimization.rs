//! Derivative-free minimisation used for conditional sum of squares fits.

use std::cmp::Ordering;

/// Result of Nelder-Mead optimization.
#[derive(Debug, Clone)]
pub struct NelderMeadResult {
    /// The optimal point found.
    pub optimal_point: Vec<f64>,
    /// The objective function value at the optimal point.
    pub optimal_value: f64,
    /// Number of iterations performed.
    pub iterations: usize,
    /// Number of objective evaluations.
    pub evaluations: usize,
    /// Whether the algorithm converged.
    pub converged: bool,
}

/// Configuration for Nelder-Mead optimization.
#[derive(Debug, Clone)]
pub struct NelderMeadConfig {
    /// Maximum number of iterations.
    pub max_iter: usize,
    /// Convergence tolerance, applied both to the spread of objective values
    /// and to the largest vertex distance from the best vertex.
    pub tolerance: f64,
    /// Reflection coefficient (default: 1.0).
    pub alpha: f64,
    /// Expansion coefficient (default: 2.0).
    pub gamma: f64,
    /// Contraction coefficient (default: 0.5).
    pub rho: f64,
    /// Shrinkage coefficient (default: 0.5).
    pub sigma: f64,
    /// Initial simplex step size, relative to the starting value when it is
    /// non-zero (default: 0.05).
    pub initial_step: f64,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            tolerance: 1e-8,
            alpha: 1.0,
            gamma: 2.0,
            rho: 0.5,
            sigma: 0.5,
            initial_step: 0.05,
        }
    }
}

/// Box constraints applied after every simplex move.
#[derive(Clone, Copy)]
struct Bounds<'a>(Option<&'a [(f64, f64)]>);

impl Bounds<'_> {
    fn clamp(&self, mut point: Vec<f64>) -> Vec<f64> {
        if let Some(bounds) = self.0 {
            for (x, &(lo, hi)) in point.iter_mut().zip(bounds) {
                *x = x.clamp(lo, hi);
            }
        }
        point
    }
}

/// Simplex vertices with their objective values.
struct Simplex<F> {
    objective: F,
    vertices: Vec<Vec<f64>>,
    values: Vec<f64>,
    evaluations: usize,
}

impl<F: Fn(&[f64]) -> f64> Simplex<F> {
    fn new(objective: F, initial: &[f64], step: f64, bounds: Bounds<'_>) -> Self {
        let n = initial.len();
        let mut vertices = Vec::with_capacity(n + 1);
        vertices.push(bounds.clamp(initial.to_vec()));
        for i in 0..n {
            let mut vertex = initial.to_vec();
            vertex[i] += if initial[i].abs() > 1e-10 {
                step * initial[i].abs()
            } else {
                step
            };
            vertices.push(bounds.clamp(vertex));
        }

        let mut simplex = Self {
            objective,
            vertices,
            values: Vec::with_capacity(n + 1),
            evaluations: 0,
        };
        for i in 0..=n {
            let value = simplex.evaluate(&simplex.vertices[i].clone());
            simplex.values.push(value);
        }
        simplex
    }

    fn evaluate(&mut self, point: &[f64]) -> f64 {
        self.evaluations += 1;
        let value = (self.objective)(point);
        if value.is_nan() {
            f64::INFINITY
        } else {
            value
        }
    }

    /// Vertex indices ordered from best to worst.
    fn ranking(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.values.len()).collect();
        order.sort_by(|&a, &b| {
            self.values[a]
                .partial_cmp(&self.values[b])
                .unwrap_or(Ordering::Equal)
        });
        order
    }

    fn centroid_without(&self, exclude: usize) -> Vec<f64> {
        let dim = self.vertices[0].len();
        let mut centroid = vec![0.0; dim];
        for (i, vertex) in self.vertices.iter().enumerate() {
            if i != exclude {
                for (c, v) in centroid.iter_mut().zip(vertex) {
                    *c += v;
                }
            }
        }
        let count = (self.vertices.len() - 1) as f64;
        centroid.iter_mut().for_each(|c| *c /= count);
        centroid
    }

    fn replace(&mut self, index: usize, point: Vec<f64>, value: f64) {
        self.vertices[index] = point;
        self.values[index] = value;
    }

    fn shrink_towards(&mut self, best: usize, sigma: f64, bounds: Bounds<'_>) {
        let anchor = self.vertices[best].clone();
        for i in 0..self.vertices.len() {
            if i == best {
                continue;
            }
            let moved: Vec<f64> = anchor
                .iter()
                .zip(&self.vertices[i])
                .map(|(a, v)| a + sigma * (v - a))
                .collect();
            let moved = bounds.clamp(moved);
            let value = self.evaluate(&moved);
            self.replace(i, moved, value);
        }
    }
}

/// Affine combination `from + t * (to - from)`.
fn towards(from: &[f64], to: &[f64], t: f64) -> Vec<f64> {
    from.iter().zip(to).map(|(f, x)| f + t * (x - f)).collect()
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Minimise `objective` with the Nelder-Mead simplex method.
///
/// `bounds`, when given, holds one `(min, max)` pair per dimension; every
/// trial point is clamped into the box. NaN objective values are treated as
/// `+inf`.
///
/// # Example
/// ```
/// use salescast::utils::optimization::{nelder_mead, NelderMeadConfig};
///
/// // Minimize (x-2)^2 + (y-3)^2
/// let result = nelder_mead(
///     |x| (x[0] - 2.0).powi(2) + (x[1] - 3.0).powi(2),
///     &[0.0, 0.0],
///     None,
///     NelderMeadConfig::default(),
/// );
///
/// assert!(result.converged);
/// assert!((result.optimal_point[0] - 2.0).abs() < 0.01);
/// assert!((result.optimal_point[1] - 3.0).abs() < 0.01);
/// ```
pub fn nelder_mead<F>(
    objective: F,
    initial: &[f64],
    bounds: Option<&[(f64, f64)]>,
    config: NelderMeadConfig,
) -> NelderMeadResult
where
    F: Fn(&[f64]) -> f64,
{
    let n = initial.len();
    if n == 0 {
        return NelderMeadResult {
            optimal_point: vec![],
            optimal_value: f64::NAN,
            iterations: 0,
            evaluations: 0,
            converged: false,
        };
    }

    let bounds = Bounds(bounds);
    let mut simplex = Simplex::new(objective, initial, config.initial_step, bounds);
    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iter {
        iterations += 1;

        let ranking = simplex.ranking();
        let (best, second_worst, worst) = (ranking[0], ranking[n - 1], ranking[n]);

        // Equal values at distinct vertices (e.g. either side of a symmetric
        // minimum) are not convergence: the simplex must also have collapsed.
        let value_spread = simplex.values[worst] - simplex.values[best];
        let size = simplex
            .vertices
            .iter()
            .map(|v| distance(v, &simplex.vertices[best]))
            .fold(0.0, f64::max);
        if value_spread < config.tolerance && size < config.tolerance {
            converged = true;
            break;
        }

        let centroid = simplex.centroid_without(worst);

        let reflected = bounds.clamp(towards(&centroid, &simplex.vertices[worst], -config.alpha));
        let reflected_value = simplex.evaluate(&reflected);

        if reflected_value < simplex.values[best] {
            let expanded = bounds.clamp(towards(&centroid, &reflected, config.gamma));
            let expanded_value = simplex.evaluate(&expanded);
            if expanded_value < reflected_value {
                simplex.replace(worst, expanded, expanded_value);
            } else {
                simplex.replace(worst, reflected, reflected_value);
            }
            continue;
        }

        if reflected_value < simplex.values[second_worst] {
            simplex.replace(worst, reflected, reflected_value);
            continue;
        }

        // Outside contraction when the reflection improved on the worst
        // vertex, inside contraction otherwise.
        let outside = reflected_value < simplex.values[worst];
        let anchor = if outside {
            reflected.clone()
        } else {
            simplex.vertices[worst].clone()
        };
        let contracted = bounds.clamp(towards(&centroid, &anchor, config.rho));
        let contracted_value = simplex.evaluate(&contracted);
        let accept = if outside {
            contracted_value <= reflected_value
        } else {
            contracted_value < simplex.values[worst]
        };
        if accept {
            simplex.replace(worst, contracted, contracted_value);
            continue;
        }

        simplex.shrink_towards(best, config.sigma, bounds);
    }

    let best = simplex.ranking()[0];
    NelderMeadResult {
        optimal_point: simplex.vertices[best].clone(),
        optimal_value: simplex.values[best],
        iterations,
        evaluations: simplex.evaluations,
        converged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn nelder_mead_quadratic_2d() {
        let result = nelder_mead(
            |x| (x[0] - 2.0).powi(2) + (x[1] - 3.0).powi(2),
            &[0.0, 0.0],
            None,
            NelderMeadConfig::default(),
        );

        assert!(result.converged);
        assert_relative_eq!(result.optimal_point[0], 2.0, epsilon = 1e-4);
        assert_relative_eq!(result.optimal_point[1], 3.0, epsilon = 1e-4);
        assert_relative_eq!(result.optimal_value, 0.0, epsilon = 1e-6);
        assert!(result.evaluations > result.iterations);
    }

    #[test]
    fn nelder_mead_rosenbrock() {
        let config = NelderMeadConfig {
            max_iter: 5000,
            tolerance: 1e-10,
            ..Default::default()
        };

        let result = nelder_mead(
            |x| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0].powi(2)).powi(2),
            &[0.0, 0.0],
            None,
            config,
        );

        assert_relative_eq!(result.optimal_point[0], 1.0, epsilon = 1e-3);
        assert_relative_eq!(result.optimal_point[1], 1.0, epsilon = 1e-3);
    }

    #[test]
    fn nelder_mead_with_bounds() {
        // Unconstrained optimum at 5 lies outside [0, 3]
        let result = nelder_mead(
            |x| (x[0] - 5.0).powi(2),
            &[1.0],
            Some(&[(0.0, 3.0)]),
            NelderMeadConfig::default(),
        );

        assert_relative_eq!(result.optimal_point[0], 3.0, epsilon = 1e-4);
    }

    #[test]
    fn nelder_mead_recovers_ar1_coefficient() {
        // y_t = 0.6 y_{t-1} + e_t with a deterministic innovation sequence
        let mut y = vec![1.0];
        for t in 1..200 {
            let e = ((t as f64 * 12.9898).sin() * 43758.5453).fract();
            y.push(0.6 * y[t - 1] + e);
        }

        let css = |params: &[f64]| {
            y.windows(2)
                .map(|w| (w[1] - params[0] * w[0]).powi(2))
                .sum::<f64>()
        };

        // The innovations are not zero-mean, so the CSS minimiser is the
        // least-squares slope of this sample, not the generating 0.6.
        let (sxy, sxx) = y
            .windows(2)
            .fold((0.0, 0.0), |(sxy, sxx), w| (sxy + w[0] * w[1], sxx + w[0] * w[0]));
        let least_squares = sxy / sxx;

        let result = nelder_mead(css, &[0.1], Some(&[(-0.99, 0.99)]), NelderMeadConfig::default());

        assert!(result.converged);
        assert_relative_eq!(result.optimal_point[0], least_squares, epsilon = 1e-4);
    }

    #[test]
    fn nelder_mead_does_not_stop_across_symmetric_minimum() {
        let result = nelder_mead(
            |x| (x[0] - 1.0).powi(2),
            &[0.5],
            None,
            NelderMeadConfig::default(),
        );

        assert!(result.converged);
        assert_relative_eq!(result.optimal_point[0], 1.0, epsilon = 1e-4);
        assert_relative_eq!(result.optimal_value, 0.0, epsilon = 1e-8);
    }

    #[test]
    fn nelder_mead_treats_nan_as_worst() {
        let result = nelder_mead(
            |x| if x[0] < 0.0 { f64::NAN } else { (x[0] - 1.0).powi(2) },
            &[0.5],
            None,
            NelderMeadConfig::default(),
        );

        assert!(result.optimal_value.is_finite());
        assert_relative_eq!(result.optimal_point[0], 1.0, epsilon = 1e-3);
    }

    #[test]
    fn nelder_mead_empty_initial() {
        let result = nelder_mead(|_| 0.0, &[], None, NelderMeadConfig::default());

        assert!(!result.converged);
        assert!(result.optimal_value.is_nan());
        assert_eq!(result.evaluations, 0);
    }

    #[test]
    fn nelder_mead_3d() {
        let result = nelder_mead(
            |x| x[0].powi(2) + x[1].powi(2) + x[2].powi(2),
            &[1.0, 2.0, 3.0],
            None,
            NelderMeadConfig::default(),
        );

        assert!(result.converged);
        for coordinate in &result.optimal_point {
            assert_relative_eq!(*coordinate, 0.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn nelder_mead_respects_iteration_cap() {
        let config = NelderMeadConfig {
            max_iter: 3,
            ..Default::default()
        };
        let result = nelder_mead(|x| (x[0] - 100.0).powi(2), &[0.0], None, config);

        assert_eq!(result.iterations, 3);
        assert!(!result.converged);
    }
}
