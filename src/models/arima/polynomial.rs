//! Lag polynomial helpers for (seasonal) ARIMA models.
//!
//! Polynomials are dense coefficient vectors in the backshift operator `B`,
//! constant term first.

/// Multiply two lag polynomials.
pub fn poly_mul(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, &x) in a.iter().enumerate() {
        if x == 0.0 {
            continue;
        }
        for (j, &y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// Polynomial `1 + sign * (c_1 B^step + c_2 B^(2 step) + ...)`.
fn lag_poly(coefs: &[f64], step: usize, sign: f64) -> Vec<f64> {
    let mut poly = vec![0.0; coefs.len() * step + 1];
    poly[0] = 1.0;
    for (i, &c) in coefs.iter().enumerate() {
        poly[(i + 1) * step] = sign * c;
    }
    poly
}

/// Expand `(1 - φ(B))(1 - Φ(B^s))` into lag coefficients `a_k` of
/// `1 - Σ a_k B^k`; index 0 of the result is lag 1.
pub fn expand_ar(ar: &[f64], seasonal_ar: &[f64], s: usize) -> Vec<f64> {
    let product = poly_mul(&lag_poly(ar, 1, -1.0), &lag_poly(seasonal_ar, s.max(1), -1.0));
    product.iter().skip(1).map(|c| -c).collect()
}

/// Expand `(1 + θ(B))(1 + Θ(B^s))` into lag coefficients `b_k` of
/// `1 + Σ b_k B^k`; index 0 of the result is lag 1.
pub fn expand_ma(ma: &[f64], seasonal_ma: &[f64], s: usize) -> Vec<f64> {
    let product = poly_mul(&lag_poly(ma, 1, 1.0), &lag_poly(seasonal_ma, s.max(1), 1.0));
    product.into_iter().skip(1).collect()
}

/// Differencing operator `(1 - B)^d (1 - B^s)^D`.
pub fn differencing_poly(d: usize, cap_d: usize, s: usize) -> Vec<f64> {
    let mut poly = vec![1.0];
    for _ in 0..d {
        poly = poly_mul(&poly, &[1.0, -1.0]);
    }
    if s > 0 {
        for _ in 0..cap_d {
            let mut seasonal = vec![0.0; s + 1];
            seasonal[0] = 1.0;
            seasonal[s] = -1.0;
            poly = poly_mul(&poly, &seasonal);
        }
    }
    poly
}

/// MA(∞) weights `ψ_0 .. ψ_{n-1}` of the process with autoregressive lag
/// coefficients `ar` (as returned by [`expand_ar`], possibly multiplied by a
/// differencing operator) and moving-average coefficients `ma`.
pub fn psi_weights(ar: &[f64], ma: &[f64], n: usize) -> Vec<f64> {
    let mut psi = Vec::with_capacity(n);
    for j in 0..n {
        if j == 0 {
            psi.push(1.0);
            continue;
        }
        let mut value = ma.get(j - 1).copied().unwrap_or(0.0);
        for k in 1..=j.min(ar.len()) {
            value += ar[k - 1] * psi[j - k];
        }
        psi.push(value);
    }
    psi
}

/// Autoregressive lag coefficients of the full model on the original scale:
/// the stationary AR part multiplied by the differencing operator.
pub fn integrated_ar(ar: &[f64], d: usize, cap_d: usize, s: usize) -> Vec<f64> {
    let mut stationary = Vec::with_capacity(ar.len() + 1);
    stationary.push(1.0);
    stationary.extend(ar.iter().map(|a| -a));
    poly_mul(&stationary, &differencing_poly(d, cap_d, s))
        .iter()
        .skip(1)
        .map(|c| -c)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn multiplies_polynomials() {
        // (1 - B)(1 + B) = 1 - B^2
        assert_eq!(poly_mul(&[1.0, -1.0], &[1.0, 1.0]), vec![1.0, 0.0, -1.0]);
    }

    #[test]
    fn expands_multiplicative_seasonal_ar() {
        // (1 - 0.5B)(1 - 0.3B^4) = 1 - 0.5B - 0.3B^4 + 0.15B^5
        let a = expand_ar(&[0.5], &[0.3], 4);
        assert_eq!(a.len(), 5);
        assert_relative_eq!(a[0], 0.5);
        assert_relative_eq!(a[3], 0.3);
        assert_relative_eq!(a[4], -0.15);
    }

    #[test]
    fn expands_multiplicative_seasonal_ma() {
        let b = expand_ma(&[0.4], &[0.2], 3);
        assert_eq!(b, vec![0.4, 0.0, 0.2, 0.4 * 0.2]);
    }

    #[test]
    fn empty_orders_expand_to_nothing() {
        assert!(expand_ar(&[], &[], 12).is_empty());
        assert!(expand_ma(&[], &[], 12).is_empty());
    }

    #[test]
    fn differencing_operator() {
        assert_eq!(differencing_poly(1, 0, 0), vec![1.0, -1.0]);
        assert_eq!(differencing_poly(2, 0, 0), vec![1.0, -2.0, 1.0]);
        assert_eq!(differencing_poly(0, 1, 3), vec![1.0, 0.0, 0.0, -1.0]);
    }

    #[test]
    fn psi_weights_of_random_walk_are_ones() {
        let ar = integrated_ar(&[], 1, 0, 0);
        let psi = psi_weights(&ar, &[], 5);
        assert_eq!(psi, vec![1.0; 5]);
    }

    #[test]
    fn psi_weights_of_ar1_decay() {
        let psi = psi_weights(&[0.5], &[], 4);
        assert_eq!(psi, vec![1.0, 0.5, 0.25, 0.125]);
    }

    #[test]
    fn psi_weights_of_ma1() {
        let psi = psi_weights(&[], &[0.7], 3);
        assert_eq!(psi, vec![1.0, 0.7, 0.0]);
    }
}
