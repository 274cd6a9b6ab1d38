//! Goodness-of-fit helpers.

/// Sum of squared residuals `Σ (y_i − ŷ_i)²`.
pub fn sse(observed: &[f64], predicted: &[f64]) -> f64 {
    observed
        .iter()
        .zip(predicted)
        .map(|(y, p)| {
            let r = y - p;
            r * r
        })
        .sum()
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Relative size of `SST` below which the target counts as constant.
const CONSTANT_TOL: f64 = 1e-20;
/// Relative size of `SSE` below which a constant target counts as matched.
const EXACT_TOL: f64 = 1e-10;

/// Coefficient of determination `1 − SSE/SST`.
///
/// A constant target has `SST = 0`; R² is then 1 for an exact fit and 0
/// otherwise. Both tests are relative to `Σ y²` so they hold at any scale.
pub fn r_squared(observed: &[f64], predicted: &[f64]) -> f64 {
    let ybar = mean(observed);
    let sst: f64 = observed.iter().map(|y| (y - ybar) * (y - ybar)).sum();
    let sse = sse(observed, predicted);
    let scale = observed.iter().map(|y| y * y).sum::<f64>().max(f64::MIN_POSITIVE);
    if sst <= CONSTANT_TOL * scale {
        return if sse <= EXACT_TOL * scale { 1.0 } else { 0.0 };
    }
    1.0 - sse / sst
}

/// Root-mean-square error.
pub fn rmse(observed: &[f64], predicted: &[f64]) -> f64 {
    if observed.is_empty() {
        return 0.0;
    }
    (sse(observed, predicted) / observed.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_fit_has_unit_r_squared() {
        let y = [3.0, 1.0, 4.0, 1.0, 5.0];
        assert!((r_squared(&y, &y) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn mean_prediction_has_zero_r_squared() {
        let y = [1.0, 2.0, 3.0];
        let p = [2.0, 2.0, 2.0];
        assert!(r_squared(&y, &p).abs() < 1e-12);
        assert!((sse(&y, &p) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn constant_target_edge_case() {
        let y = [5.0, 5.0, 5.0];
        assert_eq!(r_squared(&y, &y), 1.0);
        assert_eq!(r_squared(&y, &[5.0, 5.0, 6.0]), 0.0);
    }

    #[test]
    fn small_scale_series_is_not_treated_as_constant() {
        let y = [1e-9, 2e-9, 5e-9, 1e-9];
        let r2 = r_squared(&y, &[0.0; 4]);
        assert!(r2 < 0.0, "r2={r2}");
        assert!((r_squared(&y, &y) - 1.0).abs() < 1e-12);
        let p = [2.25e-9; 4];
        assert!(r_squared(&y, &p).abs() < 1e-9);
    }

    #[test]
    fn large_scale_series_keeps_its_r_squared() {
        let y = [1e9, 2e9, 5e9, 1e9];
        assert!((r_squared(&y, &y) - 1.0).abs() < 1e-12);
        assert!(r_squared(&y, &[2.25e9; 4]).abs() < 1e-9);
        assert_eq!(r_squared(&[3e9; 4], &[3e9, 3e9, 3e9, 3e9 + 1.0]), 1.0);
    }

    #[test]
    fn near_exact_fit_of_a_constant_target_scores_one() {
        assert_eq!(r_squared(&[5.0; 4], &[5.0, 5.0, 5.0, 5.00001]), 1.0);
        assert_eq!(r_squared(&[5.0; 4], &[5.0, 5.0, 5.0, 5.1]), 0.0);
    }
}
