//! Linear least-squares solves used by the Levenberg–Marquardt refinement.
//!
//! Every refinement iteration solves a small damped system
//!
//! ```text
//! minimize ‖J δ + r‖² + λ ‖D δ‖²
//! ```
//!
//! where `J` is the residual Jacobian over the free parameters and `D` the
//! Marquardt scaling (`sqrt(diag(JᵀJ))`). We solve it as one stacked
//! least-squares problem `[J; √λ D] δ = [−r; 0]` with SVD, which tolerates the
//! rank-deficient Jacobians that appear when a layer's amplitude sits at zero.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if no tolerance yields a finite solution.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Progressively looser cutoffs for small singular values.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Solve the damped Levenberg–Marquardt step for Jacobian `j` and residuals `r`.
pub fn solve_damped_step(j: &DMatrix<f64>, r: &DVector<f64>, lambda: f64) -> Option<DVector<f64>> {
    let (n, p) = j.shape();
    let mut a = DMatrix::<f64>::zeros(n + p, p);
    let mut b = DVector::<f64>::zeros(n + p);

    a.view_mut((0, 0), (n, p)).copy_from(j);
    for i in 0..n {
        b[i] = -r[i];
    }

    let sqrt_lambda = lambda.max(0.0).sqrt();
    for c in 0..p {
        let col_norm = j.column(c).norm().max(1e-9);
        a[(n + c, c)] = sqrt_lambda * col_norm;
    }

    solve_least_squares(&a, &b)
}
