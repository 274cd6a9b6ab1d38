//! Step 2: bounded Levenberg–Marquardt refinement on raw residuals.
//!
//! Residuals are `ŷ(θ) − y`. The Jacobian over the free parameters is taken
//! by `finitediff` central differences, evaluated just inside the box. Each damped step is
//! solved with `math::solve_damped_step` and projected back onto the box; a
//! step is accepted only if it lowers the SSE, so the refinement never ends
//! worse than its seed.

use finitediff::FiniteDiff;
use nalgebra::{DMatrix, DVector};

use crate::error::{CurveError, Result};
use crate::fit::engine::FreeParameters;
use crate::math::solve_damped_step;
use crate::models::CompositeModel;

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e12;
/// Relative SSE improvement below which we stop.
const FTOL: f64 = 1e-12;
/// Relative step size below which we stop.
const XTOL: f64 = 1e-10;
/// Step used by `finitediff` (`sqrt(f64::EPSILON)`).
const FD_STEP: f64 = 1.4901161193847656e-8;

#[derive(Debug, Clone)]
pub(crate) struct Refined {
    pub parameters: Vec<f64>,
    pub sse: f64,
    pub iterations: usize,
}

pub(crate) fn refine(
    model: &CompositeModel,
    xs: &[f64],
    target: &[f64],
    free: &FreeParameters,
    seed: &[f64],
    max_iters: usize,
) -> Result<Refined> {
    let mut theta = free.extract(seed);
    let mut r = residuals(model, xs, target, free, &theta);
    if r.iter().any(|v| !v.is_finite()) {
        return Err(CurveError::FitFailure(
            "non-finite residuals at the refinement seed".to_string(),
        ));
    }
    let mut cost = r.norm_squared();
    let mut lambda = LAMBDA_INIT;
    let mut iterations = 0;

    while iterations < max_iters && cost > 0.0 {
        iterations += 1;
        let j = jacobian(model, xs, target, free, &theta)?;

        let mut improved = false;
        let mut converged = false;
        while lambda <= LAMBDA_MAX {
            let step = solve_damped_step(&j, &r, lambda)
                .ok_or_else(|| CurveError::FitFailure("singular Jacobian in damped step".to_string()))?;

            let candidate: Vec<f64> = theta.iter().zip(step.iter()).map(|(t, d)| t + d).collect();
            let candidate = free.extract(&free.expand(&candidate));
            let r_new = residuals(model, xs, target, free, &candidate);
            let cost_new = r_new.norm_squared();

            if cost_new.is_finite() && cost_new < cost {
                let moved = step_norm(&theta, &candidate);
                let scale = theta.iter().map(|t| t * t).sum::<f64>().sqrt() + XTOL;
                converged = (cost - cost_new) <= FTOL * cost || moved <= XTOL * scale;

                theta = candidate;
                r = r_new;
                cost = cost_new;
                lambda = (lambda / 10.0).max(LAMBDA_MIN);
                improved = true;
                break;
            }
            lambda *= 10.0;
        }

        if !improved || converged {
            break;
        }
    }

    Ok(Refined {
        parameters: free.expand(&theta),
        sse: cost,
        iterations,
    })
}

fn residuals(
    model: &CompositeModel,
    xs: &[f64],
    target: &[f64],
    free: &FreeParameters,
    theta: &[f64],
) -> DVector<f64> {
    let full = free.expand(theta);
    DVector::from_iterator(
        xs.len(),
        xs.iter()
            .zip(target)
            .map(|(&x, &y)| model.evaluate_unchecked(x, &full) - y),
    )
}

fn jacobian(
    model: &CompositeModel,
    xs: &[f64],
    target: &[f64],
    free: &FreeParameters,
    theta: &[f64],
) -> Result<DMatrix<f64>> {
    let n = xs.len();
    let p = theta.len();

    // Differencing at an active bound would be clamped back onto the bound,
    // so evaluate at a point pulled inward by the step.
    let at: Vec<f64> = theta
        .iter()
        .zip(free.free_bounds())
        .map(|(&t, b)| {
            if b.width() > 2.0 * FD_STEP {
                t.clamp(b.lower + FD_STEP, b.upper - FD_STEP)
            } else {
                t
            }
        })
        .collect();

    let residual_fn = |t: &Vec<f64>| residuals(model, xs, target, free, t).as_slice().to_vec();
    // One row per free parameter, each holding d r / d θ_c over all periods.
    let columns = at.central_jacobian(&residual_fn);
    if columns.len() != p || columns.iter().any(|c| c.len() != n) {
        return Err(CurveError::FitFailure(format!(
            "finite-difference Jacobian has unexpected shape ({} columns)",
            columns.len()
        )));
    }

    let mut j = DMatrix::<f64>::zeros(n, p);
    for (c, column) in columns.iter().enumerate() {
        for (i, &d) in column.iter().enumerate() {
            if !d.is_finite() {
                return Err(CurveError::FitFailure(format!(
                    "non-finite Jacobian entry for free parameter {c}"
                )));
            }
            j[(i, c)] = d;
        }
    }

    Ok(j)
}

fn step_norm(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt()
}
