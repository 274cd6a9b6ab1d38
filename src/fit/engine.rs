//! Constrained fitting of a composite model.
//!
//! Given a composite, a target series and an initial parameter vector, the
//! engine:
//!
//! 1. runs every configured penalty-aware minimizer attempt (`minimizer`) and
//!    retains one result deterministically;
//! 2. refines that result with a bounded Levenberg–Marquardt fit on the raw
//!    residuals (`refine`), with no penalty term.
//!
//! Step 1 attempts that raise are excluded; step 2 failures are fatal.
//! Parameters whose bounds collapse to a point are held fixed throughout.

use crate::domain::{AttemptSummary, Bound, FitResult, MinimizerAttempt};
use crate::error::{CurveError, Result};
use crate::fit::constraints::{SoftConstraints, check_targets};
use crate::fit::minimizer::{PenalizedProblem, run_attempts, select_best};
use crate::fit::refine::refine;
use crate::math::r_squared;
use crate::models::CompositeModel;

/// Maps between the full parameter vector and the free (non-fixed) subset.
#[derive(Debug, Clone)]
pub struct FreeParameters {
    template: Vec<f64>,
    bounds: Vec<Bound>,
    indices: Vec<usize>,
}

impl FreeParameters {
    pub fn new(bounds: &[Bound], initial: &[f64]) -> Self {
        let template = initial
            .iter()
            .zip(bounds)
            .map(|(&v, b)| b.clamp(v))
            .collect();
        let indices = bounds
            .iter()
            .enumerate()
            .filter(|(_, b)| !b.is_fixed())
            .map(|(i, _)| i)
            .collect();
        Self {
            template,
            bounds: bounds.to_vec(),
            indices,
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Bounds of the free parameters, in free-vector order.
    pub fn free_bounds(&self) -> impl Iterator<Item = &Bound> + '_ {
        self.indices.iter().map(|&i| &self.bounds[i])
    }

    /// Free values taken from a full vector (clamped into bounds).
    pub fn extract(&self, full: &[f64]) -> Vec<f64> {
        self.indices.iter().map(|&i| self.bounds[i].clamp(full[i])).collect()
    }

    /// Full vector with `free` substituted and projected onto the box.
    pub fn expand(&self, free: &[f64]) -> Vec<f64> {
        let mut full = self.template.clone();
        for (&i, &v) in self.indices.iter().zip(free) {
            full[i] = self.bounds[i].clamp(v);
        }
        full
    }
}

/// Penalty-augmented minimization followed by least-squares refinement.
#[derive(Debug, Clone)]
pub struct ConstrainedFitEngine {
    pub soft: SoftConstraints,
    pub attempts: Vec<MinimizerAttempt>,
    pub refine_max_iters: usize,
}

impl ConstrainedFitEngine {
    pub fn new(soft: SoftConstraints, attempts: Vec<MinimizerAttempt>, refine_max_iters: usize) -> Self {
        Self {
            soft,
            attempts,
            refine_max_iters,
        }
    }

    /// Fit `model` to `target` starting from `initial`.
    pub fn fit(&self, model: &CompositeModel, xs: &[f64], target: &[f64], initial: &[f64]) -> Result<FitResult> {
        if xs.len() != target.len() {
            return Err(CurveError::ShapeMismatch {
                context: "fit target",
                expected: xs.len(),
                got: target.len(),
            });
        }
        if initial.len() != model.len() {
            return Err(CurveError::ShapeMismatch {
                context: "fit initial parameters",
                expected: model.len(),
                got: initial.len(),
            });
        }
        check_targets(target)?;

        let free = FreeParameters::new(model.bounds(), initial);
        let start = free.expand(&free.extract(initial));

        if free.is_empty() {
            return self.finish(model, xs, target, start, true, None, Vec::new());
        }

        let problem = PenalizedProblem {
            model,
            xs,
            target,
            soft: self.soft,
            free: &free,
        };
        let outcomes = run_attempts(&problem, &start, &self.attempts);
        let winner = select_best(&outcomes);

        let (seed, converged, method) = match winner {
            Some(w) => (
                w.parameters.clone().unwrap_or_else(|| start.clone()),
                w.summary.converged,
                Some(w.summary.name.clone()),
            ),
            None => (start.clone(), self.attempts.is_empty(), None),
        };
        if !converged {
            tracing::warn!(
                method = method.as_deref().unwrap_or("none"),
                "penalized minimization did not converge; refining the returned vector"
            );
        }

        let refined = refine(model, xs, target, &free, &seed, self.refine_max_iters)?;
        tracing::debug!(
            sse = refined.sse,
            iterations = refined.iterations,
            "least-squares refinement finished"
        );

        let summaries = outcomes.into_iter().map(|o| o.summary).collect();
        self.finish(model, xs, target, refined.parameters, converged, method, summaries)
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        model: &CompositeModel,
        xs: &[f64],
        target: &[f64],
        parameters: Vec<f64>,
        converged: bool,
        method: Option<String>,
        attempts: Vec<AttemptSummary>,
    ) -> Result<FitResult> {
        let predicted = model.evaluate(xs, &parameters)?;
        let constraint = self.soft.value(target, &predicted)?;
        let objective = self.soft.objective(target, &predicted)?;
        Ok(FitResult {
            r_squared: r_squared(target, &predicted),
            parameters,
            converged,
            objective,
            constraint,
            method,
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MarketConstants;
    use crate::models::CurveLayer;

    fn engine() -> ConstrainedFitEngine {
        ConstrainedFitEngine::new(
            SoftConstraints::new(0.15, 1e6),
            MinimizerAttempt::defaults(),
            200,
        )
    }

    fn demand_model(shift: f64) -> CompositeModel {
        let mut model = CompositeModel::new(MarketConstants::default());
        model
            .append(
                CurveLayer::demand(),
                &[20.0, 4.0, shift],
                &[Bound::new(0.0, 100.0), Bound::new(0.5, 50.0), Bound::fixed(shift)],
            )
            .unwrap();
        model
    }

    #[test]
    fn free_parameters_skip_fixed_slots() {
        let bounds = [Bound::new(0.0, 1.0), Bound::fixed(2.0), Bound::new(-1.0, 1.0)];
        let free = FreeParameters::new(&bounds, &[0.5, 2.0, 5.0]);
        assert_eq!(free.len(), 2);
        assert_eq!(free.extract(&[0.5, 2.0, 5.0]), vec![0.5, 1.0]);
        assert_eq!(free.expand(&[3.0, -0.5]), vec![1.0, 2.0, -0.5]);
    }

    #[test]
    fn recovers_a_clean_gaussian() {
        let model = demand_model(5.0);
        let xs: Vec<f64> = (0..12).map(|i| i as f64).collect();
        let target: Vec<f64> = xs.iter().map(|&x| 1.0 + 30.0 * (-(x - 5.0) * (x - 5.0) / 6.0).exp()).collect();

        let fit = engine().fit(&model, &xs, &target, model.parameters()).unwrap();
        assert_eq!(fit.parameters.len(), 3);
        assert_eq!(fit.parameters[2], 5.0);
        assert!(fit.r_squared > 0.95, "r2={}", fit.r_squared);
        assert_eq!(fit.attempts.len(), 3);
        assert!(fit.method.is_some());
    }

    #[test]
    fn zero_target_surfaces_before_fitting() {
        let model = demand_model(1.0);
        let xs = [0.0, 1.0, 2.0];
        let err = engine().fit(&model, &xs, &[1.0, 0.0, 1.0], model.parameters()).unwrap_err();
        assert!(matches!(err, CurveError::ConstraintEvaluation { index: 1 }));
    }

    #[test]
    fn wrong_initial_length_is_a_shape_mismatch() {
        let model = demand_model(1.0);
        let xs = [0.0, 1.0, 2.0];
        let err = engine().fit(&model, &xs, &[1.0, 2.0, 1.0], &[1.0]).unwrap_err();
        assert!(matches!(err, CurveError::ShapeMismatch { .. }));
    }

    #[test]
    fn empty_model_short_circuits() {
        let model = CompositeModel::new(MarketConstants::default());
        let xs = [0.0, 1.0];
        let fit = engine().fit(&model, &xs, &[1.0, 2.0], &[]).unwrap();
        assert!(fit.converged);
        assert!(fit.parameters.is_empty());
        assert!(fit.attempts.is_empty());
    }
}
