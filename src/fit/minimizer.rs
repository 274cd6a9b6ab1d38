//! Step 1: penalty-aware bounded minimization with `argmin`'s Nelder–Mead.
//!
//! Each configured `MinimizerAttempt` runs an independent Nelder–Mead search
//! from the same starting point over the free parameters. Candidates are
//! projected onto the bound box before evaluation, so the simplex may wander
//! outside the box but the objective is only ever computed on feasible
//! parameters.

use argmin::core::{CostFunction, Error, Executor, State, TerminationReason, TerminationStatus};
use argmin::solver::neldermead::NelderMead;
use rayon::prelude::*;

use crate::domain::{AttemptSummary, MinimizerAttempt};
use crate::fit::constraints::SoftConstraints;
use crate::fit::engine::FreeParameters;
use crate::models::CompositeModel;

/// The penalized objective as an `argmin` problem over the free parameters.
#[derive(Clone, Copy)]
pub(crate) struct PenalizedProblem<'a> {
    pub model: &'a CompositeModel,
    pub xs: &'a [f64],
    pub target: &'a [f64],
    pub soft: SoftConstraints,
    pub free: &'a FreeParameters,
}

impl CostFunction for PenalizedProblem<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, theta: &Self::Param) -> Result<Self::Output, Error> {
        let full = self.free.expand(theta);
        let predicted: Vec<f64> = self
            .xs
            .iter()
            .map(|&x| self.model.evaluate_unchecked(x, &full))
            .collect();
        let objective = self.soft.objective(self.target, &predicted)?;
        // The simplex ordering cannot handle NaN; treat any blow-up as worst.
        Ok(if objective.is_finite() { objective } else { f64::INFINITY })
    }
}

/// One finished attempt: its summary plus the full parameter vector it found.
#[derive(Debug, Clone)]
pub(crate) struct AttemptOutcome {
    pub order: usize,
    pub summary: AttemptSummary,
    pub parameters: Option<Vec<f64>>,
}

/// Run every attempt in parallel and return outcomes in attempt order.
pub(crate) fn run_attempts(
    problem: &PenalizedProblem<'_>,
    start: &[f64],
    attempts: &[MinimizerAttempt],
) -> Vec<AttemptOutcome> {
    let mut outcomes: Vec<AttemptOutcome> = attempts
        .par_iter()
        .enumerate()
        .map(|(order, attempt)| match run_one(problem, start, attempt) {
            Ok((parameters, objective, converged, iterations)) => {
                tracing::debug!(
                    method = %attempt.name,
                    objective,
                    converged,
                    iterations,
                    "minimizer attempt finished"
                );
                AttemptOutcome {
                    order,
                    summary: AttemptSummary {
                        name: attempt.name.clone(),
                        objective: Some(objective),
                        converged,
                        iterations,
                        error: None,
                    },
                    parameters: Some(parameters),
                }
            }
            Err(err) => {
                tracing::debug!(method = %attempt.name, error = %err, "minimizer attempt excluded");
                AttemptOutcome {
                    order,
                    summary: AttemptSummary {
                        name: attempt.name.clone(),
                        objective: None,
                        converged: false,
                        iterations: 0,
                        error: Some(err.to_string()),
                    },
                    parameters: None,
                }
            }
        })
        .collect();
    outcomes.sort_by_key(|o| o.order);
    outcomes
}

/// Deterministic selection: lowest objective among converged attempts, else
/// lowest objective among all attempts that returned a vector. Ties go to the
/// earlier attempt.
pub(crate) fn select_best(outcomes: &[AttemptOutcome]) -> Option<&AttemptOutcome> {
    let usable = |require_converged: bool| {
        outcomes
            .iter()
            .filter(move |o| o.parameters.is_some() && (!require_converged || o.summary.converged))
            .filter_map(|o| o.summary.objective.map(|obj| (obj, o)))
            .fold(None::<(f64, &AttemptOutcome)>, |best, (obj, o)| match best {
                Some((b, _)) if obj >= b => best,
                _ => Some((obj, o)),
            })
            .map(|(_, o)| o)
    };
    usable(true).or_else(|| usable(false))
}

fn run_one(
    problem: &PenalizedProblem<'_>,
    start: &[f64],
    attempt: &MinimizerAttempt,
) -> Result<(Vec<f64>, f64, bool, u64), Error> {
    let x0 = problem.free.extract(start);
    let simplex = initial_simplex(&x0, problem.free, attempt.simplex_scale);

    let solver = NelderMead::new(simplex).with_sd_tolerance(attempt.sd_tolerance)?;
    let result = Executor::new(*problem, solver)
        .configure(|state| state.max_iters(attempt.max_iters))
        .run()?;

    let state = result.state();
    let best = state.get_best_param().cloned().unwrap_or(x0);
    let converged = matches!(
        state.get_termination_status(),
        TerminationStatus::Terminated(TerminationReason::SolverConverged)
    );
    Ok((
        problem.free.expand(&best),
        state.get_best_cost(),
        converged,
        state.get_iter(),
    ))
}

/// `x0` plus one vertex per free parameter, offset by `scale` × bound width.
/// Offsets point inwards when a step would leave the box.
fn initial_simplex(x0: &[f64], free: &FreeParameters, scale: f64) -> Vec<Vec<f64>> {
    let mut vertices = Vec::with_capacity(x0.len() + 1);
    vertices.push(x0.to_vec());
    for (i, bound) in free.free_bounds().enumerate() {
        let step = (bound.width() * scale).max(1e-8);
        let mut v = x0.to_vec();
        v[i] = if x0[i] + step <= bound.upper {
            x0[i] + step
        } else {
            x0[i] - step
        };
        vertices.push(v);
    }
    vertices
}
