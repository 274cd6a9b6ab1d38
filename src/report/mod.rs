//! Reporting utilities: the fitted equation and per-period residuals.

pub mod format;

pub use format::*;

use serde::{Deserialize, Serialize};

use crate::domain::{FitResult, FittedEquation, Series};
use crate::error::{CurveError, Result};
use crate::math::r_squared;
use crate::models::CompositeModel;

/// Turns a fitted composite into its human-readable form.
pub struct ModelReporter;

impl ModelReporter {
    /// Equation, R², parameters and per-period predictions for `fit`.
    ///
    /// R² is taken from the fit itself; predictions are recomputed at `xs`.
    pub fn render(model: &CompositeModel, fit: &FitResult, xs: &[f64]) -> Result<FittedEquation> {
        let predicted = model.evaluate(xs, &fit.parameters)?;
        Ok(FittedEquation {
            equation: model.render_equation(&fit.parameters)?,
            r_squared: fit.r_squared,
            parameters: fit.parameters.clone(),
            predicted,
        })
    }

    /// Like `render`, but scores R² against `observed` instead of trusting the fit.
    pub fn render_against(model: &CompositeModel, parameters: &[f64], xs: &[f64], observed: &[f64]) -> Result<FittedEquation> {
        let predicted = model.evaluate(xs, parameters)?;
        if predicted.len() != observed.len() {
            return Err(CurveError::ShapeMismatch {
                context: "render against observations",
                expected: predicted.len(),
                got: observed.len(),
            });
        }
        Ok(FittedEquation {
            equation: model.render_equation(parameters)?,
            r_squared: r_squared(observed, &predicted),
            parameters: parameters.to_vec(),
            predicted,
        })
    }
}

/// Observed vs fitted value for one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodResidual {
    pub index: usize,
    pub date: chrono::NaiveDate,
    pub observed: f64,
    pub predicted: f64,
    pub residual: f64,
}

/// Pair every observation with its prediction.
pub fn compute_residuals(series: &Series, equation: &FittedEquation) -> Result<Vec<PeriodResidual>> {
    if series.len() != equation.predicted.len() {
        return Err(CurveError::ShapeMismatch {
            context: "residuals",
            expected: series.len(),
            got: equation.predicted.len(),
        });
    }
    Ok(series
        .points()
        .iter()
        .zip(&equation.predicted)
        .map(|(p, &y_fit)| PeriodResidual {
            index: p.index,
            date: p.date,
            observed: p.value,
            predicted: y_fit,
            residual: p.value - y_fit,
        })
        .collect())
}
