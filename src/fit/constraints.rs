//! Soft accuracy constraints and the penalized objective.
//!
//! Two conditions are evaluated on the model output against the target:
//!
//! - **final period**: the relative error at the last observed period must not
//!   exceed the threshold. Contributes `threshold − rel_err_last`.
//! - **no two consecutive misses**: no two adjacent periods may both exceed
//!   the threshold. Contributes `0` when satisfied and the fixed
//!   `CONSECUTIVE_MISS_SENTINEL` otherwise (not proportional).
//!
//! The combined value is the minimum of the two and is non-negative exactly
//! when both hold. The step-1 objective adds `penalty_scale · |c|` to the SSE
//! whenever `c < 0`.

use crate::error::{CurveError, Result};
use crate::math::sse;

/// Constraint value reported when two adjacent periods both miss.
pub const CONSECUTIVE_MISS_SENTINEL: f64 = -1e6;

/// Thresholds and scaling for the soft constraints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoftConstraints {
    pub threshold: f64,
    pub penalty_scale: f64,
}

impl SoftConstraints {
    pub fn new(threshold: f64, penalty_scale: f64) -> Self {
        Self {
            threshold,
            penalty_scale,
        }
    }

    /// Combined constraint value (most violated of the two conditions).
    pub fn value(&self, target: &[f64], predicted: &[f64]) -> Result<f64> {
        let rel = relative_errors(target, predicted)?;
        let Some(&last) = rel.last() else {
            return Ok(0.0);
        };

        let final_period = self.threshold - last;
        let consecutive = if rel.windows(2).any(|w| w[0] > self.threshold && w[1] > self.threshold) {
            CONSECUTIVE_MISS_SENTINEL
        } else {
            0.0
        };

        Ok(final_period.min(consecutive))
    }

    /// `SSE + penalty_scale · |c|` when the constraint value `c` is negative.
    pub fn objective(&self, target: &[f64], predicted: &[f64]) -> Result<f64> {
        let c = self.value(target, predicted)?;
        Ok(sse(target, predicted) + self.penalty(c))
    }

    pub fn penalty(&self, constraint: f64) -> f64 {
        if constraint < 0.0 {
            self.penalty_scale * constraint.abs()
        } else {
            0.0
        }
    }
}

/// Reject targets the relative error cannot be computed against.
pub fn check_targets(target: &[f64]) -> Result<()> {
    match target.iter().position(|&y| y == 0.0) {
        Some(index) => Err(CurveError::ConstraintEvaluation { index }),
        None => Ok(()),
    }
}

/// `|ŷ_i − y_i| / |y_i|` for every period.
pub fn relative_errors(target: &[f64], predicted: &[f64]) -> Result<Vec<f64>> {
    if target.len() != predicted.len() {
        return Err(CurveError::ShapeMismatch {
            context: "relative errors",
            expected: target.len(),
            got: predicted.len(),
        });
    }
    target
        .iter()
        .zip(predicted)
        .enumerate()
        .map(|(index, (&y, &p))| {
            if y == 0.0 {
                Err(CurveError::ConstraintEvaluation { index })
            } else {
                Ok((p - y).abs() / y.abs())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn soft() -> SoftConstraints {
        SoftConstraints::new(0.15, 1e6)
    }

    #[test]
    fn both_conditions_hold() {
        let y = [10.0, 10.0, 10.0, 10.0];
        let p = [11.0, 10.5, 9.0, 10.2];
        let c = soft().value(&y, &p).unwrap();
        assert!(c >= 0.0);
        assert!((c - 0.13).abs() < 1e-12);
        assert_eq!(soft().objective(&y, &p).unwrap(), crate::math::sse(&y, &p));
    }

    #[test]
    fn isolated_misses_are_allowed() {
        let y = [10.0, 10.0, 10.0, 10.0, 10.0];
        let p = [13.0, 10.0, 7.0, 10.0, 10.0];
        assert!(soft().value(&y, &p).unwrap() >= 0.0);
    }

    #[test]
    fn final_period_violation_is_proportional() {
        let y = [10.0, 10.0, 10.0];
        let p = [10.0, 10.0, 12.0];
        let c = soft().value(&y, &p).unwrap();
        assert!((c - (0.15 - 0.2)).abs() < 1e-12);
        assert_ne!(c, CONSECUTIVE_MISS_SENTINEL);
        let obj = soft().objective(&y, &p).unwrap();
        assert!((obj - (4.0 + 1e6 * 0.05)).abs() < 1e-6);
    }

    #[test]
    fn consecutive_misses_hit_the_sentinel() {
        let y = [10.0, 10.0, 10.0, 10.0];
        let p = [10.0, 13.0, 7.0, 10.0];
        assert_eq!(soft().value(&y, &p).unwrap(), CONSECUTIVE_MISS_SENTINEL);
    }

    #[test]
    fn zero_target_is_an_error() {
        let err = soft().value(&[1.0, 0.0, 2.0], &[1.0, 1.0, 2.0]).unwrap_err();
        assert!(matches!(err, CurveError::ConstraintEvaluation { index: 1 }));
        assert!(check_targets(&[1.0, 0.0]).is_err());
        assert!(check_targets(&[1.0, -2.0]).is_ok());
    }

    #[test]
    fn negative_targets_use_absolute_scale() {
        let rel = relative_errors(&[-10.0], &[-11.0]).unwrap();
        assert!((rel[0] - 0.1).abs() < 1e-12);
    }
}
