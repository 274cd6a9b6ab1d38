//! Error surfaces.
//!
//! - `CurveError` is the library error: structural problems (shape, bounds,
//!   degenerate input) and numerical failures raised while fitting.
//! - `AppError` is the binary's error: a message plus the process exit code.
//!
//! Exit codes used by `lcf`:
//! - 2: invalid configuration / malformed input files
//! - 3: unusable data (degenerate series, zero targets)
//! - 4: numerical failure during fitting

use thiserror::Error;

use crate::domain::FitResult;
use crate::fit::PipelineStage;

/// Result alias for library operations.
pub type Result<T> = std::result::Result<T, CurveError>;

#[derive(Error, Debug, Clone)]
pub enum CurveError {
    /// A parameter or bounds vector disagrees with the declared count.
    #[error("shape mismatch in {context}: expected {expected}, got {got}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        got: usize,
    },

    /// A bound is malformed or an initial value lies outside its bound.
    #[error("invalid bounds: {0}")]
    InvalidBounds(String),

    /// Too few observations for window-based extrema detection.
    #[error("degenerate series: need at least {needed} points, got {got}")]
    DegenerateSeries { needed: usize, got: usize },

    /// The series contains NaN or infinite values.
    #[error("non-finite series value at index {index}")]
    NonFiniteValue { index: usize },

    /// A relative-error term divided by an observed value of exactly zero.
    #[error("relative error undefined at index {index}: observed value is zero")]
    ConstraintEvaluation { index: usize },

    /// The least-squares refinement could not proceed.
    #[error("fit failure: {0}")]
    FitFailure(String),

    /// A pipeline stage failed; the last successful fit is kept for diagnostics.
    #[error("stage {stage} failed: {source}")]
    StageFailed {
        stage: PipelineStage,
        #[source]
        source: Box<CurveError>,
        last_fit: Option<Box<FitResult>>,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("i/o error: {0}")]
    Io(String),
}

impl CurveError {
    /// Exit code used by the `lcf` binary for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            CurveError::ShapeMismatch { .. }
            | CurveError::InvalidBounds(_)
            | CurveError::InvalidConfig(_)
            | CurveError::Io(_) => 2,
            CurveError::DegenerateSeries { .. }
            | CurveError::NonFiniteValue { .. }
            | CurveError::ConstraintEvaluation { .. } => 3,
            CurveError::FitFailure(_) => 4,
            CurveError::StageFailed { source, .. } => source.exit_code(),
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<CurveError> for AppError {
    fn from(err: CurveError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        let shape = CurveError::ShapeMismatch {
            context: "append",
            expected: 3,
            got: 2,
        };
        assert_eq!(shape.exit_code(), 2);
        assert_eq!(CurveError::DegenerateSeries { needed: 2, got: 1 }.exit_code(), 3);

        let wrapped = CurveError::StageFailed {
            stage: PipelineStage::StickyFit,
            source: Box::new(CurveError::FitFailure("singular".into())),
            last_fit: None,
        };
        assert_eq!(wrapped.exit_code(), 4);
        let app: AppError = wrapped.into();
        assert_eq!(app.exit_code(), 4);
        assert!(app.to_string().contains("singular"));
    }
}
