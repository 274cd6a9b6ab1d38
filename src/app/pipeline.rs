//! Shared "fit a series" workflow used by the `fit` and `demo` commands.
//!
//! series -> layered pipeline -> rendered equation -> per-period residuals
//!
//! The commands can then focus on presentation (printing vs exporting).

use crate::domain::{FitConfig, Series};
use crate::error::AppError;
use crate::fit::{LayeredFittingPipeline, PipelineOutput};
use crate::io::ModelExport;
use crate::report::{PeriodResidual, compute_residuals};

/// All computed outputs of a single run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub series: Series,
    pub config: FitConfig,
    pub output: PipelineOutput,
    pub residuals: Vec<PeriodResidual>,
}

impl RunOutput {
    pub fn to_export(&self) -> ModelExport {
        ModelExport {
            generated_at: chrono::Utc::now().naive_utc(),
            config: self.config.clone(),
            model: self.output.model.clone(),
            fit: self.output.fit.clone(),
            equation: self.output.equation.clone(),
            history: self.output.history.clone(),
        }
    }
}

/// Execute the full layered fit and return the computed outputs.
pub fn run_fit(series: Series, config: FitConfig) -> Result<RunOutput, AppError> {
    let pipeline = LayeredFittingPipeline::new(&series, config.clone())?;
    let output = pipeline.run()?;
    let residuals = compute_residuals(&series, &output.equation)?;

    Ok(RunOutput {
        series,
        config,
        output,
        residuals,
    })
}
