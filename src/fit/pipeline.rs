//! Layered fitting pipeline.
//!
//! The pipeline owns one composite model and grows it one layer family at a
//! time. Each stage appends freshly seeded instances and refits the whole
//! accumulated vector jointly, warm-started from the previous solution.
//!
//! ```text
//! Seeded -> DemandFit -> StickyFit -> CompetitionFit -> CyclicalFit -> SeasonalFit -> Done
//! ```
//!
//! Stages not listed in `FitConfig::stages` are passed through untouched.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{ExtremumKind, FitConfig, FitResult, FittedEquation, LayerStage, Series};
use crate::error::{CurveError, Result};
use crate::fit::constraints::{SoftConstraints, check_targets};
use crate::fit::engine::ConstrainedFitEngine;
use crate::fit::extrema::detect_extrema_with_window;
use crate::fit::seeds::{self, LayerSeed, SeriesScale};
use crate::models::CompositeModel;
use crate::report::ModelReporter;

/// Minimum number of observations the pipeline accepts.
pub const MIN_OBSERVATIONS: usize = 2;

/// Pipeline state. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineStage {
    Seeded,
    DemandFit,
    StickyFit,
    CompetitionFit,
    CyclicalFit,
    SeasonalFit,
    Done,
}

impl PipelineStage {
    pub fn next(self) -> PipelineStage {
        match self {
            PipelineStage::Seeded => PipelineStage::DemandFit,
            PipelineStage::DemandFit => PipelineStage::StickyFit,
            PipelineStage::StickyFit => PipelineStage::CompetitionFit,
            PipelineStage::CompetitionFit => PipelineStage::CyclicalFit,
            PipelineStage::CyclicalFit => PipelineStage::SeasonalFit,
            PipelineStage::SeasonalFit | PipelineStage::Done => PipelineStage::Done,
        }
    }

    /// The configurable fitting stage this state corresponds to, if any.
    pub fn layer_stage(self) -> Option<LayerStage> {
        match self {
            PipelineStage::DemandFit => Some(LayerStage::Demand),
            PipelineStage::StickyFit => Some(LayerStage::Sticky),
            PipelineStage::CompetitionFit => Some(LayerStage::Competition),
            PipelineStage::CyclicalFit => Some(LayerStage::Cyclical),
            PipelineStage::SeasonalFit => Some(LayerStage::Seasonal),
            PipelineStage::Seeded | PipelineStage::Done => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStage::Seeded => "seeded",
            PipelineStage::DemandFit => "demand-fit",
            PipelineStage::StickyFit => "sticky-fit",
            PipelineStage::CompetitionFit => "competition-fit",
            PipelineStage::CyclicalFit => "cyclical-fit",
            PipelineStage::SeasonalFit => "seasonal-fit",
            PipelineStage::Done => "done",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of one executed stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: PipelineStage,
    pub parameter_count: usize,
    pub objective: f64,
    pub r_squared: f64,
    pub converged: bool,
    pub method: Option<String>,
}

/// Everything a finished run produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub model: CompositeModel,
    pub fit: FitResult,
    pub history: Vec<StageReport>,
    pub equation: FittedEquation,
}

/// Forward-only state machine growing a composite model layer by layer.
#[derive(Debug, Clone)]
pub struct LayeredFittingPipeline {
    config: FitConfig,
    xs: Vec<f64>,
    target: Vec<f64>,
    scale: SeriesScale,
    engine: ConstrainedFitEngine,
    model: CompositeModel,
    stage: PipelineStage,
    last_fit: Option<FitResult>,
    history: Vec<StageReport>,
}

impl LayeredFittingPipeline {
    /// Validate inputs and seed one demand bump per peak and one reduction
    /// dip per valley.
    pub fn new(series: &Series, config: FitConfig) -> Result<Self> {
        config.validate()?;
        if series.len() < MIN_OBSERVATIONS {
            return Err(CurveError::DegenerateSeries {
                needed: MIN_OBSERVATIONS,
                got: series.len(),
            });
        }
        let target = series.values();
        check_targets(&target)?;

        let xs = series.xs();
        let scale = SeriesScale::from_values(&target);
        let mut model = CompositeModel::new(config.market);

        let peaks = detect_extrema_with_window(&target, ExtremumKind::Peak, config.extrema_window);
        let valleys = detect_extrema_with_window(&target, ExtremumKind::Valley, config.extrema_window);
        for peak in &peaks {
            append_seed(&mut model, seeds::demand_seed(peak, &scale, config.placement_slack))?;
        }
        for valley in &valleys {
            append_seed(&mut model, seeds::reduction_seed(valley, &scale, config.placement_slack))?;
        }
        tracing::info!(
            peaks = peaks.len(),
            valleys = valleys.len(),
            parameters = model.len(),
            "pipeline seeded"
        );

        let engine = ConstrainedFitEngine::new(
            SoftConstraints::new(config.threshold, config.penalty_scale),
            config.attempts.clone(),
            config.refine_max_iters,
        );

        Ok(Self {
            config,
            xs,
            target,
            scale,
            engine,
            model,
            stage: PipelineStage::Seeded,
            last_fit: None,
            history: Vec::new(),
        })
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn model(&self) -> &CompositeModel {
        &self.model
    }

    pub fn last_fit(&self) -> Option<&FitResult> {
        self.last_fit.as_ref()
    }

    pub fn history(&self) -> &[StageReport] {
        &self.history
    }

    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    /// Advance one transition and return the new state.
    ///
    /// A failed stage leaves the pipeline unchanged. At `Done` this is a no-op.
    pub fn step(&mut self) -> Result<PipelineStage> {
        if self.stage == PipelineStage::Done {
            return Ok(PipelineStage::Done);
        }
        let next = self.stage.next();

        match next.layer_stage() {
            Some(layer) if self.config.stages.contains(&layer) => self.fit_stage(next, layer)?,
            Some(_) => tracing::debug!(stage = %next, "stage skipped"),
            // Nothing was fitted yet: fit the seeded bumps so every run ends
            // with a solution.
            None if self.last_fit.is_none() => {
                let model = self.model.clone();
                self.commit(next, model)?;
            }
            None => {}
        }

        self.stage = next;
        Ok(next)
    }

    /// Step until `Done` and assemble the output.
    pub fn run(mut self) -> Result<PipelineOutput> {
        while self.stage != PipelineStage::Done {
            self.step()?;
        }
        let fit = self.last_fit.ok_or_else(|| {
            CurveError::FitFailure("pipeline finished without a fit".to_string())
        })?;
        let equation = ModelReporter::render(&self.model, &fit, &self.xs)?;
        Ok(PipelineOutput {
            model: self.model,
            fit,
            history: self.history,
            equation,
        })
    }

    fn fit_stage(&mut self, stage: PipelineStage, layer: LayerStage) -> Result<()> {
        let mut model = self.model.clone();
        let residual = self.residual()?;

        match layer {
            // Demand and reduction bumps were appended when seeding.
            LayerStage::Demand => {}
            LayerStage::Sticky => append_seed(&mut model, seeds::sticky_seed(&residual, &self.scale))?,
            LayerStage::Competition => append_seed(
                &mut model,
                seeds::competition_seed(&residual, &self.scale, &self.config.market),
            )?,
            LayerStage::Cyclical => append_seed(&mut model, seeds::cyclical_seed(&residual, &self.scale))?,
            LayerStage::Seasonal => append_seed(&mut model, seeds::seasonal_seed(&residual, &self.scale))?,
        }

        self.commit(stage, model)
    }

    fn commit(&mut self, stage: PipelineStage, mut model: CompositeModel) -> Result<()> {
        let initial = model.parameters().to_vec();
        let fit = match self.engine.fit(&model, &self.xs, &self.target, &initial) {
            Ok(fit) => fit,
            Err(err @ CurveError::FitFailure(_)) => {
                tracing::warn!(%stage, error = %err, "stage failed");
                return Err(CurveError::StageFailed {
                    stage,
                    source: Box::new(err),
                    last_fit: self.last_fit.clone().map(Box::new),
                });
            }
            Err(err) => return Err(err),
        };
        model.set_parameters(&fit.parameters)?;

        tracing::info!(
            %stage,
            parameters = model.len(),
            objective = fit.objective,
            r_squared = fit.r_squared,
            converged = fit.converged,
            "stage fitted"
        );
        self.history.push(StageReport {
            stage,
            parameter_count: model.len(),
            objective: fit.objective,
            r_squared: fit.r_squared,
            converged: fit.converged,
            method: fit.method.clone(),
        });
        self.model = model;
        self.last_fit = Some(fit);
        Ok(())
    }

    /// `y − ŷ` under the current parameters.
    fn residual(&self) -> Result<Vec<f64>> {
        let predicted = self.model.evaluate(&self.xs, self.model.parameters())?;
        Ok(self.target.iter().zip(&predicted).map(|(y, p)| y - p).collect())
    }
}

fn append_seed(model: &mut CompositeModel, seed: LayerSeed) -> Result<()> {
    model.append(seed.layer, &seed.initial, &seed.bounds)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MarketConstants, MinimizerAttempt};
    use crate::models::CurveFamily;
    use chrono::NaiveDate;

    fn series(values: &[f64]) -> Series {
        let start = NaiveDate::from_ymd_opt(2015, 1, 1).unwrap();
        Series::quarterly(start, values).unwrap()
    }

    fn families(model: &CompositeModel) -> Vec<CurveFamily> {
        model.instances().iter().map(|i| i.family()).collect()
    }

    #[test]
    fn stages_move_forward() {
        let mut s = PipelineStage::Seeded;
        let mut seen = vec![s];
        while s != PipelineStage::Done {
            s = s.next();
            seen.push(s);
        }
        assert_eq!(seen.len(), 7);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(PipelineStage::Done.next(), PipelineStage::Done);
        assert_eq!(PipelineStage::CompetitionFit.to_string(), "competition-fit");
    }

    #[test]
    fn seeding_places_bumps_on_extrema() {
        let p = LayeredFittingPipeline::new(&series(&[10.0, 12.0, 30.0, 14.0, 11.0]), FitConfig::default()).unwrap();
        assert_eq!(p.stage(), PipelineStage::Seeded);
        assert_eq!(families(p.model()), vec![CurveFamily::Demand, CurveFamily::Reduction]);
        assert_eq!(p.model().parameters()[2], 2.0);
        assert!(p.last_fit().is_none());
    }

    #[test]
    fn short_series_is_degenerate() {
        let err = LayeredFittingPipeline::new(&series(&[5.0]), FitConfig::default()).unwrap_err();
        assert!(matches!(err, CurveError::DegenerateSeries { needed: 2, got: 1 }));
    }

    #[test]
    fn zero_observation_is_rejected_up_front() {
        let err = LayeredFittingPipeline::new(&series(&[5.0, 0.0, 3.0]), FitConfig::default()).unwrap_err();
        assert!(matches!(err, CurveError::ConstraintEvaluation { index: 1 }));
    }

    #[test]
    fn backwards_stage_list_is_invalid() {
        let config = FitConfig {
            stages: vec![LayerStage::Cyclical, LayerStage::Sticky],
            ..FitConfig::default()
        };
        let err = LayeredFittingPipeline::new(&series(&[1.0, 2.0, 3.0]), config).unwrap_err();
        assert!(matches!(err, CurveError::InvalidConfig(_)));
    }

    #[test]
    fn skipped_stages_pass_through() {
        let config = FitConfig {
            stages: vec![LayerStage::Demand, LayerStage::Competition],
            ..FitConfig::default()
        };
        let values = [12.0, 15.0, 22.0, 18.0, 14.0, 13.0, 12.5, 12.0];
        let mut p = LayeredFittingPipeline::new(&series(&values), config).unwrap();

        assert_eq!(p.step().unwrap(), PipelineStage::DemandFit);
        let after_demand = p.model().len();
        assert_eq!(p.step().unwrap(), PipelineStage::StickyFit);
        assert_eq!(p.model().len(), after_demand);
        assert_eq!(p.step().unwrap(), PipelineStage::CompetitionFit);
        assert_eq!(p.model().len(), after_demand + 1);

        let out = p.run().unwrap();
        assert_eq!(out.history.len(), 2);
        assert_eq!(out.history[1].stage, PipelineStage::CompetitionFit);
        assert_eq!(out.equation.parameters, out.fit.parameters);
    }

    #[test]
    fn empty_stage_list_still_fits_the_seeds() {
        let config = FitConfig {
            stages: Vec::new(),
            ..FitConfig::default()
        };
        let out = LayeredFittingPipeline::new(&series(&[10.0, 12.0, 30.0, 14.0, 11.0]), config)
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(out.history.len(), 1);
        assert_eq!(out.history[0].stage, PipelineStage::Done);
        assert_eq!(out.fit.parameters.len(), out.model.len());
    }

    #[test]
    fn capped_minimizer_still_completes_the_stage() {
        let config = FitConfig {
            stages: vec![LayerStage::Demand],
            attempts: vec![MinimizerAttempt {
                name: "one-step".to_string(),
                simplex_scale: 0.25,
                sd_tolerance: 1e-12,
                max_iters: 1,
            }],
            ..FitConfig::default()
        };
        let out = LayeredFittingPipeline::new(&series(&[10.0, 12.0, 30.0, 14.0, 11.0]), config)
            .unwrap()
            .run()
            .unwrap();

        assert!(!out.fit.converged);
        assert_eq!(out.fit.method.as_deref(), Some("one-step"));
        assert_eq!(out.history.len(), 1);
        assert!(!out.history[0].converged);
        assert_eq!(out.fit.parameters.len(), out.model.len());
    }

    #[test]
    fn overflowing_competition_stage_fails_with_the_last_fit() {
        // A tiny HHI drives the competition exponent past f64 range.
        let config = FitConfig {
            market: MarketConstants { sam: 1000.0, hhi: 1e-3 },
            stages: vec![LayerStage::Demand, LayerStage::Competition],
            ..FitConfig::default()
        };
        let values = [20.0, 24.0, 35.0, 28.0, 22.0, 23.0, 25.0, 26.0];
        let mut p = LayeredFittingPipeline::new(&series(&values), config).unwrap();

        let err = loop {
            match p.step() {
                Ok(PipelineStage::Done) => panic!("competition stage should have failed"),
                Ok(_) => {}
                Err(err) => break err,
            }
        };

        let CurveError::StageFailed { stage, source, last_fit } = &err else {
            panic!("expected a stage failure, got {err:?}");
        };
        assert_eq!(*stage, PipelineStage::CompetitionFit);
        assert!(matches!(**source, CurveError::FitFailure(_)));
        let last_fit = last_fit.as_ref().expect("demand fit is kept");
        assert_eq!(last_fit.parameters.len(), 6);
        assert_eq!(err.exit_code(), 4);

        // The failed stage left the pipeline where it was.
        assert_eq!(p.stage(), PipelineStage::StickyFit);
        assert_eq!(families(p.model()), vec![CurveFamily::Demand, CurveFamily::Reduction]);
        assert_eq!(p.history().len(), 1);
    }
}
