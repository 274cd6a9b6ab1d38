//! Shared domain types.
//!
//! These types are kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON/CSV
//! - reloaded later by downstream reporting tools

use chrono::{Months, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{CurveError, Result};

/// One observation of the input series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub index: usize,
    pub date: NaiveDate,
    pub value: f64,
}

/// A clean, chronologically ordered series.
///
/// Indices are contiguous `0..N-1` and every value is finite. Cleaning
/// (dropping missing rows, unit scaling) happens before construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    points: Vec<SeriesPoint>,
}

impl Series {
    /// Build a series from dated observations, in the given order.
    pub fn new(observations: Vec<(NaiveDate, f64)>) -> Result<Self> {
        let mut points = Vec::with_capacity(observations.len());
        for (index, (date, value)) in observations.into_iter().enumerate() {
            if !value.is_finite() {
                return Err(CurveError::NonFiniteValue { index });
            }
            points.push(SeriesPoint { index, date, value });
        }
        Ok(Self { points })
    }

    /// Build a quarterly series starting at `start`, one value per quarter.
    pub fn quarterly(start: NaiveDate, values: &[f64]) -> Result<Self> {
        let mut observations = Vec::with_capacity(values.len());
        for (i, &value) in values.iter().enumerate() {
            let date = start
                .checked_add_months(Months::new(3 * i as u32))
                .ok_or_else(|| CurveError::InvalidConfig(format!("date overflow at period {i}")))?;
            observations.push((date, value));
        }
        Self::new(observations)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    /// Period indices as model coordinates (`0.0, 1.0, ...`).
    pub fn xs(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.index as f64).collect()
    }
}

/// Direction of a detected extremum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtremumKind {
    Peak,
    Valley,
}

/// A locally dominant point of the series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extremum {
    pub index: usize,
    pub value: f64,
    pub kind: ExtremumKind,
}

/// Hard box bound for one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    pub lower: f64,
    pub upper: f64,
}

impl Bound {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// A degenerate bound that pins the parameter to `value`.
    pub fn fixed(value: f64) -> Self {
        Self {
            lower: value,
            upper: value,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.lower.is_finite() && self.upper.is_finite() && self.lower <= self.upper
    }

    pub fn is_fixed(&self) -> bool {
        self.lower == self.upper
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.lower).min(self.upper)
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Market constants for the competition term. Not fitted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketConstants {
    /// Serviceable addressable market. Larger values shrink the competition term.
    pub sam: f64,
    /// Herfindahl–Hirschman concentration index. Controls the term's curvature
    /// through the exponent `(1000 / HHI) / 3`.
    pub hhi: f64,
}

impl Default for MarketConstants {
    fn default() -> Self {
        Self {
            sam: 1_000.0,
            hhi: 1_500.0,
        }
    }
}

impl MarketConstants {
    pub fn competition_exponent(&self) -> f64 {
        (1000.0 / self.hhi) / 3.0
    }
}

/// A fitting stage that appends layers to the composite.
///
/// The declaration order is the only order in which stages may run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LayerStage {
    Demand,
    Sticky,
    Competition,
    Cyclical,
    Seasonal,
}

impl LayerStage {
    pub const ALL: [LayerStage; 5] = [
        LayerStage::Demand,
        LayerStage::Sticky,
        LayerStage::Competition,
        LayerStage::Cyclical,
        LayerStage::Seasonal,
    ];
}

/// One step-1 minimizer run: a Nelder–Mead variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinimizerAttempt {
    pub name: String,
    /// Initial simplex offset, as a fraction of each parameter's bound width.
    pub simplex_scale: f64,
    /// Standard-deviation tolerance of the simplex cost values.
    pub sd_tolerance: f64,
    pub max_iters: u64,
}

impl MinimizerAttempt {
    /// Default sequence: a tight local search, then progressively wider,
    /// more forgiving searches.
    pub fn defaults() -> Vec<MinimizerAttempt> {
        vec![
            MinimizerAttempt {
                name: "nelder-mead-tight".to_string(),
                simplex_scale: 0.05,
                sd_tolerance: 1e-10,
                max_iters: 4_000,
            },
            MinimizerAttempt {
                name: "nelder-mead-wide".to_string(),
                simplex_scale: 0.25,
                sd_tolerance: 1e-8,
                max_iters: 3_000,
            },
            MinimizerAttempt {
                name: "nelder-mead-robust".to_string(),
                simplex_scale: 0.5,
                sd_tolerance: 1e-6,
                max_iters: 2_000,
            },
        ]
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// Derived from CLI flags (plus defaults) by the binary; library callers can
/// start from `FitConfig::default()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitConfig {
    pub market: MarketConstants,
    /// Relative-error threshold used by both accuracy constraints.
    pub threshold: f64,
    /// Multiplier applied to constraint violations in the step-1 objective.
    pub penalty_scale: f64,
    /// Look-back / look-forward window of the extrema detector.
    pub extrema_window: usize,
    /// How far (in periods) a seeded bump may move from its extremum.
    /// Zero pins the bump center to the detected index.
    pub placement_slack: f64,
    /// Fitting stages to run, in forward order.
    pub stages: Vec<LayerStage>,
    pub attempts: Vec<MinimizerAttempt>,
    /// Iteration cap of the Levenberg–Marquardt refinement.
    pub refine_max_iters: usize,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            market: MarketConstants::default(),
            threshold: 0.15,
            penalty_scale: 1e6,
            extrema_window: 8,
            placement_slack: 0.0,
            stages: LayerStage::ALL.to_vec(),
            attempts: MinimizerAttempt::defaults(),
            refine_max_iters: 200,
        }
    }
}

impl FitConfig {
    pub fn validate(&self) -> Result<()> {
        let m = &self.market;
        if !(m.sam.is_finite() && m.sam > 0.0) {
            return Err(CurveError::InvalidConfig(format!("SAM must be finite and > 0, got {}", m.sam)));
        }
        if !(m.hhi.is_finite() && m.hhi > 0.0) {
            return Err(CurveError::InvalidConfig(format!("HHI must be finite and > 0, got {}", m.hhi)));
        }
        if !(self.threshold.is_finite() && self.threshold > 0.0) {
            return Err(CurveError::InvalidConfig(format!(
                "relative-error threshold must be > 0, got {}",
                self.threshold
            )));
        }
        if !(self.penalty_scale.is_finite() && self.penalty_scale >= 0.0) {
            return Err(CurveError::InvalidConfig(format!(
                "penalty scale must be >= 0, got {}",
                self.penalty_scale
            )));
        }
        if self.extrema_window == 0 {
            return Err(CurveError::InvalidConfig("extrema window must be >= 1".to_string()));
        }
        if !(self.placement_slack.is_finite() && self.placement_slack >= 0.0) {
            return Err(CurveError::InvalidConfig("placement slack must be >= 0".to_string()));
        }
        for pair in self.stages.windows(2) {
            if pair[0] >= pair[1] {
                return Err(CurveError::InvalidConfig(format!(
                    "stages must run forward without repeats: {:?} then {:?}",
                    pair[0], pair[1]
                )));
            }
        }
        for a in &self.attempts {
            if !(a.simplex_scale.is_finite() && a.simplex_scale > 0.0) || a.max_iters == 0 {
                return Err(CurveError::InvalidConfig(format!("invalid minimizer attempt '{}'", a.name)));
            }
        }
        Ok(())
    }
}

/// Outcome of one step-1 minimizer attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptSummary {
    pub name: String,
    pub objective: Option<f64>,
    pub converged: bool,
    pub iterations: u64,
    /// Set when the attempt raised and was excluded.
    pub error: Option<String>,
}

/// Output of one constrained fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub parameters: Vec<f64>,
    /// Whether the retained step-1 attempt met its tolerance.
    pub converged: bool,
    /// Penalized objective at the final parameters.
    pub objective: f64,
    pub r_squared: f64,
    /// Combined soft-constraint value at the final parameters.
    pub constraint: f64,
    /// Name of the step-1 attempt whose result seeded the refinement.
    pub method: Option<String>,
    pub attempts: Vec<AttemptSummary>,
}

/// Final rendered model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedEquation {
    pub equation: String,
    pub r_squared: f64,
    pub parameters: Vec<f64>,
    pub predicted: Vec<f64>,
}
