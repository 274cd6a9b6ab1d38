//! Initial guesses and bounds for newly appended layers.
//!
//! Seeds are derived from simple statistics of the series (its scale and
//! length) and of the residual the current composite leaves behind. Every
//! initial value is clamped into its bound, and every bound keeps its
//! primitive finite on `[0, N)`: widths `k ≥ 0.5`, exponents `e ≥ 0.5`.

use std::f64::consts::PI;

use crate::domain::{Bound, Extremum, MarketConstants};
use crate::math::mean;
use crate::models::CurveLayer;

/// Smallest allowed Gaussian width.
pub const K_MIN: f64 = 0.5;

/// A layer together with its starting point and box.
#[derive(Debug, Clone)]
pub struct LayerSeed {
    pub layer: CurveLayer,
    pub initial: Vec<f64>,
    pub bounds: Vec<Bound>,
}

impl LayerSeed {
    fn new(layer: CurveLayer, initial: Vec<f64>, bounds: Vec<Bound>) -> Self {
        let initial = initial.iter().zip(&bounds).map(|(&v, b)| b.clamp(v)).collect();
        Self {
            layer,
            initial,
            bounds,
        }
    }
}

/// Scale statistics shared by all seeds of one run.
#[derive(Debug, Clone, Copy)]
pub struct SeriesScale {
    pub n: usize,
    /// `max |y|`, floored away from zero.
    pub amplitude: f64,
    pub mean: f64,
}

impl SeriesScale {
    pub fn from_values(values: &[f64]) -> Self {
        let amplitude = values.iter().fold(0.0_f64, |m, v| m.max(v.abs())).max(f64::EPSILON);
        Self {
            n: values.len(),
            amplitude,
            mean: mean(values),
        }
    }

    fn last_index(&self) -> f64 {
        self.n.saturating_sub(1).max(1) as f64
    }

    fn width_bound(&self) -> Bound {
        let n = self.n as f64;
        Bound::new(K_MIN, (n * n).max(4.0))
    }

    fn width_guess(&self) -> f64 {
        let quarter = (self.n as f64 / 4.0).max(1.0);
        quarter * quarter
    }

    fn placement(&self, index: usize, slack: f64) -> Bound {
        let at = index as f64;
        Bound::new((at - slack).max(0.0), (at + slack).min(self.last_index()).max(at))
    }
}

/// Demand bump centered on a detected peak.
pub fn demand_seed(peak: &Extremum, scale: &SeriesScale, slack: f64) -> LayerSeed {
    let a = scale.amplitude;
    LayerSeed::new(
        CurveLayer::demand(),
        vec![peak.value, scale.width_guess(), peak.index as f64],
        vec![
            Bound::new(-2.0 * a, 2.0 * a),
            scale.width_bound(),
            scale.placement(peak.index, slack),
        ],
    )
}

/// Reduction dip centered on a detected valley.
pub fn reduction_seed(valley: &Extremum, scale: &SeriesScale, slack: f64) -> LayerSeed {
    let a = scale.amplitude;
    LayerSeed::new(
        CurveLayer::reduction(),
        vec![scale.mean - valley.value, scale.width_guess(), valley.index as f64],
        vec![
            Bound::new(-2.0 * a, 2.0 * a),
            scale.width_bound(),
            scale.placement(valley.index, slack),
        ],
    )
}

/// Logarithmic growth switched on around the midpoint.
pub fn sticky_seed(residual: &[f64], scale: &SeriesScale) -> LayerSeed {
    let a = scale.amplitude;
    let mid = scale.n / 2;
    let tail = residual.get(mid..).map(mean).unwrap_or(0.0);
    LayerSeed::new(
        CurveLayer::sticky(),
        vec![0.5 * tail, 1.5, 1.0, mid as f64],
        vec![
            Bound::new(-a, a),
            Bound::new(0.0, 5.0),
            Bound::new(0.0, 5.0),
            Bound::new(0.0, scale.last_index()),
        ],
    )
}

/// Competition erosion sized so the last period loses at most `max |y|`.
pub fn competition_seed(residual: &[f64], scale: &SeriesScale, market: &MarketConstants) -> LayerSeed {
    let a = scale.amplitude;
    let reach = scale.last_index().powf(market.competition_exponent()).max(f64::EPSILON);
    let m_max = (a * market.sam / reach).sqrt();
    let shortfall = residual.last().map(|r| (-r).max(0.0)).unwrap_or(0.0).max(0.01 * a);
    LayerSeed::new(
        CurveLayer::competition(),
        vec![(shortfall * market.sam / reach).sqrt()],
        vec![Bound::new(0.0, m_max)],
    )
}

/// Business-cycle ripple sized from the residual range.
pub fn cyclical_seed(residual: &[f64], scale: &SeriesScale) -> LayerSeed {
    let a = scale.amplitude;
    let (lo, hi) = residual
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| (lo.min(r), hi.max(r)));
    let half_range = if lo.is_finite() && hi.is_finite() { 0.5 * (hi - lo) } else { 0.0 };
    let c0 = 2.0 * PI / (scale.n as f64).max(4.0);
    LayerSeed::new(
        CurveLayer::cyclical(),
        vec![2.0 * half_range, 0.5, c0, 0.0, 1.0],
        vec![
            Bound::new(-a, a),
            Bound::new(0.0, 1.0),
            Bound::new(0.01, PI),
            Bound::new(0.0, PI),
            Bound::new(0.5, 4.0),
        ],
    )
}

/// Quarterly seasonality around the residual level.
pub fn seasonal_seed(residual: &[f64], scale: &SeriesScale) -> LayerSeed {
    let a = scale.amplitude;
    let level = mean(residual);
    let m0 = if level.abs() < 1e-3 * a { 0.01 * a } else { level };
    LayerSeed::new(
        CurveLayer::seasonal(),
        vec![m0, 0.1, 1.0, 0.0],
        vec![
            Bound::new(-a, a),
            Bound::new(-1.0, 1.0),
            Bound::new(0.5, 2.0),
            Bound::new(0.0, 4.0),
        ],
    )
}
