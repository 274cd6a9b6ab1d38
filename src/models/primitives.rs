//! Curve primitives.
//!
//! Each family is a pure function of the period coordinate `x` and its own
//! parameters:
//!
//! - demand:      `m · exp(−(x−shift)²/k)`
//! - reduction:   `v − v · exp(−(x−shift)²/k)`
//! - sticky:      `m · ln((x−shift)^(er−cr))` for `x > shift`, else 0
//! - competition: `−(m²/SAM) · x^((1000/HHI)/3)`
//! - cyclical:    `m · p · |sin(c·x − shift)|^e`
//! - seasonal:    `m · (1 + p·sin(2π·(1/4)·(c·x + shift)))`
//!
//! Bounds (see `fit::seeds`) keep `k > 0`, `e > 0` and `HHI > 0`, so every
//! family is finite on `x ∈ [0, N)`.

use std::f64::consts::PI;

use crate::domain::MarketConstants;

/// Periods per seasonal cycle (quarterly data).
pub const SEASONAL_PERIOD: f64 = 4.0;

/// Gaussian launch/adoption bump.
pub fn demand(x: f64, m: f64, k: f64, shift: f64) -> f64 {
    let d = x - shift;
    m * (-(d * d) / k).exp()
}

/// Inverted bump saturating towards `v` away from `shift`.
pub fn reduction(x: f64, v: f64, k: f64, shift: f64) -> f64 {
    let d = x - shift;
    v - v * (-(d * d) / k).exp()
}

/// Logarithmic residual growth, active only past `shift`.
///
/// `ln(a^b) = b·ln(a)` for `a > 0`; the product form stays finite when the
/// exponent `er − cr` is negative or zero.
pub fn sticky(x: f64, m: f64, er: f64, cr: f64, shift: f64) -> f64 {
    if x > shift {
        m * (er - cr) * (x - shift).ln()
    } else {
        0.0
    }
}

/// Monotone erosion from market saturation and concentration.
pub fn competition(x: f64, m: f64, market: &MarketConstants) -> f64 {
    -(m * m / market.sam) * x.powf(market.competition_exponent())
}

/// Amplitude-modulated absolute sine.
pub fn cyclical(x: f64, m: f64, p: f64, c: f64, shift: f64, e: f64) -> f64 {
    m * p * (c * x - shift).sin().abs().powf(e)
}

/// Quarterly seasonality around the level `m`.
pub fn seasonal(x: f64, m: f64, p: f64, c: f64, shift: f64) -> f64 {
    m * (1.0 + p * (2.0 * PI * (1.0 / SEASONAL_PERIOD) * (c * x + shift)).sin())
}
