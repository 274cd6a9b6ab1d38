//! Curve families and layer descriptors.

use serde::{Deserialize, Serialize};

use crate::domain::MarketConstants;
use crate::models::primitives;

/// Concrete primitive family of an additive term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveFamily {
    Demand,
    Reduction,
    Sticky,
    Competition,
    Cyclical,
    Seasonal,
}

impl CurveFamily {
    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            CurveFamily::Demand => "demand",
            CurveFamily::Reduction => "reduction",
            CurveFamily::Sticky => "sticky",
            CurveFamily::Competition => "competition",
            CurveFamily::Cyclical => "cyclical",
            CurveFamily::Seasonal => "seasonal",
        }
    }

    /// Parameter names, in slice order.
    pub fn parameter_names(self) -> &'static [&'static str] {
        match self {
            CurveFamily::Demand => &["m", "k", "shift"],
            CurveFamily::Reduction => &["v", "k", "shift"],
            CurveFamily::Sticky => &["m", "er", "cr", "shift"],
            CurveFamily::Competition => &["m"],
            CurveFamily::Cyclical => &["m", "p", "c", "shift", "e"],
            CurveFamily::Seasonal => &["m", "p", "c", "shift"],
        }
    }

    pub fn parameter_count(self) -> usize {
        self.parameter_names().len()
    }

    /// Evaluate the primitive at `x`.
    ///
    /// # Panics
    /// Panics if `params` is shorter than `parameter_count()`. The composite
    /// model validates lengths before calling this.
    pub fn evaluate(self, x: f64, params: &[f64], market: &MarketConstants) -> f64 {
        match self {
            CurveFamily::Demand => primitives::demand(x, params[0], params[1], params[2]),
            CurveFamily::Reduction => primitives::reduction(x, params[0], params[1], params[2]),
            CurveFamily::Sticky => primitives::sticky(x, params[0], params[1], params[2], params[3]),
            CurveFamily::Competition => primitives::competition(x, params[0], market),
            CurveFamily::Cyclical => {
                primitives::cyclical(x, params[0], params[1], params[2], params[3], params[4])
            }
            CurveFamily::Seasonal => {
                primitives::seasonal(x, params[0], params[1], params[2], params[3])
            }
        }
    }
}

/// Shape of one additive term. Stateless and reusable across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurveLayer {
    pub family: CurveFamily,
    pub parameter_names: Vec<String>,
    pub parameter_count: usize,
}

impl CurveLayer {
    pub fn new(family: CurveFamily) -> Self {
        let names = family.parameter_names();
        Self {
            family,
            parameter_names: names.iter().map(|s| s.to_string()).collect(),
            parameter_count: names.len(),
        }
    }

    pub fn demand() -> Self {
        Self::new(CurveFamily::Demand)
    }

    pub fn reduction() -> Self {
        Self::new(CurveFamily::Reduction)
    }

    pub fn sticky() -> Self {
        Self::new(CurveFamily::Sticky)
    }

    pub fn competition() -> Self {
        Self::new(CurveFamily::Competition)
    }

    pub fn cyclical() -> Self {
        Self::new(CurveFamily::Cyclical)
    }

    pub fn seasonal() -> Self {
        Self::new(CurveFamily::Seasonal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_counts_match_names() {
        for family in [
            CurveFamily::Demand,
            CurveFamily::Reduction,
            CurveFamily::Sticky,
            CurveFamily::Competition,
            CurveFamily::Cyclical,
            CurveFamily::Seasonal,
        ] {
            let layer = CurveLayer::new(family);
            assert_eq!(layer.parameter_count, layer.parameter_names.len());
        }
        assert_eq!(CurveLayer::cyclical().parameter_count, 5);
        assert_eq!(CurveLayer::competition().parameter_count, 1);
    }
}
