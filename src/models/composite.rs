//! Additive composition of curve instances.
//!
//! A `CompositeModel` owns an ordered list of `CurveInstance`s together with
//! the flat parameter and bounds vectors the optimizers work on. Each instance
//! knows which slice of those vectors belongs to it, so callers never do slice
//! arithmetic themselves.
//!
//! Growth is append-only: instances are never removed or reordered, and the
//! values of previously appended slices are only changed by `set_parameters`
//! (i.e. after a joint refit).

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::domain::{Bound, MarketConstants};
use crate::error::{CurveError, Result};
use crate::models::layer::{CurveFamily, CurveLayer};

/// A layer bound to a slice of the global parameter vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveInstance {
    pub layer: CurveLayer,
    range: Range<usize>,
}

impl CurveInstance {
    pub fn family(&self) -> CurveFamily {
        self.layer.family
    }

    /// Slice of the parameter (and bounds) vector owned by this instance.
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    pub fn params<'a>(&self, parameters: &'a [f64]) -> &'a [f64] {
        &parameters[self.range.clone()]
    }

    /// Named-parameter record for this instance.
    pub fn named<'a>(&'a self, parameters: &[f64]) -> Vec<(&'a str, f64)> {
        self.layer
            .parameter_names
            .iter()
            .map(String::as_str)
            .zip(self.params(parameters).iter().copied())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCompositeModel")]
pub struct CompositeModel {
    market: MarketConstants,
    instances: Vec<CurveInstance>,
    parameters: Vec<f64>,
    bounds: Vec<Bound>,
}

/// Wire shape of `CompositeModel`, checked before it becomes one.
#[derive(Deserialize)]
struct RawCompositeModel {
    market: MarketConstants,
    instances: Vec<CurveInstance>,
    parameters: Vec<f64>,
    bounds: Vec<Bound>,
}

impl TryFrom<RawCompositeModel> for CompositeModel {
    type Error = CurveError;

    /// Instance ranges must tile `0..len` in order, one slot per declared
    /// parameter, with one bound per parameter.
    fn try_from(raw: RawCompositeModel) -> Result<Self> {
        let mut next = 0;
        for (i, inst) in raw.instances.iter().enumerate() {
            let layer = &inst.layer;
            let count = layer.family.parameter_count();
            if layer.parameter_count != count || layer.parameter_names.len() != count {
                return Err(CurveError::Io(format!(
                    "model instance {i} ({}) declares {} parameters, expected {count}",
                    layer.family.display_name(),
                    layer.parameter_count
                )));
            }
            if inst.range != (next..next + count) {
                return Err(CurveError::Io(format!(
                    "model instance {i} ({}) owns {:?}, expected {:?}",
                    layer.family.display_name(),
                    inst.range,
                    next..next + count
                )));
            }
            next += count;
        }
        if raw.parameters.len() != next || raw.bounds.len() != next {
            return Err(CurveError::Io(format!(
                "model has {} parameters and {} bounds, instances need {next}",
                raw.parameters.len(),
                raw.bounds.len()
            )));
        }
        Ok(Self {
            market: raw.market,
            instances: raw.instances,
            parameters: raw.parameters,
            bounds: raw.bounds,
        })
    }
}

impl CompositeModel {
    pub fn new(market: MarketConstants) -> Self {
        Self {
            market,
            instances: Vec::new(),
            parameters: Vec::new(),
            bounds: Vec::new(),
        }
    }

    pub fn market(&self) -> &MarketConstants {
        &self.market
    }

    pub fn instances(&self) -> &[CurveInstance] {
        &self.instances
    }

    pub fn parameters(&self) -> &[f64] {
        &self.parameters
    }

    pub fn bounds(&self) -> &[Bound] {
        &self.bounds
    }

    /// Total parameter count across all instances.
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Append a new instance and return its slice range.
    pub fn append(
        &mut self,
        layer: CurveLayer,
        initial_parameters: &[f64],
        bounds: &[Bound],
    ) -> Result<Range<usize>> {
        let count = layer.parameter_count;
        if initial_parameters.len() != count {
            return Err(CurveError::ShapeMismatch {
                context: "append initial parameters",
                expected: count,
                got: initial_parameters.len(),
            });
        }
        if bounds.len() != count {
            return Err(CurveError::ShapeMismatch {
                context: "append bounds",
                expected: count,
                got: bounds.len(),
            });
        }
        for ((name, &value), bound) in layer.parameter_names.iter().zip(initial_parameters).zip(bounds) {
            if !bound.is_valid() {
                return Err(CurveError::InvalidBounds(format!(
                    "{}.{name}: [{}, {}]",
                    layer.family.display_name(),
                    bound.lower,
                    bound.upper
                )));
            }
            if !bound.contains(value) {
                return Err(CurveError::InvalidBounds(format!(
                    "{}.{name}: initial value {value} outside [{}, {}]",
                    layer.family.display_name(),
                    bound.lower,
                    bound.upper
                )));
            }
        }

        let start = self.parameters.len();
        let range = start..start + count;
        self.parameters.extend_from_slice(initial_parameters);
        self.bounds.extend_from_slice(bounds);
        self.instances.push(CurveInstance {
            layer,
            range: range.clone(),
        });
        Ok(range)
    }

    /// Replace the stored parameter vector (e.g. after a fit).
    pub fn set_parameters(&mut self, parameters: &[f64]) -> Result<()> {
        self.check_len(parameters, "set parameters")?;
        self.parameters.copy_from_slice(parameters);
        Ok(())
    }

    /// Evaluate the composite at every `x`.
    pub fn evaluate(&self, xs: &[f64], parameters: &[f64]) -> Result<Vec<f64>> {
        self.check_len(parameters, "evaluate")?;
        Ok(xs.iter().map(|&x| self.evaluate_unchecked(x, parameters)).collect())
    }

    /// Evaluate at a single `x` without the length check.
    ///
    /// Hot path for the optimizers, which always pass full-length vectors.
    pub(crate) fn evaluate_unchecked(&self, x: f64, parameters: &[f64]) -> f64 {
        self.instances
            .iter()
            .map(|inst| inst.family().evaluate(x, inst.params(parameters), &self.market))
            .sum()
    }

    /// Render the model with `parameters` substituted, terms joined by ` + `.
    pub fn render_equation(&self, parameters: &[f64]) -> Result<String> {
        self.check_len(parameters, "render equation")?;
        if self.instances.is_empty() {
            return Ok("0".to_string());
        }
        let terms: Vec<String> = self
            .instances
            .iter()
            .map(|inst| render_term(inst.family(), inst.params(parameters), &self.market))
            .collect();

        // A term rendered with a leading minus is joined with " - " instead.
        let mut out = terms[0].clone();
        for term in &terms[1..] {
            match term.strip_prefix('-') {
                Some(rest) => {
                    out.push_str(" - ");
                    out.push_str(rest);
                }
                None => {
                    out.push_str(" + ");
                    out.push_str(term);
                }
            }
        }
        Ok(out)
    }

    /// `(instance label, parameter name, value)` for every parameter.
    pub fn named_parameters(&self, parameters: &[f64]) -> Result<Vec<(String, String, f64)>> {
        self.check_len(parameters, "named parameters")?;
        let mut out = Vec::with_capacity(parameters.len());
        for (i, inst) in self.instances.iter().enumerate() {
            let label = format!("{}#{i}", inst.family().display_name());
            for (name, value) in inst.named(parameters) {
                out.push((label.clone(), name.to_string(), value));
            }
        }
        Ok(out)
    }

    fn check_len(&self, parameters: &[f64], context: &'static str) -> Result<()> {
        if parameters.len() != self.parameters.len() {
            return Err(CurveError::ShapeMismatch {
                context,
                expected: self.parameters.len(),
                got: parameters.len(),
            });
        }
        Ok(())
    }
}

fn render_term(family: CurveFamily, p: &[f64], market: &MarketConstants) -> String {
    match family {
        CurveFamily::Demand => format!(
            "{} * exp(-{}^2 / {})",
            fmt_num(p[0]),
            offset(p[2]),
            fmt_num(p[1])
        ),
        CurveFamily::Reduction => {
            let (op, v) = signed(-p[0]);
            format!(
                "({} {op} {v} * exp(-{}^2 / {}))",
                fmt_num(p[0]),
                offset(p[2]),
                fmt_num(p[1])
            )
        }
        CurveFamily::Sticky => {
            let (op, cr) = signed(-p[2]);
            format!(
                "{} * ln({}^({} {op} {cr})) * [x > {}]",
                fmt_num(p[0]),
                offset(p[3]),
                fmt_num(p[1]),
                fmt_num(p[3])
            )
        }
        // The square makes the sign of `m` irrelevant.
        CurveFamily::Competition => format!(
            "-({}^2 / {}) * x^((1000 / {}) / 3)",
            fmt_num(p[0].abs()),
            fmt_num(market.sam),
            fmt_num(market.hhi)
        ),
        CurveFamily::Cyclical => {
            let (op, shift) = signed(-p[3]);
            format!(
                "{} * {} * |sin({} * x {op} {shift})|^{}",
                fmt_num(p[0]),
                fmt_num(p[1]),
                fmt_num(p[2]),
                fmt_num(p[4])
            )
        }
        CurveFamily::Seasonal => {
            let (op_p, prob) = signed(p[1]);
            let (op_s, shift) = signed(p[3]);
            format!(
                "{} * (1 {op_p} {prob} * sin(2π * (1/4) * ({} * x {op_s} {shift})))",
                fmt_num(p[0]),
                fmt_num(p[2])
            )
        }
    }
}

/// `(x - shift)` with the sign folded in for negative shifts.
fn offset(shift: f64) -> String {
    let (op, s) = signed(-shift);
    format!("(x {op} {s})")
}

/// Operator and magnitude for adding `v` to a preceding expression.
fn signed(v: f64) -> (char, String) {
    if v.is_sign_negative() { ('-', fmt_num(-v)) } else { ('+', fmt_num(v)) }
}

/// Compact number formatting with trailing zeros trimmed.
///
/// Six decimals in the usual range; six significant digits in exponent form
/// below `1e-4` or from `1e9` up, so small fitted values keep their digits.
pub fn fmt_num(v: f64) -> String {
    let a = v.abs();
    if v != 0.0 && a.is_finite() && !(1e-4..1e9).contains(&a) {
        let s = format!("{v:.6e}");
        return match s.split_once('e') {
            Some((mantissa, exp)) => {
                format!("{}e{exp}", mantissa.trim_end_matches('0').trim_end_matches('.'))
            }
            None => s,
        };
    }
    let s = format!("{v:.6}");
    let s = if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    };
    if s == "-0" { "0".to_string() } else { s }
}
