//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized (important for future snapshot tests)

use crate::domain::{Extremum, FitConfig, FitResult, FittedEquation, LayerStage, Series};
use crate::fit::StageReport;
use crate::models::CompositeModel;
use crate::report::PeriodResidual;

/// Format the full run summary (dataset, stage history, final model).
pub fn format_run_summary(
    series: &Series,
    config: &FitConfig,
    history: &[StageReport],
    fit: &FitResult,
    equation: &FittedEquation,
) -> String {
    let mut out = String::new();

    out.push_str("=== lcf - Layered Curve Fit ===\n");
    if let (Some(first), Some(last)) = (series.points().first(), series.points().last()) {
        out.push_str(&format!("Series: n={} | {} .. {}\n", series.len(), first.date, last.date));
    }
    out.push_str(&format!(
        "Market: SAM={} HHI={} | threshold={:.1}%\n",
        config.market.sam,
        config.market.hhi,
        config.threshold * 100.0
    ));
    let stages: Vec<&str> = config.stages.iter().map(|s| stage_name(*s)).collect();
    out.push_str(&format!("Stages: {}\n", stages.join(" -> ")));

    out.push_str("\nStage history:\n");
    for r in history {
        let flag = if r.converged { " " } else { "!" };
        out.push_str(&format!(
            "{flag} {:<16} params={:<3} R2={:.4} objective={:.4} method={}\n",
            r.stage.as_str(),
            r.parameter_count,
            r.r_squared,
            r.objective,
            r.method.as_deref().unwrap_or("-"),
        ));
    }

    out.push_str("\nFinal model:\n");
    out.push_str(&format!("- R2        : {:.6}\n", equation.r_squared));
    out.push_str(&format!(
        "- RMSE      : {:.6}\n",
        crate::math::rmse(&series.values(), &equation.predicted)
    ));
    out.push_str(&format!("- constraint: {:.6}\n", fit.constraint));
    out.push_str(&format!("- converged : {}\n", fit.converged));
    out.push_str(&format!("- y = {}\n", equation.equation));
    out.push('\n');

    out
}

/// One line per parameter, grouped by instance.
pub fn format_parameters(model: &CompositeModel, parameters: &[f64]) -> String {
    let mut out = String::new();
    let Ok(named) = model.named_parameters(parameters) else {
        return out;
    };
    for (label, name, value) in named {
        out.push_str(&format!("{label:<16} {name:<6} {value:>14.6}\n"));
    }
    out
}

/// Observed / fitted / residual table.
pub fn format_residuals(rows: &[PeriodResidual]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:>5} {:<10} {:>12} {:>12} {:>12}\n",
            "idx", "date", "observed", "fitted", "residual"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<5} {:-<10} {:-<12} {:-<12} {:-<12}\n", "", "", "", "", "").trim_end());
    out.push('\n');

    for r in rows {
        out.push_str(&format!(
            "{:>5} {:<10} {:>12.3} {:>12.3} {:>12.3}\n",
            r.index, r.date, r.observed, r.predicted, r.residual
        ));
    }

    out
}

/// Detected extrema, one per line.
pub fn format_extrema(extrema: &[Extremum], series: &Series) -> String {
    let mut out = String::new();
    for e in extrema {
        let date = series
            .points()
            .get(e.index)
            .map(|p| p.date.to_string())
            .unwrap_or_default();
        out.push_str(&format!("{:?} {:>5} {:<10} {:>12.3}\n", e.kind, e.index, date, e.value));
    }
    out
}

fn stage_name(stage: LayerStage) -> &'static str {
    match stage {
        LayerStage::Demand => "demand",
        LayerStage::Sticky => "sticky",
        LayerStage::Competition => "competition",
        LayerStage::Cyclical => "cyclical",
        LayerStage::Seasonal => "seasonal",
    }
}
