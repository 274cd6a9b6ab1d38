//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and installs the log subscriber
//! - parses CLI arguments
//! - runs the layered fit on a CSV or synthetic series
//! - prints reports and writes optional exports

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, DemoArgs, ExtremaArgs, FitArgs, FitOptions, ShowArgs};
use crate::data::{SampleSpec, generate_sample};
use crate::domain::{ExtremumKind, Series};
use crate::error::AppError;
use crate::fit::detect_extrema_with_window;

pub mod pipeline;

/// Entry point for the `lcf` binary.
pub fn run() -> Result<(), AppError> {
    // A missing `.env` is fine; market constants then come from flags or defaults.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = crate::cli::Cli::parse();
    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Demo(args) => handle_demo(args),
        Command::Extrema(args) => handle_extrema(args),
        Command::Show(args) => handle_show(args),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // Ignore the error if a subscriber is already installed (e.g. in tests).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let ingested = crate::io::load_series(&args.csv)?;
    for e in &ingested.row_errors {
        eprintln!("skipped line {}: {}", e.line, e.message);
    }
    fit_and_report(ingested.series, &args.options)
}

fn handle_demo(args: DemoArgs) -> Result<(), AppError> {
    let spec = SampleSpec {
        periods: args.periods,
        seed: args.seed,
        noise: args.noise,
        market: args.options.to_config().market,
        ..SampleSpec::default()
    };
    let sample = generate_sample(&spec)?;
    let truth = sample.truth.render_equation(sample.truth.parameters())?;
    println!("True model: y = {truth}\n");
    fit_and_report(sample.series, &args.options)
}

fn fit_and_report(series: Series, options: &FitOptions) -> Result<(), AppError> {
    let run = pipeline::run_fit(series, options.to_config())?;
    let out = &run.output;

    println!(
        "{}",
        crate::report::format_run_summary(&run.series, &run.config, &out.history, &out.fit, &out.equation)
    );
    if options.parameters {
        println!("{}", crate::report::format_parameters(&out.model, &out.fit.parameters));
    }
    if options.residuals {
        println!("{}", crate::report::format_residuals(&run.residuals));
    }

    // Optional exports.
    if let Some(path) = &options.export_json {
        crate::io::write_model_json(path, &run.to_export())?;
    }
    if let Some(path) = &options.export_csv {
        crate::io::write_residuals_csv(path, &run.residuals)?;
    }

    Ok(())
}

fn handle_extrema(args: ExtremaArgs) -> Result<(), AppError> {
    if args.window == 0 {
        return Err(AppError::new(2, "extrema window must be >= 1"));
    }
    let ingested = crate::io::load_series(&args.csv)?;
    let kind = if args.valleys {
        ExtremumKind::Valley
    } else {
        ExtremumKind::Peak
    };
    let extrema = detect_extrema_with_window(&ingested.series.values(), kind, args.window);
    print!("{}", crate::report::format_extrema(&extrema, &ingested.series));
    Ok(())
}

fn handle_show(args: ShowArgs) -> Result<(), AppError> {
    let export = crate::io::read_model_json(&args.model)?;
    println!("Generated: {}", export.generated_at);
    println!("R2: {:.6}", export.equation.r_squared);
    println!("y = {}\n", export.equation.equation);
    print!("{}", crate::report::format_parameters(&export.model, &export.fit.parameters));
    Ok(())
}
