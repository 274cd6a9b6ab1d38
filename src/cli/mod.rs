//! Command-line parsing for the layered curve fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{FitConfig, LayerStage, MarketConstants, MinimizerAttempt};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "lcf", version, about = "Layered additive curve fitter for quarterly series")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit a `date,value` CSV series, print the stage history and final equation.
    Fit(FitArgs),
    /// Fit a synthetic quarterly series with a known composite behind it.
    Demo(DemoArgs),
    /// Print the dominant extrema of a CSV series.
    Extrema(ExtremaArgs),
    /// Print a previously exported model JSON.
    Show(ShowArgs),
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Input CSV with `date` and `value` columns.
    #[arg(long, value_name = "CSV")]
    pub csv: PathBuf,

    #[command(flatten)]
    pub options: FitOptions,
}

#[derive(Debug, Args, Clone)]
pub struct DemoArgs {
    /// Random seed for the synthetic series.
    #[arg(long, default_value_t = 7)]
    pub seed: u64,

    /// Number of quarterly periods to generate.
    #[arg(long, default_value_t = 40)]
    pub periods: usize,

    /// Standard deviation of the multiplicative log noise.
    #[arg(long, default_value_t = 0.02)]
    pub noise: f64,

    #[command(flatten)]
    pub options: FitOptions,
}

#[derive(Debug, Args, Clone)]
pub struct ExtremaArgs {
    #[arg(long, value_name = "CSV")]
    pub csv: PathBuf,

    /// Detect valleys instead of peaks.
    #[arg(long)]
    pub valleys: bool,

    /// Look-back / look-forward window (periods).
    #[arg(long, default_value_t = 8)]
    pub window: usize,
}

#[derive(Debug, Args, Clone)]
pub struct ShowArgs {
    /// Model JSON produced by `lcf fit --export-json`.
    #[arg(long, value_name = "JSON")]
    pub model: PathBuf,
}

/// Options shared by every command that fits.
#[derive(Debug, Args, Clone)]
pub struct FitOptions {
    /// Serviceable addressable market.
    #[arg(long, env = "LCF_SAM", default_value_t = 1000.0)]
    pub sam: f64,

    /// Herfindahl–Hirschman index of the market.
    #[arg(long, env = "LCF_HHI", default_value_t = 1500.0)]
    pub hhi: f64,

    /// Relative-error threshold of the accuracy constraints.
    #[arg(long, default_value_t = 0.15)]
    pub threshold: f64,

    /// Multiplier applied to constraint violations.
    #[arg(long, default_value_t = 1e6)]
    pub penalty_scale: f64,

    /// Extrema detector window (periods).
    #[arg(long, default_value_t = 8)]
    pub window: usize,

    /// How far a seeded bump may move from its extremum (periods).
    #[arg(long, default_value_t = 0.0)]
    pub slack: f64,

    /// Fitting stages to run, comma separated, in forward order (default: all).
    #[arg(long, value_enum, value_delimiter = ',')]
    pub stages: Vec<LayerStage>,

    /// Iteration cap of the least-squares refinement.
    #[arg(long, default_value_t = 200)]
    pub refine_iters: usize,

    /// Print the per-period observed/fitted/residual table.
    #[arg(long)]
    pub residuals: bool,

    /// Print every fitted parameter.
    #[arg(long)]
    pub parameters: bool,

    /// Export the fitted model to JSON.
    #[arg(long = "export-json")]
    pub export_json: Option<PathBuf>,

    /// Export per-period observed/predicted/residual values to CSV.
    #[arg(long = "export-csv")]
    pub export_csv: Option<PathBuf>,
}

impl FitOptions {
    pub fn to_config(&self) -> FitConfig {
        FitConfig {
            market: MarketConstants {
                sam: self.sam,
                hhi: self.hhi,
            },
            threshold: self.threshold,
            penalty_scale: self.penalty_scale,
            extrema_window: self.window,
            placement_slack: self.slack,
            stages: if self.stages.is_empty() {
                LayerStage::ALL.to_vec()
            } else {
                self.stages.clone()
            },
            attempts: MinimizerAttempt::defaults(),
            refine_max_iters: self.refine_iters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stage_list_and_market() {
        let cli = Cli::parse_from([
            "lcf", "fit", "--csv", "s.csv", "--sam", "2000", "--stages", "demand,seasonal",
        ]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        let config = args.options.to_config();
        assert_eq!(config.market.sam, 2000.0);
        assert_eq!(config.stages, vec![LayerStage::Demand, LayerStage::Seasonal]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_stage_list_means_all() {
        let cli = Cli::parse_from(["lcf", "demo", "--periods", "12"]);
        let Command::Demo(args) = cli.command else {
            panic!("expected demo");
        };
        assert_eq!(args.periods, 12);
        assert_eq!(args.options.to_config().stages, LayerStage::ALL.to_vec());
    }
}
