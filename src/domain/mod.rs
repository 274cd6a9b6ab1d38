//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the input series (`Series`, `SeriesPoint`) and detected extrema
//! - parameter bounds and market constants
//! - run configuration (`FitConfig`, `LayerStage`, `MinimizerAttempt`)
//! - fit outputs (`FitResult`, `FittedEquation`)

pub mod types;

pub use types::*;
