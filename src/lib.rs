//! `layered-curves` library crate.
//!
//! Fits a series with an additive composite of parametric curve families,
//! grown one layer at a time under soft accuracy constraints.
//!
//! The binary (`lcf`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - modules are reusable from other tools and notebooks

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;

pub use domain::{FitConfig, FitResult, FittedEquation, Series};
pub use error::{CurveError, Result};
pub use fit::{LayeredFittingPipeline, PipelineOutput, PipelineStage};
