//! Mathematical utilities: least squares solves and fit statistics.

pub mod ols;
pub mod stats;

pub use ols::*;
pub use stats::*;
