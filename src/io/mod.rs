//! Input/output helpers.
//!
//! - CSV ingest + validation (`ingest`)
//! - result exports (JSON model, CSV residuals) (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
