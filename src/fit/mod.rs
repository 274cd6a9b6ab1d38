//! Curve fitting orchestration.
//!
//! Responsibilities:
//!
//! - detect dominant extrema to seed bump placement
//! - penalty-aware minimization followed by least-squares refinement
//! - grow the composite one layer family at a time (`pipeline`)

pub mod constraints;
pub mod engine;
pub mod extrema;
pub(crate) mod minimizer;
pub mod pipeline;
pub(crate) mod refine;
pub mod seeds;

pub use constraints::{CONSECUTIVE_MISS_SENTINEL, SoftConstraints};
pub use engine::{ConstrainedFitEngine, FreeParameters};
pub use extrema::{DEFAULT_WINDOW, detect_extrema, detect_extrema_with_window};
pub use pipeline::{LayeredFittingPipeline, PipelineOutput, PipelineStage, StageReport};
