//! Curve primitives and their additive composition.
//!
//! Primitives are small, pure functions so that fitting code can stay
//! generic over the composite's flat parameter vector.

pub mod composite;
pub mod layer;
pub mod primitives;

pub use composite::*;
pub use layer::*;
