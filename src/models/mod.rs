//! Physical fitting models (energy and superfluid-fraction forms).
//!
//! Models are implemented as small, pure functions on `ModelKind` so that fitting code
//! can stay generic.

pub mod model;

pub use model::*;
