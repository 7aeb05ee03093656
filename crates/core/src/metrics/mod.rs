//! Metrics model and computer collaborator.
//!
//! The engine does not know how scores are calculated. It owns the
//! snapshot and rollup *shapes* and delegates the actual computation
//! to a [`MetricsComputerTrait`] implementation supplied by the
//! surrounding domain.

mod model;
mod traits;

pub use model::*;
pub use traits::*;
