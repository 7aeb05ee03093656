//! Domain mutation events.
//!
//! Provides the closed event union emitted by the domain layer after
//! each committed write, the sink trait the mutation pipeline calls,
//! and the mapping from a mutation to the analytics targets it
//! affects. Runtime adapters implement the sink to hand events to the
//! coordinator without blocking the write path.

mod domain_event;
mod sink;
mod targets;

pub use domain_event::*;
pub use sink::*;
pub use targets::*;
