//! Deduplicating batch recompute queue.

mod queue;

pub use queue::BatchQueue;
