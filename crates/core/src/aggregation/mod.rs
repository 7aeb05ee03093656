//! Periodic corpus-wide rollup job.

mod job;

pub use job::{AggregationJob, AGGREGATED_VIEW_KEY};
