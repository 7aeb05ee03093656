//! Namespaced analytics cache.
//!
//! Two layers, mirroring the storage split used elsewhere in the
//! workspace:
//!
//! - [`CacheStore`] (`store.rs`) - the backend trait plus the default
//!   in-memory implementation.
//! - [`AnalyticsCache`] (`service.rs`) - the engine-facing layer that
//!   applies key namespacing and swallows backend failures so the
//!   engine stays correct (just slower) during a cache outage.

mod service;
mod store;

pub use service::AnalyticsCache;
pub use store::{CacheStore, MemoryCacheStore};

/// Key prefix for coordinator-owned per-entity snapshots.
pub const COORDINATOR_PREFIX: &str = "coordinator:";

/// Key prefix for batch-queue-owned per-entity snapshots.
pub const BATCH_PREFIX: &str = "batch:";

/// Key prefix for corpus-wide rollups.
pub const AGGREGATION_PREFIX: &str = "aggregation:";

/// All cache namespaces, in clear order.
pub const ALL_PREFIXES: [&str; 3] = [COORDINATOR_PREFIX, BATCH_PREFIX, AGGREGATION_PREFIX];
