//! Threadpulse Core - real-time discussion analytics engine.
//!
//! This crate contains the analytics aggregation and distribution
//! subsystem: a namespaced cache, a deduplicating batch queue, a
//! periodic rollup job, a subscription-based broadcaster, and the
//! coordinator that ties them together. The relational domain layer
//! (threads, messages, users, reactions, tags) is abstracted behind
//! the [`metrics::MetricsComputerTrait`] collaborator and implemented
//! by the surrounding runtime.

pub mod aggregation;
pub mod batch;
pub mod broadcast;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod events;
pub mod metrics;

// Re-export commonly used types
pub use config::EngineConfig;
pub use coordinator::AnalyticsCoordinator;
pub use errors::{Error, Result};
pub use metrics::{AggregatedView, EntityRef, MetricsSnapshot, TopicKind};
