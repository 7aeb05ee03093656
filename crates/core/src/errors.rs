//! Core error types for the analytics engine.
//!
//! Nothing in this subsystem is fatal to the process: failures are
//! isolated to the unit of work they belong to (one entity, one
//! connection, one tick) and logged by the component that observed
//! them. These types exist so that the isolation points can still
//! name what went wrong.

use thiserror::Error;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the analytics engine.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Cache operation failed: {0}")]
    Cache(#[from] CacheError),

    #[error("Metrics computation failed for {kind} {id}: {message}")]
    Compute {
        kind: String,
        id: String,
        message: String,
    },

    #[error("Rollup computation failed: {0}")]
    Rollup(String),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised by cache backends.
///
/// The [`crate::cache::AnalyticsCache`] layer swallows every variant
/// of this type, degrading reads to misses and writes to logged
/// no-ops, so callers above the cache never see them.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The backing store could not be reached.
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),
}

impl Error {
    /// Builds a compute error carrying the entity context needed to
    /// diagnose a dropped id without crashing the engine.
    pub fn compute(kind: impl Into<String>, id: impl Into<String>, message: impl ToString) -> Self {
        Error::Compute {
            kind: kind.into(),
            id: id.into(),
            message: message.to_string(),
        }
    }
}

impl From<Error> for String {
    fn from(err: Error) -> Self {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_error_carries_entity_context() {
        let err = Error::compute("thread", "t1", "query timed out");
        assert_eq!(
            err.to_string(),
            "Metrics computation failed for thread t1: query timed out"
        );
    }

    #[test]
    fn test_cache_error_converts_to_root_error() {
        let err: Error = CacheError::Unavailable("connection refused".to_string()).into();
        let message: String = err.into();
        assert!(message.contains("Cache operation failed"));
        assert!(message.contains("connection refused"));
    }
}
