//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tuning parameters for the analytics engine.
///
/// All values have documented defaults; the runtime may override them
/// from its own configuration surface (environment variables for the
/// web server).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// TTL applied to cached metrics snapshots. Default 1800s.
    pub cache_ttl: Duration,

    /// Maximum number of entities recomputed per batch drain. Default 100.
    pub batch_size: usize,

    /// Delay between consecutive batch drains while work remains.
    /// Default 5 minutes.
    pub batch_interval: Duration,

    /// Period of the corpus-wide aggregation job. Default 15 minutes.
    pub aggregation_interval: Duration,

    /// Period of the live-connection heartbeat. Default 30s.
    pub heartbeat_interval: Duration,

    /// Period of the self-healing sweep that re-enqueues entities with
    /// missing cached analytics. Default 10 minutes.
    pub sweep_interval: Duration,

    /// Cap on the number of entities considered by the aggregation
    /// rollup and the stale sweep. Default 1000.
    pub rollup_entity_cap: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(1800),
            batch_size: 100,
            batch_interval: Duration::from_secs(300),
            aggregation_interval: Duration::from_secs(900),
            heartbeat_interval: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(600),
            rollup_entity_cap: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.cache_ttl, Duration::from_secs(1800));
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.batch_interval, Duration::from_secs(300));
        assert_eq!(config.aggregation_interval, Duration::from_secs(900));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
    }
}
