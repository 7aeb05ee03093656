//! Server configuration from environment variables.

use std::time::Duration;

use threadpulse_core::EngineConfig;

/// Runtime configuration. Every knob has a default so a bare
/// `threadpulse-server` starts up for local development.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address, `TP_LISTEN_ADDR`. Default `0.0.0.0:8765`.
    pub listen_addr: String,

    /// HS256 secret for WebSocket auth tokens, `TP_WS_SECRET`.
    pub ws_secret: String,

    /// Engine tuning, overridable via `TP_*` variables.
    pub engine: EngineConfig,
}

impl Config {
    pub fn from_env() -> Self {
        let mut engine = EngineConfig::default();
        if let Some(secs) = env_u64("TP_CACHE_TTL_SECS") {
            engine.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(size) = env_u64("TP_BATCH_SIZE") {
            engine.batch_size = size as usize;
        }
        if let Some(secs) = env_u64("TP_BATCH_INTERVAL_SECS") {
            engine.batch_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("TP_AGGREGATION_INTERVAL_SECS") {
            engine.aggregation_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("TP_HEARTBEAT_INTERVAL_SECS") {
            engine.heartbeat_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("TP_SWEEP_INTERVAL_SECS") {
            engine.sweep_interval = Duration::from_secs(secs);
        }

        Self {
            listen_addr: std::env::var("TP_LISTEN_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8765".to_string()),
            ws_secret: std::env::var("TP_WS_SECRET")
                .unwrap_or_else(|_| "dev-secret-change-me".to_string()),
            engine,
        }
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
