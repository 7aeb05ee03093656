//! Aggregation job implementation.
//!
//! Recomputes the corpus-wide rollup (top threads, hourly activity
//! histogram, user leaderboard) on a fixed interval, independent of
//! the per-entity batch queue. The two are separate refresh paths
//! over the same cache.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, warn};
use tokio::task::JoinHandle;
use tokio::time::interval;

use crate::cache::AnalyticsCache;
use crate::metrics::MetricsComputerTrait;

/// Fixed cache key the rollup is written under (in the `aggregation:`
/// namespace).
pub const AGGREGATED_VIEW_KEY: &str = "aggregation:view";

/// Owns the spawned ticker task for the rollup.
///
/// The cycle never stops on failure: a failed tick is logged and the
/// next tick fires at the natural interval. The task is aborted
/// explicitly on [`AggregationJob::stop`].
pub struct AggregationJob {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl AggregationJob {
    /// Spawns the ticker. The first tick fires immediately so a fresh
    /// process serves a rollup without waiting a full interval.
    pub fn start(
        cache: AnalyticsCache,
        computer: Arc<dyn MetricsComputerTrait>,
        period: Duration,
        entity_cap: usize,
        cache_ttl: Duration,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                tick(&cache, computer.as_ref(), entity_cap, cache_ttl).await;
            }
        });

        Self {
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Stops the ticker. Idempotent.
    pub fn stop(&self) {
        if let Some(handle) = self.handle.lock().unwrap().take() {
            handle.abort();
        }
    }
}

impl Drop for AggregationJob {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Runs one rollup cycle. Failures are logged, never propagated, so
/// the periodic cadence is never abandoned.
async fn tick(
    cache: &AnalyticsCache,
    computer: &dyn MetricsComputerTrait,
    entity_cap: usize,
    cache_ttl: Duration,
) {
    match computer.compute_rollup(entity_cap).await {
        Ok(view) => match serde_json::to_value(&view) {
            Ok(value) => {
                cache.set(AGGREGATED_VIEW_KEY, value, cache_ttl).await;
                debug!(
                    "Aggregated view refreshed ({} top threads, {} leaderboard entries)",
                    view.top_threads.len(),
                    view.leaderboard.len()
                );
            }
            Err(err) => warn!("Failed to serialize aggregated view: {}", err),
        },
        Err(err) => {
            warn!("Aggregation tick failed, retrying next interval: {}", err);
        }
    }
}
