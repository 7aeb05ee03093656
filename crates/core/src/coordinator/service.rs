//! Coordinator implementation.
//!
//! Owns the cache, batch queue, aggregation job and broadcaster, and
//! exposes the engine's public surface: cache-first metric reads,
//! mutation event handling, administrative invalidation and orderly
//! shutdown.
//!
//! Two refresh paths coexist deliberately: event handlers recompute
//! affected entities synchronously (immediate freshness for the read
//! path and live subscribers), while a periodic sweep re-enqueues
//! entities whose cached analytics went missing (eventual
//! self-healing, decoupled from individual mutations).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info, warn};
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::aggregation::{AggregationJob, AGGREGATED_VIEW_KEY};
use crate::batch::BatchQueue;
use crate::broadcast::{Broadcaster, OutboundMessage, SessionVerifier};
use crate::cache::{AnalyticsCache, CacheStore, ALL_PREFIXES, BATCH_PREFIX, COORDINATOR_PREFIX};
use crate::config::EngineConfig;
use crate::errors::Result;
use crate::events::{own_topic, refresh_targets, DomainEvent};
use crate::metrics::{EntityRef, MetricsComputerTrait, TopicKind};

/// The engine facade. One instance per process, constructed at
/// startup and shared by handle; there is no hidden global.
pub struct AnalyticsCoordinator {
    cache: AnalyticsCache,
    computer: Arc<dyn MetricsComputerTrait>,
    queue: BatchQueue,
    broadcaster: Broadcaster,
    aggregation: AggregationJob,
    sweep_task: Mutex<Option<JoinHandle<()>>>,
    config: EngineConfig,
}

impl AnalyticsCoordinator {
    /// Builds the coordinator and starts its background work
    /// (aggregation ticker, stale sweep, connection heartbeat). Must
    /// be called from within a tokio runtime.
    pub fn start(
        store: Arc<dyn CacheStore>,
        computer: Arc<dyn MetricsComputerTrait>,
        verifier: Arc<dyn SessionVerifier>,
        config: EngineConfig,
    ) -> Arc<Self> {
        let cache = AnalyticsCache::new(store);

        let queue = BatchQueue::new(
            cache.clone(),
            computer.clone(),
            config.batch_size,
            config.batch_interval,
            config.cache_ttl,
        );

        let broadcaster = Broadcaster::new(verifier);
        broadcaster.start_heartbeat(config.heartbeat_interval);

        let aggregation = AggregationJob::start(
            cache.clone(),
            computer.clone(),
            config.aggregation_interval,
            config.rollup_entity_cap,
            config.cache_ttl,
        );

        let sweep_task = tokio::spawn(sweep_loop(
            cache.clone(),
            computer.clone(),
            queue.clone(),
            config.sweep_interval,
            config.rollup_entity_cap,
        ));

        info!("Analytics coordinator started");
        Arc::new(Self {
            cache,
            computer,
            queue,
            broadcaster,
            aggregation,
            sweep_task: Mutex::new(Some(sweep_task)),
            config,
        })
    }

    /// The broadcaster handle, for the connection transport.
    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// The batch queue handle. Exposed for diagnostics and tests.
    pub fn queue(&self) -> &BatchQueue {
        &self.queue
    }

    /// Cache-first read of one entity's metrics.
    ///
    /// On a miss the snapshot is computed and cached before returning,
    /// so a cold cache never surfaces as "not found" for an entity
    /// that exists. Returns `Ok(None)` only when the domain no longer
    /// knows the entity.
    pub async fn get_metrics(&self, entity: &EntityRef) -> Result<Option<Value>> {
        let key = coordinator_key(entity);
        if let Some(hit) = self.cache.get(&key).await {
            return Ok(Some(hit));
        }
        self.refresh_entity(entity).await
    }

    /// Cache-first read of the corpus-wide rollup, recomputing on a
    /// miss (read-through, same discipline as per-entity metrics).
    pub async fn get_aggregated_view(&self) -> Result<Value> {
        let computer = self.computer.clone();
        let entity_cap = self.config.rollup_entity_cap;
        self.cache
            .get_or_set(AGGREGATED_VIEW_KEY, self.config.cache_ttl, move || async move {
                let view = computer.compute_rollup(entity_cap).await?;
                Ok(serde_json::to_value(&view)?)
            })
            .await
    }

    /// Handles one domain mutation event.
    ///
    /// Create/update: every affected target is recomputed
    /// synchronously (warm read path), written through the cache and
    /// broadcast; it is also enqueued for the batch path. Delete: the
    /// deleted entity's own cache entries are evicted eagerly and a
    /// deletion notice is broadcast; collateral targets (e.g. the
    /// thread of a deleted message) are refreshed like an update.
    ///
    /// Never fails the caller: per-target errors are logged and the
    /// remaining targets still run.
    pub async fn handle_event(&self, event: DomainEvent) {
        let kind = event.kind();
        let record = event.record().clone();
        let deleted_topic = if event.is_deletion() {
            own_topic(kind, &record)
        } else {
            None
        };

        if let Some(topic) = &deleted_topic {
            self.evict(topic).await;
            let reached = self
                .broadcaster
                .broadcast(topic, OutboundMessage::deletion(topic));
            debug!("Deletion of {} broadcast to {} subscriber(s)", topic, reached);
        }

        for target in refresh_targets(kind, &record) {
            if deleted_topic.as_ref() == Some(&target) {
                continue;
            }

            // Eventual path: coalesced into the next batch drain.
            self.queue.enqueue(target.clone());

            // Immediate path: recompute now so reads and subscribers
            // see fresh data without waiting for the drain.
            match self.refresh_entity(&target).await {
                Ok(Some(value)) => {
                    self.broadcaster
                        .broadcast(&target, OutboundMessage::analytics(&target, value));
                }
                Ok(None) => {
                    debug!("Target {} vanished during refresh", target);
                }
                Err(err) => {
                    warn!(
                        "Refresh failed for {} after {} mutation: {}",
                        target,
                        kind.as_str(),
                        err
                    );
                }
            }
        }
    }

    /// Clears one cache namespace, or every engine namespace when
    /// `prefix` is `None`. Administrative surface.
    pub async fn clear_cache(&self, prefix: Option<&str>) {
        match prefix {
            Some(prefix) => self.cache.clear(prefix).await,
            None => {
                for prefix in ALL_PREFIXES {
                    self.cache.clear(prefix).await;
                }
            }
        }
    }

    /// Orderly shutdown: stops the aggregation ticker, the sweep, the
    /// scheduled drain and the heartbeat, closes all live connections
    /// and clears the cache.
    pub async fn cleanup(&self) {
        info!("Analytics coordinator shutting down");
        if let Some(handle) = self.sweep_task.lock().unwrap().take() {
            handle.abort();
        }
        self.aggregation.stop();
        self.queue.shutdown();
        self.broadcaster.shutdown();
        self.clear_cache(None).await;
    }

    /// Computes and caches one entity's snapshot. `Ok(None)` evicts
    /// any stale entry for an entity the domain no longer has.
    async fn refresh_entity(&self, entity: &EntityRef) -> Result<Option<Value>> {
        let key = coordinator_key(entity);
        match self.computer.compute(entity).await? {
            Some(snapshot) => {
                let value = serde_json::to_value(&snapshot)?;
                self.cache
                    .set(&key, value.clone(), self.config.cache_ttl)
                    .await;
                Ok(Some(value))
            }
            None => {
                self.cache.delete(&key).await;
                Ok(None)
            }
        }
    }

    async fn evict(&self, entity: &EntityRef) {
        let logical = entity.cache_key();
        self.cache
            .delete(&format!("{}{}", COORDINATOR_PREFIX, logical))
            .await;
        self.cache
            .delete(&format!("{}{}", BATCH_PREFIX, logical))
            .await;
    }
}

fn coordinator_key(entity: &EntityRef) -> String {
    format!("{}{}", COORDINATOR_PREFIX, entity.cache_key())
}

fn batch_key(entity: &EntityRef) -> String {
    format!("{}{}", BATCH_PREFIX, entity.cache_key())
}

/// Self-healing pass: re-enqueues entities whose cached analytics are
/// missing (expired or never computed). An entity is healthy when
/// either refresh path holds a live snapshot for it - the read path's
/// `coordinator:` key or the drain's `batch:` key - so a swept entity
/// settles after one drain instead of being re-enqueued every tick.
/// Failures skip to the next kind; the loop itself runs for the life
/// of the coordinator.
async fn sweep_loop(
    cache: AnalyticsCache,
    computer: Arc<dyn MetricsComputerTrait>,
    queue: BatchQueue,
    period: Duration,
    entity_cap: usize,
) {
    let mut ticker = tokio::time::interval(period);
    // The startup burst of mutations makes an immediate sweep
    // redundant; wait out the first period.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let mut enqueued = 0usize;
        for kind in TopicKind::all() {
            let ids = match computer.known_entities(kind, entity_cap).await {
                Ok(ids) => ids,
                Err(err) => {
                    warn!("Stale sweep could not list {} entities: {}", kind, err);
                    continue;
                }
            };
            for id in ids {
                let entity = EntityRef::new(kind, id);
                if !cache.exists(&coordinator_key(&entity)).await
                    && !cache.exists(&batch_key(&entity)).await
                {
                    queue.enqueue(entity);
                    enqueued += 1;
                }
            }
        }
        if enqueued > 0 {
            debug!("Stale sweep enqueued {} entity(ies)", enqueued);
        }
    }
}
