//! Batch queue implementation.
//!
//! Mutation handlers enqueue entity refs here instead of recomputing
//! inline when only eventual freshness is needed. The pending set
//! coalesces duplicate enqueues; a single-flight drain task works the
//! set down in bounded batches, writing snapshots through the cache
//! under the `batch:` namespace.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, warn};
use tokio::task::JoinHandle;

use crate::cache::{AnalyticsCache, BATCH_PREFIX};
use crate::metrics::{EntityRef, MetricsComputerTrait};

/// Deduplicated set of entities awaiting recompute, with a
/// single-flight drain loop.
///
/// `enqueue` is synchronous and non-blocking: it only touches the
/// pending set and, when no drain is in flight, spawns one. Enqueueing
/// an id N times before the next drain results in exactly one
/// computation. An id enqueued while its own computation is mid-flight
/// is not merged - it is simply picked up again by the next drain
/// (at-least-once, never lost).
#[derive(Clone)]
pub struct BatchQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    pending: Mutex<HashSet<EntityRef>>,
    /// Single-flight guard: true while a drain task exists. Guards
    /// scheduling only, never held across computation.
    draining: AtomicBool,
    drain_task: Mutex<Option<JoinHandle<()>>>,
    shutdown: AtomicBool,
    batch_size: usize,
    processing_interval: Duration,
    cache_ttl: Duration,
    cache: AnalyticsCache,
    computer: Arc<dyn MetricsComputerTrait>,
}

impl BatchQueue {
    pub fn new(
        cache: AnalyticsCache,
        computer: Arc<dyn MetricsComputerTrait>,
        batch_size: usize,
        processing_interval: Duration,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                pending: Mutex::new(HashSet::new()),
                draining: AtomicBool::new(false),
                drain_task: Mutex::new(None),
                shutdown: AtomicBool::new(false),
                batch_size: batch_size.max(1),
                processing_interval,
                cache_ttl,
                cache,
                computer,
            }),
        }
    }

    /// Adds an entity to the pending set and schedules a drain unless
    /// one is already in flight.
    pub fn enqueue(&self, entity: EntityRef) {
        if self.inner.shutdown.load(Ordering::SeqCst) {
            debug!("Batch queue shut down, dropping enqueue for {}", entity);
            return;
        }

        self.inner.pending.lock().unwrap().insert(entity);

        if !self.inner.draining.swap(true, Ordering::SeqCst) {
            let inner = self.inner.clone();
            let handle = tokio::spawn(drain_loop(inner));
            *self.inner.drain_task.lock().unwrap() = Some(handle);
        }
    }

    /// Number of entities currently awaiting recompute.
    pub fn pending_len(&self) -> usize {
        self.inner.pending.lock().unwrap().len()
    }

    /// Stops the scheduled drain and discards pending work. Pending
    /// entities are not durable by design; a future mutation or the
    /// stale sweep will re-enqueue them.
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.inner.drain_task.lock().unwrap().take() {
            handle.abort();
        }
        self.inner.pending.lock().unwrap().clear();
        self.inner.draining.store(false, Ordering::SeqCst);
    }
}

/// Works the pending set down until it is empty, then exits.
///
/// Per-entity failures are logged and dropped for this cycle; the loop
/// itself never dies from a compute error.
async fn drain_loop(inner: Arc<QueueInner>) {
    loop {
        let batch: Vec<EntityRef> = {
            let mut pending = inner.pending.lock().unwrap();
            let taken: Vec<EntityRef> = pending.iter().take(inner.batch_size).cloned().collect();
            // Removed before computing so enqueues arriving during the
            // computation start a fresh cycle instead of being merged.
            for entity in &taken {
                pending.remove(entity);
            }
            taken
        };

        if !batch.is_empty() {
            debug!("Draining batch of {} entity(ies)", batch.len());
        }

        for entity in &batch {
            match inner.computer.compute(entity).await {
                Ok(Some(snapshot)) => match serde_json::to_value(&snapshot) {
                    Ok(value) => {
                        let key = format!("{}{}", BATCH_PREFIX, entity.cache_key());
                        inner.cache.set(&key, value, inner.cache_ttl).await;
                    }
                    Err(err) => {
                        warn!("Failed to serialize snapshot for {}: {}", entity, err);
                    }
                },
                Ok(None) => {
                    debug!("Entity {} no longer exists, skipping", entity);
                }
                Err(err) => {
                    // Dropped for this cycle; a future mutation event
                    // or the stale sweep re-enqueues it.
                    warn!("Metrics computation failed for {}: {}", entity, err);
                }
            }
        }

        if inner.shutdown.load(Ordering::SeqCst) {
            return;
        }

        if !inner.pending.lock().unwrap().is_empty() {
            tokio::time::sleep(inner.processing_interval).await;
            continue;
        }

        inner.draining.store(false, Ordering::SeqCst);

        // An enqueue may have landed between the emptiness check and
        // clearing the flag; reclaim the flight if so.
        let raced = !inner.pending.lock().unwrap().is_empty();
        if raced && !inner.draining.swap(true, Ordering::SeqCst) {
            continue;
        }
        return;
    }
}
