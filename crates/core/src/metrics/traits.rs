//! Metrics computer collaborator trait.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use super::model::{AggregatedView, EntityRef, MetricsSnapshot, TopicKind};
use crate::errors::Result;

/// Computes derived metrics from raw domain state.
///
/// Implemented by the surrounding domain layer on top of its own query
/// stack; the engine treats the scoring formulas as opaque. The
/// computation may read from a database and is expected to tolerate
/// brief staleness - the engine only ever reads already-committed
/// state.
#[async_trait]
pub trait MetricsComputerTrait: Send + Sync {
    /// Computes a fresh snapshot for one entity.
    ///
    /// Returns `Ok(None)` when the entity no longer exists in the
    /// domain, which the engine treats as "nothing to cache" rather
    /// than an error.
    async fn compute(&self, entity: &EntityRef) -> Result<Option<MetricsSnapshot>>;

    /// Recomputes the corpus-wide rollup, bounded to the most recent
    /// `entity_cap` entities.
    async fn compute_rollup(&self, entity_cap: usize) -> Result<AggregatedView>;

    /// Lists known entity ids of one kind, most recent first, for the
    /// self-healing sweep.
    async fn known_entities(&self, kind: TopicKind, limit: usize) -> Result<Vec<String>>;
}

/// In-memory computer for tests - counts invocations per entity and
/// serves canned snapshots.
#[derive(Default)]
pub struct MockMetricsComputer {
    compute_calls: Mutex<HashMap<EntityRef, usize>>,
    rollup_calls: AtomicUsize,
    missing: Mutex<Vec<EntityRef>>,
    failing: Mutex<Vec<EntityRef>>,
    known: Mutex<HashMap<TopicKind, Vec<String>>>,
}

impl MockMetricsComputer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of times `compute` was called for `entity`.
    pub fn compute_count(&self, entity: &EntityRef) -> usize {
        self.compute_calls
            .lock()
            .unwrap()
            .get(entity)
            .copied()
            .unwrap_or(0)
    }

    /// Total `compute` calls across all entities.
    pub fn total_compute_count(&self) -> usize {
        self.compute_calls.lock().unwrap().values().sum()
    }

    pub fn rollup_count(&self) -> usize {
        self.rollup_calls.load(Ordering::SeqCst)
    }

    /// Marks an entity as absent from the domain.
    pub fn mark_missing(&self, entity: EntityRef) {
        self.missing.lock().unwrap().push(entity);
    }

    /// Makes `compute` fail for an entity.
    pub fn mark_failing(&self, entity: EntityRef) {
        self.failing.lock().unwrap().push(entity);
    }

    /// Seeds the id listing used by `known_entities`.
    pub fn seed_known(&self, kind: TopicKind, ids: Vec<String>) {
        self.known.lock().unwrap().insert(kind, ids);
    }
}

#[async_trait]
impl MetricsComputerTrait for MockMetricsComputer {
    async fn compute(&self, entity: &EntityRef) -> Result<Option<MetricsSnapshot>> {
        *self
            .compute_calls
            .lock()
            .unwrap()
            .entry(entity.clone())
            .or_insert(0) += 1;

        if self.failing.lock().unwrap().contains(entity) {
            return Err(crate::errors::Error::compute(
                entity.kind.as_str(),
                &entity.id,
                "mock failure",
            ));
        }
        if self.missing.lock().unwrap().contains(entity) {
            return Ok(None);
        }

        Ok(Some(MetricsSnapshot::new(
            entity.clone(),
            json!({ "id": entity.id, "engagement_score": 1.0 }),
        )))
    }

    async fn compute_rollup(&self, _entity_cap: usize) -> Result<AggregatedView> {
        self.rollup_calls.fetch_add(1, Ordering::SeqCst);
        Ok(AggregatedView::empty())
    }

    async fn known_entities(&self, kind: TopicKind, limit: usize) -> Result<Vec<String>> {
        let known = self.known.lock().unwrap();
        let ids = known.get(&kind).cloned().unwrap_or_default();
        Ok(ids.into_iter().take(limit).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_counts_compute_calls() {
        let computer = MockMetricsComputer::new();
        let entity = EntityRef::thread("t1");

        computer.compute(&entity).await.unwrap();
        computer.compute(&entity).await.unwrap();

        assert_eq!(computer.compute_count(&entity), 2);
        assert_eq!(computer.compute_count(&EntityRef::thread("t2")), 0);
    }

    #[tokio::test]
    async fn test_mock_missing_entity_returns_none() {
        let computer = MockMetricsComputer::new();
        let entity = EntityRef::user("ghost");
        computer.mark_missing(entity.clone());

        assert!(computer.compute(&entity).await.unwrap().is_none());
    }
}
