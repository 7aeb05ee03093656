//! Metrics domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The kinds of entity that carry derived analytics and can be
/// subscribed to by live clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicKind {
    Thread,
    User,
    Tag,
}

impl TopicKind {
    /// Stable identifier used in cache keys and log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicKind::Thread => "thread",
            TopicKind::User => "user",
            TopicKind::Tag => "tag",
        }
    }

    /// All topic kinds, in sweep order.
    pub fn all() -> [TopicKind; 3] {
        [TopicKind::Thread, TopicKind::User, TopicKind::Tag]
    }
}

impl std::fmt::Display for TopicKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a single analytics-bearing entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: TopicKind,
    pub id: String,
}

impl EntityRef {
    pub fn new(kind: TopicKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn thread(id: impl Into<String>) -> Self {
        Self::new(TopicKind::Thread, id)
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self::new(TopicKind::User, id)
    }

    pub fn tag(id: impl Into<String>) -> Self {
        Self::new(TopicKind::Tag, id)
    }

    /// Logical cache key for this entity, namespaced by kind.
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.kind.as_str(), self.id)
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind.as_str(), self.id)
    }
}

/// Derived metrics for a single entity.
///
/// The `data` bag is produced wholesale by the domain's computer and
/// replaced, never mutated, on recompute. The engine caches and
/// broadcasts it without inspecting individual fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub entity: EntityRef,
    pub computed_at: DateTime<Utc>,
    pub data: Value,
}

impl MetricsSnapshot {
    pub fn new(entity: EntityRef, data: Value) -> Self {
        Self {
            entity,
            computed_at: Utc::now(),
            data,
        }
    }
}

/// One entry in a ranked rollup list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntity {
    pub id: String,
    pub score: f64,
}

/// Corpus-wide rollup, recomputed wholesale on every aggregation tick.
///
/// Independent of the per-entity snapshots: the aggregation job and
/// the batch queue are two separate refresh paths over the same cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedView {
    /// Top threads by engagement score, highest first.
    pub top_threads: Vec<RankedEntity>,

    /// Message volume per hour of day (24 buckets, hour 0 first).
    pub activity_by_hour: Vec<u64>,

    /// Per-user leaderboard by contribution score, highest first.
    pub leaderboard: Vec<RankedEntity>,

    pub computed_at: DateTime<Utc>,
}

impl AggregatedView {
    /// An empty rollup, used when the corpus has no entities yet.
    pub fn empty() -> Self {
        Self {
            top_threads: Vec::new(),
            activity_by_hour: vec![0; 24],
            leaderboard: Vec::new(),
            computed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_ref_cache_key() {
        assert_eq!(EntityRef::thread("t1").cache_key(), "thread:t1");
        assert_eq!(EntityRef::user("u9").cache_key(), "user:u9");
        assert_eq!(EntityRef::tag("rust").cache_key(), "tag:rust");
    }

    #[test]
    fn test_snapshot_serialization_round_trip() {
        let snapshot = MetricsSnapshot::new(
            EntityRef::thread("t1"),
            json!({ "message_count": 12, "engagement_score": 3.5 }),
        );

        let encoded = serde_json::to_string(&snapshot).unwrap();
        let decoded: MetricsSnapshot = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.entity, EntityRef::thread("t1"));
        assert_eq!(decoded.data["message_count"], 12);
    }

    #[test]
    fn test_empty_view_has_24_hour_buckets() {
        let view = AggregatedView::empty();
        assert_eq!(view.activity_by_hour.len(), 24);
        assert!(view.top_threads.is_empty());
    }
}
