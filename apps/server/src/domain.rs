//! In-memory forum domain backing the standalone server.
//!
//! Production deployments implement [`MetricsComputerTrait`] over the
//! real query layer; this implementation keeps just enough state,
//! folded from the domain event stream, to score entities and build
//! rollups for a self-contained process.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Timelike;
use serde_json::json;
use threadpulse_core::errors::Result;
use threadpulse_core::events::{ChangeRecord, DomainEvent, EntityKind};
use threadpulse_core::metrics::{
    AggregatedView, EntityRef, MetricsComputerTrait, MetricsSnapshot, RankedEntity, TopicKind,
};

#[derive(Default, Clone)]
struct ThreadState {
    tag_ids: Vec<String>,
    message_count: u64,
    reaction_count: u64,
    participants: HashSet<String>,
    hour_histogram: [u64; 24],
}

impl ThreadState {
    fn engagement(&self) -> f64 {
        self.message_count as f64 + 2.0 * self.reaction_count as f64 + self.participants.len() as f64
    }
}

#[derive(Default, Clone)]
struct UserState {
    message_count: u64,
    reaction_count: u64,
}

impl UserState {
    fn contribution(&self) -> f64 {
        self.message_count as f64 + 0.5 * self.reaction_count as f64
    }
}

#[derive(Clone)]
struct MessageState {
    thread_id: Option<String>,
    user_id: Option<String>,
    hour: Option<usize>,
}

/// Mutable forum state, folded from domain events.
#[derive(Default)]
pub struct InMemoryForum {
    threads: RwLock<HashMap<String, ThreadState>>,
    users: RwLock<HashMap<String, UserState>>,
    tags: RwLock<HashMap<String, HashSet<String>>>,
    messages: RwLock<HashMap<String, MessageState>>,
    reactions: RwLock<HashMap<String, MessageState>>,
}

impl InMemoryForum {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one committed mutation into the domain state. Called by
    /// the event worker before analytics recomputation so the
    /// computer sees post-write state.
    pub fn apply(&self, event: &DomainEvent) {
        let record = event.record().clone();
        match event {
            DomainEvent::Created { kind, .. } => self.apply_created(*kind, record),
            DomainEvent::Updated { kind, .. } => self.apply_updated(*kind, record),
            DomainEvent::Deleted { kind, .. } => self.apply_deleted(*kind, record),
        }
    }

    fn apply_created(&self, kind: EntityKind, record: ChangeRecord) {
        match kind {
            EntityKind::Thread => {
                let mut threads = self.threads.write().unwrap();
                let thread = threads.entry(record.id.clone()).or_default();
                thread.tag_ids = record.tag_ids.clone();
                drop(threads);
                let mut tags = self.tags.write().unwrap();
                for tag_id in &record.tag_ids {
                    tags.entry(tag_id.clone())
                        .or_default()
                        .insert(record.id.clone());
                }
            }
            EntityKind::Message => {
                let hour = record.created_at.map(|at| at.hour() as usize);
                if let Some(thread_id) = &record.thread_id {
                    let mut threads = self.threads.write().unwrap();
                    let thread = threads.entry(thread_id.clone()).or_default();
                    thread.message_count += 1;
                    if let Some(user_id) = &record.user_id {
                        thread.participants.insert(user_id.clone());
                    }
                    if let Some(hour) = hour {
                        thread.hour_histogram[hour % 24] += 1;
                    }
                }
                if let Some(user_id) = &record.user_id {
                    self.users
                        .write()
                        .unwrap()
                        .entry(user_id.clone())
                        .or_default()
                        .message_count += 1;
                }
                self.messages.write().unwrap().insert(
                    record.id,
                    MessageState {
                        thread_id: record.thread_id,
                        user_id: record.user_id,
                        hour,
                    },
                );
            }
            EntityKind::User => {
                self.users
                    .write()
                    .unwrap()
                    .entry(record.id)
                    .or_default();
            }
            EntityKind::Reaction => {
                if let Some(thread_id) = &record.thread_id {
                    self.threads
                        .write()
                        .unwrap()
                        .entry(thread_id.clone())
                        .or_default()
                        .reaction_count += 1;
                }
                if let Some(user_id) = &record.user_id {
                    self.users
                        .write()
                        .unwrap()
                        .entry(user_id.clone())
                        .or_default()
                        .reaction_count += 1;
                }
                self.reactions.write().unwrap().insert(
                    record.id,
                    MessageState {
                        thread_id: record.thread_id,
                        user_id: record.user_id,
                        hour: None,
                    },
                );
            }
            EntityKind::Tag => {
                self.tags.write().unwrap().entry(record.id).or_default();
            }
        }
    }

    fn apply_updated(&self, kind: EntityKind, record: ChangeRecord) {
        // Updates carry no counters of their own; only re-tagging a
        // thread changes folded state.
        if kind == EntityKind::Thread {
            if let Some(thread) = self.threads.write().unwrap().get_mut(&record.id) {
                thread.tag_ids = record.tag_ids.clone();
            }
            let mut tags = self.tags.write().unwrap();
            for threads in tags.values_mut() {
                threads.remove(&record.id);
            }
            for tag_id in &record.tag_ids {
                tags.entry(tag_id.clone())
                    .or_default()
                    .insert(record.id.clone());
            }
        }
    }

    fn apply_deleted(&self, kind: EntityKind, record: ChangeRecord) {
        match kind {
            EntityKind::Thread => {
                self.threads.write().unwrap().remove(&record.id);
                for threads in self.tags.write().unwrap().values_mut() {
                    threads.remove(&record.id);
                }
            }
            EntityKind::Message => {
                if let Some(message) = self.messages.write().unwrap().remove(&record.id) {
                    if let Some(thread_id) = &message.thread_id {
                        if let Some(thread) = self.threads.write().unwrap().get_mut(thread_id) {
                            thread.message_count = thread.message_count.saturating_sub(1);
                            if let Some(hour) = message.hour {
                                let bucket = &mut thread.hour_histogram[hour % 24];
                                *bucket = bucket.saturating_sub(1);
                            }
                        }
                    }
                    if let Some(user_id) = &message.user_id {
                        if let Some(user) = self.users.write().unwrap().get_mut(user_id) {
                            user.message_count = user.message_count.saturating_sub(1);
                        }
                    }
                }
            }
            EntityKind::User => {
                self.users.write().unwrap().remove(&record.id);
            }
            EntityKind::Reaction => {
                if let Some(reaction) = self.reactions.write().unwrap().remove(&record.id) {
                    if let Some(thread_id) = &reaction.thread_id {
                        if let Some(thread) = self.threads.write().unwrap().get_mut(thread_id) {
                            thread.reaction_count = thread.reaction_count.saturating_sub(1);
                        }
                    }
                    if let Some(user_id) = &reaction.user_id {
                        if let Some(user) = self.users.write().unwrap().get_mut(user_id) {
                            user.reaction_count = user.reaction_count.saturating_sub(1);
                        }
                    }
                }
            }
            EntityKind::Tag => {
                self.tags.write().unwrap().remove(&record.id);
            }
        }
    }
}

#[async_trait]
impl MetricsComputerTrait for InMemoryForum {
    async fn compute(&self, entity: &EntityRef) -> Result<Option<MetricsSnapshot>> {
        let data = match entity.kind {
            TopicKind::Thread => {
                let threads = self.threads.read().unwrap();
                let Some(thread) = threads.get(&entity.id) else {
                    return Ok(None);
                };
                json!({
                    "message_count": thread.message_count,
                    "reaction_count": thread.reaction_count,
                    "participant_count": thread.participants.len(),
                    "engagement_score": thread.engagement(),
                    "peak_hours": thread.hour_histogram.to_vec(),
                    "tags": thread.tag_ids,
                })
            }
            TopicKind::User => {
                let users = self.users.read().unwrap();
                let Some(user) = users.get(&entity.id) else {
                    return Ok(None);
                };
                json!({
                    "message_count": user.message_count,
                    "reaction_count": user.reaction_count,
                    "contribution_score": user.contribution(),
                })
            }
            TopicKind::Tag => {
                let tags = self.tags.read().unwrap();
                let Some(thread_ids) = tags.get(&entity.id) else {
                    return Ok(None);
                };
                let threads = self.threads.read().unwrap();
                let engagement: f64 = thread_ids
                    .iter()
                    .filter_map(|id| threads.get(id))
                    .map(ThreadState::engagement)
                    .sum();
                json!({
                    "thread_count": thread_ids.len(),
                    "total_engagement": engagement,
                })
            }
        };

        Ok(Some(MetricsSnapshot::new(entity.clone(), data)))
    }

    async fn compute_rollup(&self, entity_cap: usize) -> Result<AggregatedView> {
        let threads = self.threads.read().unwrap();
        let mut top_threads: Vec<RankedEntity> = threads
            .iter()
            .take(entity_cap)
            .map(|(id, thread)| RankedEntity {
                id: id.clone(),
                score: thread.engagement(),
            })
            .collect();
        top_threads.sort_by(|a, b| b.score.total_cmp(&a.score));
        top_threads.truncate(10);

        let mut activity_by_hour = vec![0u64; 24];
        for thread in threads.values().take(entity_cap) {
            for (hour, count) in thread.hour_histogram.iter().enumerate() {
                activity_by_hour[hour] += count;
            }
        }
        drop(threads);

        let users = self.users.read().unwrap();
        let mut leaderboard: Vec<RankedEntity> = users
            .iter()
            .take(entity_cap)
            .map(|(id, user)| RankedEntity {
                id: id.clone(),
                score: user.contribution(),
            })
            .collect();
        leaderboard.sort_by(|a, b| b.score.total_cmp(&a.score));
        leaderboard.truncate(10);

        let mut view = AggregatedView::empty();
        view.top_threads = top_threads;
        view.activity_by_hour = activity_by_hour;
        view.leaderboard = leaderboard;
        Ok(view)
    }

    async fn known_entities(&self, kind: TopicKind, limit: usize) -> Result<Vec<String>> {
        let ids: Vec<String> = match kind {
            TopicKind::Thread => self.threads.read().unwrap().keys().cloned().collect(),
            TopicKind::User => self.users.read().unwrap().keys().cloned().collect(),
            TopicKind::Tag => self.tags.read().unwrap().keys().cloned().collect(),
        };
        Ok(ids.into_iter().take(limit).collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn message(id: &str, thread: &str, user: &str, hour: u32) -> DomainEvent {
        DomainEvent::created(
            EntityKind::Message,
            ChangeRecord {
                id: id.to_string(),
                thread_id: Some(thread.to_string()),
                user_id: Some(user.to_string()),
                tag_ids: Vec::new(),
                created_at: Utc.with_ymd_and_hms(2026, 8, 1, hour, 0, 0).single(),
            },
        )
    }

    #[tokio::test]
    async fn test_thread_metrics_fold_from_events() {
        let forum = InMemoryForum::new();
        forum.apply(&DomainEvent::created(
            EntityKind::Thread,
            ChangeRecord::new("t1").with_tags(vec!["rust".to_string()]),
        ));
        forum.apply(&message("m1", "t1", "u1", 9));
        forum.apply(&message("m2", "t1", "u2", 9));
        forum.apply(&DomainEvent::created(
            EntityKind::Reaction,
            ChangeRecord::new("r1").with_thread("t1").with_user("u1"),
        ));

        let snapshot = forum
            .compute(&EntityRef::thread("t1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.data["message_count"], 2);
        assert_eq!(snapshot.data["reaction_count"], 1);
        assert_eq!(snapshot.data["participant_count"], 2);
        assert_eq!(snapshot.data["peak_hours"][9], 2);
    }

    #[tokio::test]
    async fn test_deleted_message_decrements() {
        let forum = InMemoryForum::new();
        forum.apply(&message("m1", "t1", "u1", 12));
        forum.apply(&DomainEvent::deleted(
            EntityKind::Message,
            ChangeRecord::new("m1"),
        ));

        let snapshot = forum
            .compute(&EntityRef::thread("t1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.data["message_count"], 0);
        assert_eq!(snapshot.data["peak_hours"][12], 0);
    }

    #[tokio::test]
    async fn test_unknown_entity_is_none() {
        let forum = InMemoryForum::new();
        assert!(forum.compute(&EntityRef::user("ghost")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rollup_ranks_threads_and_users() {
        let forum = InMemoryForum::new();
        forum.apply(&message("m1", "t1", "u1", 8));
        forum.apply(&message("m2", "t2", "u2", 8));
        forum.apply(&message("m3", "t2", "u2", 20));

        let view = forum.compute_rollup(1000).await.unwrap();
        assert_eq!(view.top_threads[0].id, "t2");
        assert_eq!(view.leaderboard[0].id, "u2");
        assert_eq!(view.activity_by_hour[8], 2);
        assert_eq!(view.activity_by_hour[20], 1);
    }
}
