//! Domain event types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kinds of raw entity the mutation pipeline reports on.
///
/// Messages and reactions do not carry analytics of their own; their
/// mutations roll up into the thread and user they belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Thread,
    Message,
    User,
    Reaction,
    Tag,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Thread => "thread",
            EntityKind::Message => "message",
            EntityKind::User => "user",
            EntityKind::Reaction => "reaction",
            EntityKind::Tag => "tag",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier projection of a mutated record.
///
/// Only the ids the engine needs to locate affected analytics targets
/// are carried; the full row stays in the domain layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub id: String,

    /// Parent thread, set for message and reaction mutations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,

    /// Acting user, set for message and reaction mutations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Tags attached to the record, set for thread mutations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tag_ids: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ChangeRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_tags(mut self, tag_ids: Vec<String>) -> Self {
        self.tag_ids = tag_ids;
        self
    }
}

/// Domain events emitted by the mutation pipeline after successful
/// writes.
///
/// A closed union so that handlers match exhaustively; duck-typed
/// payloads are deliberately not supported.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    Created {
        kind: EntityKind,
        record: ChangeRecord,
    },
    Updated {
        kind: EntityKind,
        record: ChangeRecord,
    },
    Deleted {
        kind: EntityKind,
        record: ChangeRecord,
    },
}

impl DomainEvent {
    pub fn created(kind: EntityKind, record: ChangeRecord) -> Self {
        Self::Created { kind, record }
    }

    pub fn updated(kind: EntityKind, record: ChangeRecord) -> Self {
        Self::Updated { kind, record }
    }

    pub fn deleted(kind: EntityKind, record: ChangeRecord) -> Self {
        Self::Deleted { kind, record }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Created { kind, .. } | Self::Updated { kind, .. } | Self::Deleted { kind, .. } => {
                *kind
            }
        }
    }

    pub fn record(&self) -> &ChangeRecord {
        match self {
            Self::Created { record, .. }
            | Self::Updated { record, .. }
            | Self::Deleted { record, .. } => record,
        }
    }

    pub fn is_deletion(&self) -> bool {
        matches!(self, Self::Deleted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_event_serialization() {
        let event = DomainEvent::created(
            EntityKind::Message,
            ChangeRecord::new("m1").with_thread("t1").with_user("u1"),
        );

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("created"));
        assert!(json.contains("message"));

        let deserialized: DomainEvent = serde_json::from_str(&json).unwrap();
        match deserialized {
            DomainEvent::Created { kind, record } => {
                assert_eq!(kind, EntityKind::Message);
                assert_eq!(record.id, "m1");
                assert_eq!(record.thread_id.as_deref(), Some("t1"));
                assert_eq!(record.user_id.as_deref(), Some("u1"));
            }
            _ => panic!("Expected Created"),
        }
    }

    #[test]
    fn test_deleted_event_accessors() {
        let event = DomainEvent::deleted(EntityKind::Thread, ChangeRecord::new("t9"));
        assert!(event.is_deletion());
        assert_eq!(event.kind(), EntityKind::Thread);
        assert_eq!(event.record().id, "t9");
    }
}
