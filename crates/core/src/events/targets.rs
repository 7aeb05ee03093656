//! Mapping from mutations to affected analytics targets.
//!
//! A mutated record touches the analytics of more than its own kind:
//! a new message changes its thread's metrics and its author's, a
//! tagged thread changes each tag's rollup. These functions derive
//! that fan-out so event handlers stay exhaustive and table-driven.

use super::domain_event::{ChangeRecord, EntityKind};
use crate::metrics::EntityRef;

/// Analytics targets whose metrics must be recomputed after a
/// create/update of `kind`. Order is stable, entries are distinct.
pub fn refresh_targets(kind: EntityKind, record: &ChangeRecord) -> Vec<EntityRef> {
    let mut targets: Vec<EntityRef> = Vec::new();
    let mut push = |target: EntityRef| {
        if !targets.contains(&target) {
            targets.push(target);
        }
    };

    match kind {
        EntityKind::Thread => {
            push(EntityRef::thread(&record.id));
            for tag_id in &record.tag_ids {
                push(EntityRef::tag(tag_id));
            }
        }
        EntityKind::Message => {
            if let Some(thread_id) = &record.thread_id {
                push(EntityRef::thread(thread_id));
            }
            if let Some(user_id) = &record.user_id {
                push(EntityRef::user(user_id));
            }
            for tag_id in &record.tag_ids {
                push(EntityRef::tag(tag_id));
            }
        }
        EntityKind::User => {
            push(EntityRef::user(&record.id));
        }
        EntityKind::Reaction => {
            if let Some(thread_id) = &record.thread_id {
                push(EntityRef::thread(thread_id));
            }
            if let Some(user_id) = &record.user_id {
                push(EntityRef::user(user_id));
            }
        }
        EntityKind::Tag => {
            push(EntityRef::tag(&record.id));
        }
    }

    targets
}

/// The topic a deleted record itself corresponds to, if its kind is
/// subscribable. Deleting a message or reaction has no topic of its
/// own - its parents are refreshed instead via [`refresh_targets`].
pub fn own_topic(kind: EntityKind, record: &ChangeRecord) -> Option<EntityRef> {
    match kind {
        EntityKind::Thread => Some(EntityRef::thread(&record.id)),
        EntityKind::User => Some(EntityRef::user(&record.id)),
        EntityKind::Tag => Some(EntityRef::tag(&record.id)),
        EntityKind::Message | EntityKind::Reaction => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_touches_thread_and_author() {
        let record = ChangeRecord::new("m1").with_thread("t1").with_user("u1");
        let targets = refresh_targets(EntityKind::Message, &record);

        assert_eq!(
            targets,
            vec![EntityRef::thread("t1"), EntityRef::user("u1")]
        );
    }

    #[test]
    fn test_thread_includes_its_tags() {
        let record =
            ChangeRecord::new("t1").with_tags(vec!["rust".to_string(), "async".to_string()]);
        let targets = refresh_targets(EntityKind::Thread, &record);

        assert_eq!(
            targets,
            vec![
                EntityRef::thread("t1"),
                EntityRef::tag("rust"),
                EntityRef::tag("async"),
            ]
        );
    }

    #[test]
    fn test_duplicate_targets_are_coalesced() {
        // A user reacting to their own thread's message still yields
        // each target once.
        let record = ChangeRecord::new("r1").with_thread("t1").with_user("u1");
        let first = refresh_targets(EntityKind::Reaction, &record);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_own_topic_only_for_subscribable_kinds() {
        assert_eq!(
            own_topic(EntityKind::Thread, &ChangeRecord::new("t1")),
            Some(EntityRef::thread("t1"))
        );
        assert_eq!(
            own_topic(EntityKind::Tag, &ChangeRecord::new("rust")),
            Some(EntityRef::tag("rust"))
        );
        assert_eq!(own_topic(EntityKind::Message, &ChangeRecord::new("m1")), None);
        assert_eq!(own_topic(EntityKind::Reaction, &ChangeRecord::new("r1")), None);
    }

    #[test]
    fn test_reaction_without_parents_yields_nothing() {
        let targets = refresh_targets(EntityKind::Reaction, &ChangeRecord::new("r1"));
        assert!(targets.is_empty());
    }
}
