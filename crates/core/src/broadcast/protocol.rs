//! Wire protocol envelopes.
//!
//! Everything on the wire is a `{type, data}` envelope. Inbound and
//! outbound directions are separate closed unions so that handlers
//! match exhaustively.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::metrics::{EntityRef, TopicKind};

/// Messages a peer may send to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum InboundMessage {
    Authenticate { token: String },
    Subscribe(TopicSelector),
    Unsubscribe(TopicSelector),
}

/// Topic ids named by a subscribe/unsubscribe request. Any subset of
/// the three fields may be present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicSelector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_id: Option<String>,
}

impl TopicSelector {
    pub fn thread(id: impl Into<String>) -> Self {
        Self {
            thread_id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self {
            user_id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn tag(id: impl Into<String>) -> Self {
        Self {
            tag_id: Some(id.into()),
            ..Default::default()
        }
    }

    /// The topics this selector names, in field order.
    pub fn topics(&self) -> Vec<EntityRef> {
        let mut topics = Vec::new();
        if let Some(id) = &self.thread_id {
            topics.push(EntityRef::thread(id));
        }
        if let Some(id) = &self.user_id {
            topics.push(EntityRef::user(id));
        }
        if let Some(id) = &self.tag_id {
            topics.push(EntityRef::tag(id));
        }
        topics
    }
}

/// Messages the server may send to a peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OutboundMessage {
    AuthRequired { message: String },
    AuthSuccess { message: String },
    Error { message: String },
    Ping { timestamp: i64 },
    ThreadAnalytics(AnalyticsPayload),
    UserAnalytics(AnalyticsPayload),
    TagAnalytics(AnalyticsPayload),
}

/// Payload of an analytics broadcast: either fresh metrics or a
/// deletion notice for the entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsPayload {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
}

impl OutboundMessage {
    pub fn auth_required() -> Self {
        Self::AuthRequired {
            message: "Authentication required. Send an authenticate message.".to_string(),
        }
    }

    pub fn auth_success() -> Self {
        Self::AuthSuccess {
            message: "Authenticated.".to_string(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn ping() -> Self {
        Self::Ping {
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Fresh analytics for a topic, routed to the variant matching its
    /// kind.
    pub fn analytics(topic: &EntityRef, analytics: Value) -> Self {
        let payload = AnalyticsPayload {
            id: topic.id.clone(),
            analytics: Some(analytics),
            deleted: None,
        };
        match topic.kind {
            TopicKind::Thread => Self::ThreadAnalytics(payload),
            TopicKind::User => Self::UserAnalytics(payload),
            TopicKind::Tag => Self::TagAnalytics(payload),
        }
    }

    /// Deletion notice for a topic.
    pub fn deletion(topic: &EntityRef) -> Self {
        let payload = AnalyticsPayload {
            id: topic.id.clone(),
            analytics: None,
            deleted: Some(true),
        };
        match topic.kind {
            TopicKind::Thread => Self::ThreadAnalytics(payload),
            TopicKind::User => Self::UserAnalytics(payload),
            TopicKind::Tag => Self::TagAnalytics(payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inbound_envelope_shapes() {
        let msg: InboundMessage =
            serde_json::from_value(json!({"type": "authenticate", "data": {"token": "abc"}}))
                .unwrap();
        assert!(matches!(msg, InboundMessage::Authenticate { token } if token == "abc"));

        let msg: InboundMessage =
            serde_json::from_value(json!({"type": "subscribe", "data": {"threadId": "t1"}}))
                .unwrap();
        match msg {
            InboundMessage::Subscribe(selector) => {
                assert_eq!(selector.topics(), vec![EntityRef::thread("t1")]);
            }
            _ => panic!("Expected Subscribe"),
        }
    }

    #[test]
    fn test_outbound_analytics_envelope() {
        let msg = OutboundMessage::analytics(&EntityRef::thread("t1"), json!({"score": 2.0}));
        let encoded = serde_json::to_value(&msg).unwrap();

        assert_eq!(encoded["type"], "thread_analytics");
        assert_eq!(encoded["data"]["id"], "t1");
        assert_eq!(encoded["data"]["analytics"]["score"], 2.0);
        assert!(encoded["data"].get("deleted").is_none());
    }

    #[test]
    fn test_outbound_deletion_envelope() {
        let msg = OutboundMessage::deletion(&EntityRef::tag("rust"));
        let encoded = serde_json::to_value(&msg).unwrap();

        assert_eq!(encoded["type"], "tag_analytics");
        assert_eq!(encoded["data"]["id"], "rust");
        assert_eq!(encoded["data"]["deleted"], true);
        assert!(encoded["data"].get("analytics").is_none());
    }

    #[test]
    fn test_malformed_inbound_is_rejected() {
        let result = serde_json::from_value::<InboundMessage>(json!({"type": "launch_missiles"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_selector_with_multiple_ids() {
        let selector: TopicSelector =
            serde_json::from_value(json!({"userId": "u1", "tagId": "rust"})).unwrap();
        assert_eq!(
            selector.topics(),
            vec![EntityRef::user("u1"), EntityRef::tag("rust")]
        );
    }
}
