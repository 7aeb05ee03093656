//! Live subscriber fan-out.
//!
//! - `protocol.rs` - the tagged JSON envelopes exchanged with peers.
//! - `hub.rs` - the connection table, per-connection auth state and
//!   topic subscriptions, heartbeat, and filtered broadcast.
//!
//! The hub is transport-agnostic: a connection is an outbound mpsc
//! sender plus inbound text handed to [`Broadcaster::handle_message`].
//! The server runtime bridges this to WebSockets.

mod hub;
mod protocol;

pub use hub::{Broadcaster, ConnectionId, SessionVerifier, StaticTokenVerifier};
pub use protocol::{AnalyticsPayload, InboundMessage, OutboundMessage, TopicSelector};
