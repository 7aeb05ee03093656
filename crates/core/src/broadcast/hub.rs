//! Connection hub.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::protocol::{InboundMessage, OutboundMessage};
use crate::metrics::{EntityRef, TopicKind};

/// Identifier for one live connection.
pub type ConnectionId = Uuid;

/// Verifies authentication tokens presented over the wire.
///
/// Session issuance lives outside this subsystem; the hub only needs
/// a yes/no answer per token.
pub trait SessionVerifier: Send + Sync {
    fn verify(&self, token: &str) -> bool;
}

/// Verifier that accepts a single pre-shared token. Used in tests and
/// single-tenant deployments.
pub struct StaticTokenVerifier {
    token: String,
}

impl StaticTokenVerifier {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl SessionVerifier for StaticTokenVerifier {
    fn verify(&self, token: &str) -> bool {
        token == self.token
    }
}

#[derive(Default)]
struct TopicSets {
    threads: HashSet<String>,
    users: HashSet<String>,
    tags: HashSet<String>,
}

impl TopicSets {
    fn set_for(&mut self, kind: TopicKind) -> &mut HashSet<String> {
        match kind {
            TopicKind::Thread => &mut self.threads,
            TopicKind::User => &mut self.users,
            TopicKind::Tag => &mut self.tags,
        }
    }

    fn contains(&self, topic: &EntityRef) -> bool {
        match topic.kind {
            TopicKind::Thread => self.threads.contains(&topic.id),
            TopicKind::User => self.users.contains(&topic.id),
            TopicKind::Tag => self.tags.contains(&topic.id),
        }
    }
}

struct Connection {
    tx: mpsc::UnboundedSender<OutboundMessage>,
    authenticated: bool,
    topics: TopicSets,
}

impl Connection {
    /// Best-effort send; false means the peer side is gone.
    fn send(&self, message: OutboundMessage) -> bool {
        self.tx.send(message).is_ok()
    }
}

/// Manages live connections, their auth state and subscriptions, and
/// delivers filtered broadcasts.
///
/// Per-connection failures are always isolated: a dead peer is
/// dropped from the table without affecting delivery to the others.
#[derive(Clone)]
pub struct Broadcaster {
    inner: Arc<HubInner>,
}

struct HubInner {
    connections: Mutex<HashMap<ConnectionId, Connection>>,
    verifier: Arc<dyn SessionVerifier>,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
}

impl Broadcaster {
    pub fn new(verifier: Arc<dyn SessionVerifier>) -> Self {
        Self {
            inner: Arc::new(HubInner {
                connections: Mutex::new(HashMap::new()),
                verifier,
                heartbeat: Mutex::new(None),
            }),
        }
    }

    /// Registers a new connection and returns its id plus the
    /// receiver the transport must drain. An `auth_required` notice is
    /// queued immediately.
    pub fn register(&self) -> (ConnectionId, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        let connection = Connection {
            tx,
            authenticated: false,
            topics: TopicSets::default(),
        };
        connection.send(OutboundMessage::auth_required());
        self.inner.connections.lock().unwrap().insert(id, connection);
        debug!("Connection {} registered", id);
        (id, rx)
    }

    /// Removes a connection; its subscriptions die with it.
    pub fn unregister(&self, id: ConnectionId) {
        if self.inner.connections.lock().unwrap().remove(&id).is_some() {
            debug!("Connection {} unregistered", id);
        }
    }

    pub fn connection_count(&self) -> usize {
        self.inner.connections.lock().unwrap().len()
    }

    /// Handles one inbound text frame from a connection.
    ///
    /// Malformed messages and protocol violations produce an `error`
    /// envelope to the sender; the connection always stays open.
    pub fn handle_message(&self, id: ConnectionId, raw: &str) {
        let parsed: InboundMessage = match serde_json::from_str(raw) {
            Ok(message) => message,
            Err(err) => {
                debug!("Connection {} sent malformed message: {}", id, err);
                self.send_to(id, OutboundMessage::error("Unrecognized message format"));
                return;
            }
        };

        match parsed {
            InboundMessage::Authenticate { token } => {
                if self.inner.verifier.verify(&token) {
                    let mut connections = self.inner.connections.lock().unwrap();
                    if let Some(connection) = connections.get_mut(&id) {
                        connection.authenticated = true;
                        connection.send(OutboundMessage::auth_success());
                    }
                } else {
                    debug!("Connection {} presented an invalid token", id);
                    self.send_to(id, OutboundMessage::error("Invalid authentication token"));
                }
            }
            InboundMessage::Subscribe(selector) => {
                self.update_subscriptions(id, selector.topics(), true);
            }
            InboundMessage::Unsubscribe(selector) => {
                self.update_subscriptions(id, selector.topics(), false);
            }
        }
    }

    fn update_subscriptions(&self, id: ConnectionId, topics: Vec<EntityRef>, subscribe: bool) {
        let mut connections = self.inner.connections.lock().unwrap();
        let Some(connection) = connections.get_mut(&id) else {
            return;
        };

        if !connection.authenticated {
            connection.send(OutboundMessage::error(
                "Authentication required before subscribing",
            ));
            return;
        }
        if topics.is_empty() {
            connection.send(OutboundMessage::error(
                "No topic specified (expected threadId, userId or tagId)",
            ));
            return;
        }

        for topic in topics {
            let set = connection.topics.set_for(topic.kind);
            if subscribe {
                set.insert(topic.id);
            } else {
                set.remove(&topic.id);
            }
        }
    }

    /// Delivers `message` to every connection subscribed to `topic`.
    /// Returns the number of peers reached. Dead peers are pruned.
    pub fn broadcast(&self, topic: &EntityRef, message: OutboundMessage) -> usize {
        let mut connections = self.inner.connections.lock().unwrap();
        let mut delivered = 0;
        let mut dead: Vec<ConnectionId> = Vec::new();

        for (id, connection) in connections.iter() {
            if !connection.topics.contains(topic) {
                continue;
            }
            if connection.send(message.clone()) {
                delivered += 1;
            } else {
                dead.push(*id);
            }
        }

        for id in dead {
            warn!("Dropping dead connection {} during broadcast", id);
            connections.remove(&id);
        }
        delivered
    }

    /// Starts the liveness heartbeat, sending a ping to every
    /// connection on each interval. Dead peers are pruned as they are
    /// discovered.
    pub fn start_heartbeat(&self, period: Duration) {
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // Skip the immediate first tick; a fresh connection has
            // nothing to prove yet.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let mut connections = inner.connections.lock().unwrap();
                let ping = OutboundMessage::ping();
                connections.retain(|id, connection| {
                    let alive = connection.send(ping.clone());
                    if !alive {
                        warn!("Dropping dead connection {} during heartbeat", id);
                    }
                    alive
                });
            }
        });

        let mut heartbeat = self.inner.heartbeat.lock().unwrap();
        if let Some(previous) = heartbeat.replace(handle) {
            previous.abort();
        }
    }

    /// Stops the heartbeat and closes every connection by dropping its
    /// sender; transports observe the channel closing and hang up.
    pub fn shutdown(&self) {
        if let Some(handle) = self.inner.heartbeat.lock().unwrap().take() {
            handle.abort();
        }
        self.inner.connections.lock().unwrap().clear();
    }

    fn send_to(&self, id: ConnectionId, message: OutboundMessage) {
        let connections = self.inner.connections.lock().unwrap();
        if let Some(connection) = connections.get(&id) {
            connection.send(message);
        }
    }

    /// Whether a connection has authenticated. Test/diagnostic helper.
    pub fn is_authenticated(&self, id: ConnectionId) -> bool {
        self.inner
            .connections
            .lock()
            .unwrap()
            .get(&id)
            .map(|c| c.authenticated)
            .unwrap_or(false)
    }
}
