//! Server domain event sink implementation.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info};

use threadpulse_core::events::{DomainEvent, DomainEventSink};
use threadpulse_core::AnalyticsCoordinator;

use crate::domain::InMemoryForum;

/// Web server implementation of the domain event sink.
///
/// Events are sent to an unbounded mpsc channel and processed by a
/// background worker, so `emit()` is fast, non-blocking, and can
/// never fail the write that produced the event.
pub struct ServerDomainEventSink {
    sender: mpsc::UnboundedSender<DomainEvent>,
}

impl ServerDomainEventSink {
    /// Creates the sink and its receiver. The worker must be started
    /// separately once the coordinator exists.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DomainEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Starts the worker that folds events into the domain state and
    /// forwards them to the coordinator.
    pub fn start_worker(
        mut receiver: mpsc::UnboundedReceiver<DomainEvent>,
        forum: Arc<InMemoryForum>,
        coordinator: Arc<AnalyticsCoordinator>,
    ) {
        tokio::spawn(async move {
            info!("Domain event worker started");
            while let Some(event) = receiver.recv().await {
                // Fold the mutation first so recomputation sees
                // post-write state.
                forum.apply(&event);
                coordinator.handle_event(event).await;
            }
            info!("Domain event worker shutting down");
        });
    }
}

impl DomainEventSink for ServerDomainEventSink {
    fn emit(&self, event: DomainEvent) {
        if let Err(err) = self.sender.send(event) {
            error!("Failed to queue domain event: {}", err);
        }
    }
}
