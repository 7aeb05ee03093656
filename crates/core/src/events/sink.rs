//! Domain event sink trait and implementations.

use std::sync::{Arc, Mutex};

use super::DomainEvent;

/// Receives domain events from the mutation pipeline after each
/// committed write (thread created, message deleted, ...).
///
/// `emit()` must be fast and non-blocking - no network calls, no
/// database writes - and must never fail the write that produced the
/// event. Implementations queue events for asynchronous analytics
/// processing.
pub trait DomainEventSink: Send + Sync {
    /// Emit a single domain event.
    fn emit(&self, event: DomainEvent);

    /// Emit multiple domain events. Defaults to `emit()` per event.
    fn emit_batch(&self, events: Vec<DomainEvent>) {
        for event in events {
            self.emit(event);
        }
    }
}

/// Sink that discards everything, for contexts with no analytics.
#[derive(Clone, Default)]
pub struct NoOpDomainEventSink;

impl DomainEventSink for NoOpDomainEventSink {
    fn emit(&self, _event: DomainEvent) {}
}

/// Test sink that records emitted events in order.
#[derive(Clone, Default)]
pub struct MockDomainEventSink {
    events: Arc<Mutex<Vec<DomainEvent>>>,
}

impl MockDomainEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything emitted so far, in emission order.
    pub fn emitted(&self) -> Vec<DomainEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl DomainEventSink for MockDomainEventSink {
    fn emit(&self, event: DomainEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ChangeRecord, EntityKind};

    #[test]
    fn test_noop_sink_does_not_panic() {
        let sink = NoOpDomainEventSink;
        sink.emit(DomainEvent::created(
            EntityKind::Thread,
            ChangeRecord::new("t1"),
        ));
        sink.emit_batch(vec![
            DomainEvent::updated(EntityKind::User, ChangeRecord::new("u1")),
            DomainEvent::deleted(EntityKind::Tag, ChangeRecord::new("rust")),
        ]);
    }

    #[test]
    fn test_mock_sink_records_in_order() {
        let sink = MockDomainEventSink::new();
        sink.emit(DomainEvent::created(
            EntityKind::Message,
            ChangeRecord::new("m1").with_thread("t1"),
        ));
        sink.emit_batch(vec![
            DomainEvent::updated(EntityKind::Thread, ChangeRecord::new("t1")),
            DomainEvent::deleted(EntityKind::Thread, ChangeRecord::new("t1")),
        ]);

        let emitted = sink.emitted();
        assert_eq!(emitted.len(), 3);
        assert!(matches!(emitted[0], DomainEvent::Created { .. }));
        assert!(matches!(emitted[2], DomainEvent::Deleted { .. }));
    }
}
