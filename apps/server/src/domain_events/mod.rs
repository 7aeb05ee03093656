//! Domain events runtime bridge for the web server.
//!
//! Receives domain events via `DomainEventSink`, applies them to the
//! in-memory domain state, and hands them to the coordinator for
//! recomputation and broadcast. The channel keeps `emit()`
//! non-blocking so the mutation path never waits on analytics.

mod sink;

pub use sink::ServerDomainEventSink;
