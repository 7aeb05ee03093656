//! End-to-end engine flow: mutation events in, warm caches and
//! filtered live broadcasts out.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use threadpulse_core::broadcast::{OutboundMessage, StaticTokenVerifier};
use threadpulse_core::cache::MemoryCacheStore;
use threadpulse_core::events::{ChangeRecord, DomainEvent, EntityKind};
use threadpulse_core::metrics::MockMetricsComputer;
use threadpulse_core::{AnalyticsCoordinator, EngineConfig, EntityRef, TopicKind};

fn fast_config() -> EngineConfig {
    EngineConfig {
        batch_interval: Duration::from_secs(1),
        sweep_interval: Duration::from_secs(60),
        ..EngineConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn mutation_to_subscriber_round_trip() {
    let computer = MockMetricsComputer::new();
    computer.seed_known(TopicKind::Thread, vec!["t1".to_string(), "t2".to_string()]);
    let coordinator = AnalyticsCoordinator::start(
        Arc::new(MemoryCacheStore::new()),
        computer.clone(),
        Arc::new(StaticTokenVerifier::new("secret")),
        fast_config(),
    );

    // A live client connects, authenticates and subscribes to t1.
    let hub = coordinator.broadcaster();
    let (conn, mut rx) = hub.register();
    hub.handle_message(
        conn,
        &json!({"type": "authenticate", "data": {"token": "secret"}}).to_string(),
    );
    hub.handle_message(
        conn,
        &json!({"type": "subscribe", "data": {"threadId": "t1"}}).to_string(),
    );
    while rx.try_recv().is_ok() {}

    // A message lands in t1: the subscriber hears about it.
    coordinator
        .handle_event(DomainEvent::created(
            EntityKind::Message,
            ChangeRecord::new("m1").with_thread("t1").with_user("u1"),
        ))
        .await;

    match rx.try_recv().expect("subscriber should receive an update") {
        OutboundMessage::ThreadAnalytics(payload) => {
            assert_eq!(payload.id, "t1");
            assert!(payload.analytics.is_some());
        }
        other => panic!("unexpected message: {:?}", other),
    }

    // A mutation in an unrelated thread stays silent for this client.
    coordinator
        .handle_event(DomainEvent::created(
            EntityKind::Message,
            ChangeRecord::new("m2").with_thread("t2").with_user("u2"),
        ))
        .await;
    assert!(rx.try_recv().is_err());

    // Let the batch drains settle, then check the read path is warm.
    tokio::time::sleep(Duration::from_secs(5)).await;
    let warm = computer.compute_count(&EntityRef::thread("t1"));
    let metrics = coordinator
        .get_metrics(&EntityRef::thread("t1"))
        .await
        .unwrap();
    assert!(metrics.is_some());
    assert_eq!(computer.compute_count(&EntityRef::thread("t1")), warm);

    // Deleting the thread evicts and notifies.
    computer.mark_missing(EntityRef::thread("t1"));
    coordinator
        .handle_event(DomainEvent::deleted(
            EntityKind::Thread,
            ChangeRecord::new("t1"),
        ))
        .await;
    match rx.try_recv().expect("subscriber should hear the deletion") {
        OutboundMessage::ThreadAnalytics(payload) => assert_eq!(payload.deleted, Some(true)),
        other => panic!("unexpected message: {:?}", other),
    }
    assert!(coordinator
        .get_metrics(&EntityRef::thread("t1"))
        .await
        .unwrap()
        .is_none());

    coordinator.cleanup().await;
}
