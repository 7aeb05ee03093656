//! Server state wiring and tracing setup.

use std::sync::Arc;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use threadpulse_core::cache::MemoryCacheStore;
use threadpulse_core::AnalyticsCoordinator;

use crate::auth::JwtSessionVerifier;
use crate::config::Config;
use crate::domain::InMemoryForum;
use crate::domain_events::ServerDomainEventSink;

/// Shared handles for the HTTP and WebSocket layers.
pub struct AppState {
    pub coordinator: Arc<AnalyticsCoordinator>,
    pub sink: Arc<ServerDomainEventSink>,
    pub forum: Arc<InMemoryForum>,
}

pub fn init_tracing() {
    let log_format = std::env::var("TP_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

/// Builds the full service graph. Must run inside the tokio runtime:
/// the coordinator spawns its background loops on construction.
pub fn build_state(config: &Config) -> Arc<AppState> {
    let forum = Arc::new(InMemoryForum::new());
    let verifier = Arc::new(JwtSessionVerifier::new(&config.ws_secret));

    let coordinator = AnalyticsCoordinator::start(
        Arc::new(MemoryCacheStore::new()),
        forum.clone(),
        verifier,
        config.engine.clone(),
    );

    let (sink, receiver) = ServerDomainEventSink::new();
    ServerDomainEventSink::start_worker(receiver, forum.clone(), coordinator.clone());

    Arc::new(AppState {
        coordinator,
        sink: Arc::new(sink),
        forum,
    })
}
