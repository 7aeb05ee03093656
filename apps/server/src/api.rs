//! HTTP surface: the WebSocket endpoint plus thin JSON routes over
//! the coordinator (metric reads, event ingestion for the mutation
//! pipeline, administrative cache invalidation).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use threadpulse_core::events::{DomainEvent, DomainEventSink};
use threadpulse_core::{EntityRef, TopicKind};

use crate::main_lib::AppState;
use crate::ws::ws_handler;

pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/api/health", get(health))
        .route("/api/events", post(ingest_event))
        .route("/api/metrics/{kind}/{id}", get(get_metrics))
        .route("/api/analytics/aggregated", get(get_aggregated))
        .route("/api/cache/clear", post(clear_cache))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Mutation pipeline boundary: accepts a committed domain event and
/// queues it for analytics processing. Always 202 - the write already
/// happened, analytics failures must not surface here.
async fn ingest_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<DomainEvent>,
) -> impl IntoResponse {
    state.sink.emit(event);
    StatusCode::ACCEPTED
}

async fn get_metrics(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
) -> impl IntoResponse {
    let Some(kind) = parse_kind(&kind) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "kind must be thread, user or tag" })),
        );
    };

    match state.coordinator.get_metrics(&EntityRef::new(kind, id)).await {
        Ok(Some(metrics)) => (StatusCode::OK, Json(json!(metrics))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "entity not found" })),
        ),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": err.to_string() })),
        ),
    }
}

async fn get_aggregated(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.coordinator.get_aggregated_view().await {
        Ok(view) => (StatusCode::OK, Json(json!(view))),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": err.to_string() })),
        ),
    }
}

#[derive(Deserialize)]
struct ClearParams {
    prefix: Option<String>,
}

async fn clear_cache(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ClearParams>,
) -> impl IntoResponse {
    state.coordinator.clear_cache(params.prefix.as_deref()).await;
    StatusCode::NO_CONTENT
}

fn parse_kind(kind: &str) -> Option<TopicKind> {
    match kind {
        "thread" => Some(TopicKind::Thread),
        "user" => Some(TopicKind::User),
        "tag" => Some(TopicKind::Tag),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind() {
        assert_eq!(parse_kind("thread"), Some(TopicKind::Thread));
        assert_eq!(parse_kind("user"), Some(TopicKind::User));
        assert_eq!(parse_kind("tag"), Some(TopicKind::Tag));
        assert_eq!(parse_kind("message"), None);
    }
}
