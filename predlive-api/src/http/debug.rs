//! Health and connection inspection endpoints

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use predlive_core::models::StreamId;
use predlive_hub::HubStats;
use serde::Serialize;

use crate::http::{events::SubscribeQuery, AppResult, AppState};

pub fn create_debug_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/debug-connections", get(debug_connections))
}

/// Basic health check (always returns OK if server is running)
pub async fn health_check() -> impl IntoResponse {
    "OK"
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugConnectionsResponse {
    /// Present only when the request named a stream
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<StreamId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscriber_count: Option<usize>,
    pub swept_streams: usize,
    #[serde(flatten)]
    pub hub: HubStats,
    pub timestamp: DateTime<Utc>,
}

/// Registry snapshot, optionally focused on one stream
///
/// Empty subscriber sets are swept first so the listing only shows streams
/// with someone listening.
pub async fn debug_connections(
    State(state): State<AppState>,
    Query(query): Query<SubscribeQuery>,
) -> AppResult<Json<DebugConnectionsResponse>> {
    let stream_id = query
        .stream_id
        .filter(|s| !s.is_empty())
        .map(StreamId::parse)
        .transpose()?;

    let swept_streams = state.hub.sweep_empty();
    let subscriber_count = stream_id
        .as_ref()
        .map(|stream_id| state.hub.subscriber_count(stream_id));

    Ok(Json(DebugConnectionsResponse {
        stream_id,
        subscriber_count,
        swept_streams,
        hub: state.hub.stats(),
        timestamp: Utc::now(),
    }))
}
