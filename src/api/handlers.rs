//! Endpoint handlers. Live requests go to the pipeline loop through the
//! [`LiveHandle`](crate::store::LiveHandle); transcript requests rescan the
//! archive on the blocking pool.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use super::AppState;
use crate::activity::ActivityEvent;
use crate::query::{
    tool_actions, ActivityParams, ActivityQuery, ActivityStats, BATCH_DEFAULT_LIMIT,
    LIVE_DEFAULT_LIMIT,
};
use crate::store::TranscriptArchive;

/// Events scanned for the transcript-mode aggregate endpoints.
const BATCH_SCAN_LIMIT: usize = 1000;

/// GET /api/activity
///
/// The query string is taken as raw pairs so that repeated or malformed
/// values fall back to defaults instead of rejecting the request.
pub async fn activity(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Json<Vec<ActivityEvent>> {
    let params = ActivityParams::from_pairs(pairs);
    let events = match state {
        AppState::Live(handle) => {
            let query = ActivityQuery::from_params(params, LIVE_DEFAULT_LIMIT);
            handle.activity(query).await
        }
        AppState::Batch(archive) => {
            let query = ActivityQuery::from_params(params, BATCH_DEFAULT_LIMIT);
            let agent = query.agent.clone();
            let scanned = scan(archive, agent, query.limit.saturating_mul(2)).await;
            query.apply(&scanned)
        }
    };
    Json(events)
}

/// GET /api/stats
pub async fn stats(State(state): State<AppState>) -> Json<ActivityStats> {
    let stats = match state {
        AppState::Live(handle) => handle.stats().await,
        AppState::Batch(archive) => {
            let scanned = scan(archive, None, BATCH_SCAN_LIMIT).await;
            ActivityStats::from_events(&scanned)
        }
    };
    Json(stats)
}

/// GET /api/agents
pub async fn agents(State(state): State<AppState>) -> Response {
    match state {
        AppState::Live(_) => not_found().await.into_response(),
        AppState::Batch(archive) => {
            let agents = tokio::task::spawn_blocking(move || archive.agents())
                .await
                .unwrap_or_default();
            Json(agents).into_response()
        }
    }
}

/// GET /api/tools
pub async fn tools(State(state): State<AppState>) -> Response {
    match state {
        AppState::Live(_) => not_found().await.into_response(),
        AppState::Batch(archive) => {
            let scanned = scan(archive, None, BATCH_SCAN_LIMIT).await;
            Json(tool_actions(&scanned)).into_response()
        }
    }
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}

async fn scan(
    archive: Arc<TranscriptArchive>,
    agent: Option<String>,
    limit: usize,
) -> Vec<ActivityEvent> {
    let result = tokio::task::spawn_blocking(move || archive.scan(agent.as_deref(), limit)).await;
    match result {
        Ok(events) => events,
        Err(err) => {
            tracing::warn!(%err, "transcript scan failed");
            Vec::new()
        }
    }
}

#[cfg(test)]
#[path = "../../tests/helpers/mod.rs"]
#[allow(dead_code)]
mod helpers;
