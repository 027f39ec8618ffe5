//! Axum route handlers for the roundtable HTTP server.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::DEFAULT_TOPIC;
use crate::error::LifecycleError;
use crate::hub::BroadcastHub;
use crate::lifecycle::DiscussionController;
use crate::transcript::{TranscriptStore, SYSTEM_SENDER};

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    /// Lifecycle controller (start/stop/status, guarded clear).
    pub controller: Arc<DiscussionController>,
    /// Durable transcript/state store.
    pub store: Arc<TranscriptStore>,
    /// Observer broadcast hub.
    pub hub: Arc<BroadcastHub>,
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/discussion/start", post(start_handler))
        .route("/discussion/stop", post(stop_handler))
        .route("/discussion/status", get(status_handler))
        .route("/transcript", get(transcript_handler))
        .route("/transcript/clear", post(clear_handler))
        .route("/strategy", get(get_strategy_handler).put(put_strategy_handler))
        .route("/goal", get(get_goal_handler).put(put_goal_handler))
        .route("/ws", get(crate::server::ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn lifecycle_error(e: LifecycleError) -> (StatusCode, Json<Value>) {
    let status = match e {
        LifecycleError::AlreadyRunning
        | LifecycleError::NotRunning
        | LifecycleError::Busy => StatusCode::CONFLICT,
        LifecycleError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({ "error": e.to_string() })))
}

/// GET /health — liveness probe.
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
        "service": "roundtable",
    }))
}

#[derive(Debug, Deserialize, Default)]
struct StartRequest {
    topic: Option<String>,
}

/// POST /discussion/start — accept a new discussion session.
async fn start_handler(
    State(state): State<AppState>,
    body: Option<Json<StartRequest>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let topic = body
        .and_then(|Json(req)| req.topic)
        .unwrap_or_else(|| DEFAULT_TOPIC.to_string());

    state
        .controller
        .start(topic.clone())
        .map_err(lifecycle_error)?;

    Ok(Json(serde_json::json!({
        "status": "accepted",
        "topic": topic,
    })))
}

/// POST /discussion/stop — request a cooperative stop.
async fn stop_handler(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state.controller.stop().map_err(lifecycle_error)?;
    Ok(Json(serde_json::json!({ "status": "stopping" })))
}

/// GET /discussion/status — current lifecycle status.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({ "status": state.controller.status() }))
}

/// GET /transcript — full history in sequence order.
async fn transcript_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.store.read_all())
}

/// POST /transcript/clear — purge the transcript.
///
/// Rejected with 409 while a discussion is running; strategy and goal are
/// unaffected.
async fn clear_handler(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state.controller.clear_transcript().map_err(lifecycle_error)?;
    Ok(Json(serde_json::json!({ "status": "cleared" })))
}

/// GET /strategy — current strategy document.
async fn get_strategy_handler(State(state): State<AppState>) -> impl IntoResponse {
    let strategy = state.store.strategy();
    Json(serde_json::json!({
        "strategy": strategy.text,
        "version": strategy.version,
    }))
}

#[derive(Debug, Deserialize)]
struct StrategyRequest {
    strategy: String,
}

/// PUT /strategy — replace the strategy document wholesale.
async fn put_strategy_handler(
    State(state): State<AppState>,
    Json(req): Json<StrategyRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let updated = state
        .store
        .set_strategy(req.strategy)
        .map_err(|e| lifecycle_error(e.into()))?;
    state
        .hub
        .record(SYSTEM_SENDER, "Strategy updated")
        .map_err(|e| lifecycle_error(e.into()))?;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "version": updated.version,
    })))
}

/// GET /goal — current goal text.
async fn get_goal_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({ "goal": state.store.goal() }))
}

#[derive(Debug, Deserialize)]
struct GoalRequest {
    goal: String,
}

/// PUT /goal — replace the goal text wholesale.
async fn put_goal_handler(
    State(state): State<AppState>,
    Json(req): Json<GoalRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .store
        .set_goal(req.goal)
        .map_err(|e| lifecycle_error(e.into()))?;
    state
        .hub
        .record(SYSTEM_SENDER, "Goal updated")
        .map_err(|e| lifecycle_error(e.into()))?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
