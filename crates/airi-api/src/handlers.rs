//! Route handler functions for all API endpoints.
//!
//! Each handler extracts its inputs via axum extractors, delegates to the
//! [`airi_assistant::Assistant`] in [`AppState`], and returns JSON or an
//! event stream.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::header::HeaderName;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use tracing::{info, warn};

use airi_assistant::StreamEvent;
use airi_core::{AssistantRequest, StructuredResponse};

use crate::error::ApiError;
use crate::state::AppState;

/// Disables proxy buffering so events reach the client as they are sent.
static X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub llm_provider: String,
    pub llm_model: String,
    pub memory_backend: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RootResponse {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearMemoryResponse {
    pub status: String,
    pub session_id: String,
}

// =============================================================================
// Handler functions
// =============================================================================

/// GET /health - liveness plus the active LLM provider and model.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        llm_provider: state.llm_provider.clone(),
        llm_model: state.llm_model.clone(),
        memory_backend: state.assistant.memory().backend().to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET / - service name and version.
pub async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        name: state.app_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /api/v1/process - one-shot protocol.
pub async fn process(
    State(state): State<AppState>,
    Json(request): Json<AssistantRequest>,
) -> Result<Json<StructuredResponse>, ApiError> {
    request.validate()?;
    Ok(Json(state.assistant.process(&request).await))
}

/// POST /api/v1/stream - streamed protocol as server-sent events.
///
/// Each event is `data: <json>\n\n` with a `type` of `thinking`, `token`
/// or `done`.
pub async fn stream(
    State(state): State<AppState>,
    Json(request): Json<AssistantRequest>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate()?;
    info!(session = request.session().unwrap_or("anon"), "Stream opened");

    let events = state.assistant.stream(request).map(|event: StreamEvent| {
        let sse = Event::default().json_data(&event).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to encode stream event");
            Event::default().data("{}")
        });
        Ok::<_, Infallible>(sse)
    });

    let sse = Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)));
    Ok(([(X_ACCEL_BUFFERING.clone(), "no")], sse))
}

/// DELETE /api/v1/memory/{session_id} - forget a session. Idempotent.
pub async fn clear_memory(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<ClearMemoryResponse> {
    state.assistant.clear_memory(&session_id).await;
    info!(session = %session_id, "Memory cleared");
    Json(ClearMemoryResponse {
        status: "cleared".to_string(),
        session_id,
    })
}
