//! Recording control handlers
//!
//! Start and stop the session-wide recording broadcast.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{error::ApiResult, services::BroadcastStatus, AppState};

/// POST /sessions/:session_id/recording/start response
#[derive(Debug, Serialize)]
pub struct StartRecordingResponse {
    pub session_id: Uuid,
    /// Groups signalled in the initial fan-out
    pub signalled_groups: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct StopRecordingResponse {
    pub session_id: Uuid,
    pub recording: bool,
}

/// POST /sessions/:session_id/recording/start
///
/// Returns immediately; acknowledgements are collected in the background.
pub async fn start_recording(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<StartRecordingResponse>> {
    let signalled_groups = state.service.begin_recording(session_id).await?;
    Ok(Json(StartRecordingResponse {
        session_id,
        signalled_groups,
    }))
}

/// POST /sessions/:session_id/recording/stop
pub async fn stop_recording(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<StopRecordingResponse>> {
    state.service.stop_recording(session_id).await?;
    Ok(Json(StopRecordingResponse {
        session_id,
        recording: false,
    }))
}

/// GET /sessions/:session_id/recording
pub async fn recording_status(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<BroadcastStatus>> {
    Ok(Json(state.service.broadcast_status(session_id).await?))
}

pub fn recording_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions/:session_id/recording", get(recording_status))
        .route("/sessions/:session_id/recording/start", post(start_recording))
        .route("/sessions/:session_id/recording/stop", post(stop_recording))
}
