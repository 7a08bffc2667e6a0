//! Group API handlers
//!
//! Everything under /sessions/:session_id/groups/:group_id

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use groupsight_common::{GroupLiveState, PayloadEntry, ReleaseSnapshot};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    services::ProcessOutcome,
    AppState,
};

/// POST .../transcript request
#[derive(Debug, Deserialize)]
pub struct TranscriptRequest {
    /// Full transcript so far (rounds re-evaluate the growing text)
    pub text: String,
}

/// POST .../release request
#[derive(Debug, Default, Deserialize)]
pub struct ReleaseRequest {
    /// Caller's view of the group's progress; may be empty
    #[serde(default)]
    pub payload: Vec<PayloadEntry>,
}

#[derive(Debug, Serialize)]
pub struct GroupStateResponse {
    pub session_id: Uuid,
    pub group_id: String,
    #[serde(flatten)]
    pub state: GroupLiveState,
}

#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub session_id: Uuid,
    pub group_id: String,
    /// False if the group was not waiting for an acknowledgement
    pub acknowledged: bool,
}

fn validate_group_id(group_id: &str) -> ApiResult<()> {
    if group_id.trim().is_empty() {
        return Err(ApiError::BadRequest("group_id must not be empty".to_string()));
    }
    Ok(())
}

/// POST /sessions/:session_id/groups/:group_id/join
pub async fn join_group(
    State(state): State<AppState>,
    Path((session_id, group_id)): Path<(Uuid, String)>,
) -> ApiResult<Json<GroupStateResponse>> {
    validate_group_id(&group_id)?;
    let live = state.service.join_group(session_id, &group_id).await?;
    Ok(Json(GroupStateResponse {
        session_id,
        group_id,
        state: live,
    }))
}

/// POST /sessions/:session_id/groups/:group_id/heartbeat
pub async fn heartbeat(
    State(state): State<AppState>,
    Path((session_id, group_id)): Path<(Uuid, String)>,
) -> ApiResult<Json<GroupStateResponse>> {
    validate_group_id(&group_id)?;
    let live = state.service.heartbeat(session_id, &group_id).await?;
    Ok(Json(GroupStateResponse {
        session_id,
        group_id,
        state: live,
    }))
}

/// POST /sessions/:session_id/groups/:group_id/recording/ack
pub async fn ack_recording(
    State(state): State<AppState>,
    Path((session_id, group_id)): Path<(Uuid, String)>,
) -> ApiResult<Json<AckResponse>> {
    validate_group_id(&group_id)?;
    let acknowledged = state.service.ack_recording(session_id, &group_id).await?;
    Ok(Json(AckResponse {
        session_id,
        group_id,
        acknowledged,
    }))
}

/// POST /sessions/:session_id/groups/:group_id/transcript
///
/// 200 with the round's outcome, or 202 `{"status":"skipped"}` when a round
/// for this group is still running.
pub async fn process_transcript(
    State(state): State<AppState>,
    Path((session_id, group_id)): Path<(Uuid, String)>,
    Json(request): Json<TranscriptRequest>,
) -> ApiResult<Response> {
    validate_group_id(&group_id)?;

    let outcome = match state
        .service
        .process_transcript(session_id, &group_id, &request.text)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            if matches!(e, groupsight_common::Error::Database(_)) {
                state
                    .record_error(format!("transcript round for {}: {}", group_id, e))
                    .await;
            }
            return Err(e.into());
        }
    };

    let response = match outcome {
        ProcessOutcome::Processed {
            accepted_count,
            snapshot,
        } => (
            StatusCode::OK,
            Json(json!({
                "status": "processed",
                "accepted_count": accepted_count,
                "snapshot": snapshot,
            })),
        )
            .into_response(),
        ProcessOutcome::Skipped => {
            (StatusCode::ACCEPTED, Json(json!({ "status": "skipped" }))).into_response()
        }
    };

    Ok(response)
}

/// GET /sessions/:session_id/groups/:group_id/progress
pub async fn get_progress(
    State(state): State<AppState>,
    Path((session_id, group_id)): Path<(Uuid, String)>,
) -> ApiResult<Json<ReleaseSnapshot>> {
    validate_group_id(&group_id)?;
    Ok(Json(
        state.service.current_progress(session_id, &group_id).await?,
    ))
}

/// POST /sessions/:session_id/groups/:group_id/release
///
/// Body is optional; without it the snapshot is built from the store and cache.
pub async fn release(
    State(state): State<AppState>,
    Path((session_id, group_id)): Path<(Uuid, String)>,
    request: Option<Json<ReleaseRequest>>,
) -> ApiResult<Json<ReleaseSnapshot>> {
    validate_group_id(&group_id)?;
    let request = request.map(|Json(r)| r).unwrap_or_default();

    let snapshot = state
        .service
        .release_to_group(session_id, &group_id, &request.payload)
        .await?;

    Ok(Json(snapshot))
}

pub fn group_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions/:session_id/groups/:group_id/join", post(join_group))
        .route("/sessions/:session_id/groups/:group_id/heartbeat", post(heartbeat))
        .route(
            "/sessions/:session_id/groups/:group_id/recording/ack",
            post(ack_recording),
        )
        .route(
            "/sessions/:session_id/groups/:group_id/transcript",
            post(process_transcript),
        )
        .route("/sessions/:session_id/groups/:group_id/progress", get(get_progress))
        .route("/sessions/:session_id/groups/:group_id/release", post(release))
}
