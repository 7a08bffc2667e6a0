//! Session API handlers
//!
//! POST /sessions, GET|DELETE /sessions/:session_id, POST /sessions/:session_id/end

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use groupsight_common::{Criterion, Session};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::ApiResult, services::NewCriterion, AppState};

/// POST /sessions request
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub title: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub criteria: Vec<NewCriterion>,
}

/// Session with its rubric
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub session: Session,
    pub criteria: Vec<Criterion>,
}

/// POST /sessions
///
/// Criteria are numbered by their position in the request.
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> ApiResult<(StatusCode, Json<SessionResponse>)> {
    let (session, criteria) = state
        .service
        .create_session(&request.title, &request.context, request.criteria)
        .await?;

    Ok((StatusCode::CREATED, Json(SessionResponse { session, criteria })))
}

/// GET /sessions/:session_id
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SessionResponse>> {
    let (session, criteria) = state.service.get_session(session_id).await?;
    Ok(Json(SessionResponse { session, criteria }))
}

/// DELETE /sessions/:session_id
///
/// Whole-session cleanup, including all group progress.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.service.delete_session(session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /sessions/:session_id/end
pub async fn end_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<Session>> {
    let session = state.service.end_session(session_id).await?;
    Ok(Json(session))
}

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/:session_id", get(get_session).delete(delete_session))
        .route("/sessions/:session_id/end", post(end_session))
}
