//! Server-Sent Events streams
//!
//! The session owner sees every event of the session. A group sees only the
//! signals addressed to it, session-wide broadcasts and its released
//! snapshots; live progress stays with the owner until released.

use axum::{
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use groupsight_common::sse::filtered_event_stream;
use std::convert::Infallible;
use uuid::Uuid;

use crate::{error::ApiResult, AppState};

/// GET /sessions/:session_id/events
pub async fn session_event_stream(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    state.service.get_session(session_id).await?;

    let rx = state.event_bus.subscribe();
    Ok(filtered_event_stream(
        format!("session {} events", session_id),
        rx,
        move |event| event.session_id() == session_id,
    ))
}

/// GET /sessions/:session_id/groups/:group_id/events
pub async fn group_event_stream(
    State(state): State<AppState>,
    Path((session_id, group_id)): Path<(Uuid, String)>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    state.service.get_session(session_id).await?;

    let rx = state.event_bus.subscribe();
    let label = format!("group {} events (session {})", group_id, session_id);
    Ok(filtered_event_stream(label, rx, move |event| {
        event.visible_to_group(session_id, &group_id)
    }))
}

pub fn sse_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions/:session_id/events", get(session_event_stream))
        .route(
            "/sessions/:session_id/groups/:group_id/events",
            get(group_event_stream),
        )
}
