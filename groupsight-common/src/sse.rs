//! Server-Sent Events (SSE) utilities
//!
//! Shared SSE stream construction for GroupSight endpoints. Every stream
//! forwards matching `GroupSightEvent`s from the EventBus and emits a
//! heartbeat comment every 15 seconds.

use crate::events::GroupSightEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

/// Heartbeat interval shared by all SSE endpoints
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Convert an event into an SSE frame (`event:` = event type, `data:` = JSON)
pub fn to_sse_event(event: &GroupSightEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Event::default().event(event.event_type()).data(json)),
        Err(e) => {
            warn!("SSE: Failed to serialize event {}: {}", event.event_type(), e);
            None
        }
    }
}

/// Create an SSE stream forwarding bus events accepted by `filter`
///
/// `label` only identifies the stream in logs (e.g. "session 1234").
/// The stream ends when the bus is dropped. Lagged receivers skip the
/// missed events and keep going.
pub fn filtered_event_stream<F>(
    label: String,
    mut rx: broadcast::Receiver<GroupSightEvent>,
    filter: F,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    F: Fn(&GroupSightEvent) -> bool + Send + 'static,
{
    info!("New SSE client connected to {}", label);

    let stream = async_stream::stream! {
        yield Ok(Event::default().event("ConnectionStatus").data("connected"));

        loop {
            tokio::select! {
                _ = tokio::time::sleep(HEARTBEAT_INTERVAL) => {
                    debug!("SSE: Sending heartbeat");
                    yield Ok(Event::default().comment("heartbeat"));
                }

                received = rx.recv() => {
                    match received {
                        Ok(event) => {
                            if !filter(&event) {
                                continue;
                            }
                            debug!("SSE: Forwarding {} to {}", event.event_type(), label);
                            if let Some(frame) = to_sse_event(&event) {
                                yield Ok(frame);
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("SSE: {} lagged, skipped {} events", label, skipped);
                        }
                        Err(RecvError::Closed) => {
                            info!("SSE: Event bus closed, ending stream for {}", label);
                            break;
                        }
                    }
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(HEARTBEAT_INTERVAL).text("heartbeat"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_to_sse_event_serializes() {
        let event = GroupSightEvent::SessionEnded {
            session_id: Uuid::nil(),
            timestamp: Utc::now(),
        };
        assert!(to_sse_event(&event).is_some());
    }
}
