//! Fire-and-forget delivery of signals to groups
//!
//! No delivery guarantee: the broadcast coordinator retries on top of this.

use chrono::Utc;
use groupsight_common::events::{EventBus, GroupSightEvent};
use serde_json::Value;
use tracing::trace;
use uuid::Uuid;

/// Tells a group to start capturing audio
pub const START_RECORDING: &str = "start_recording";
/// Tells every group in a session to stop capturing audio
pub const STOP_RECORDING: &str = "stop_recording";
/// Carries a released snapshot to its group
pub const ASSESSMENT_RELEASED: &str = "assessment_released";
/// Tells every group the session is over
pub const SESSION_ENDED: &str = "session_ended";

pub trait Transport: Send + Sync {
    /// Send an event to one group
    fn signal(&self, session_id: Uuid, group_id: &str, event_name: &str, payload: Value);

    /// Send an event to every group in a session
    fn broadcast(&self, session_id: Uuid, event_name: &str, payload: Value);
}

/// Transport publishing on the EventBus; group SSE streams pick signals up
#[derive(Clone)]
pub struct EventBusTransport {
    event_bus: EventBus,
}

impl EventBusTransport {
    pub fn new(event_bus: EventBus) -> Self {
        Self { event_bus }
    }
}

impl Transport for EventBusTransport {
    fn signal(&self, session_id: Uuid, group_id: &str, event_name: &str, payload: Value) {
        trace!(session_id = %session_id, group_id, event_name, "Signal");
        self.event_bus.emit_lossy(GroupSightEvent::GroupSignal {
            session_id,
            group_id: group_id.to_string(),
            event_name: event_name.to_string(),
            payload,
            timestamp: Utc::now(),
        });
    }

    fn broadcast(&self, session_id: Uuid, event_name: &str, payload: Value) {
        trace!(session_id = %session_id, event_name, "Broadcast");
        self.event_bus.emit_lossy(GroupSightEvent::SessionBroadcast {
            session_id,
            event_name: event_name.to_string(),
            payload,
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_signal_reaches_bus() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let transport = EventBusTransport::new(bus);
        let session_id = Uuid::new_v4();

        transport.signal(session_id, "g1", START_RECORDING, json!({}));
        transport.broadcast(session_id, STOP_RECORDING, json!({}));

        match rx.recv().await.unwrap() {
            GroupSightEvent::GroupSignal { group_id, event_name, .. } => {
                assert_eq!(group_id, "g1");
                assert_eq!(event_name, START_RECORDING);
            }
            other => panic!("unexpected event {:?}", other),
        }
        match rx.recv().await.unwrap() {
            GroupSightEvent::SessionBroadcast { event_name, .. } => {
                assert_eq!(event_name, STOP_RECORDING)
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_no_subscribers_is_fine() {
        let transport = EventBusTransport::new(EventBus::new(4));
        transport.broadcast(Uuid::new_v4(), SESSION_ENDED, Value::Null);
    }
}
