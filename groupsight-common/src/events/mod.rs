//! Event types for the GroupSight event system
//!
//! Provides the shared event definitions and the EventBus used by every
//! component that needs to reach session owners or groups.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::ReleaseSnapshot;

/// GroupSight event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
/// Every event belongs to exactly one session; group-scoped events also name
/// their group so SSE endpoints can filter per audience.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GroupSightEvent {
    /// Session created with its rubric
    SessionCreated {
        session_id: Uuid,
        title: String,
        criteria_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Session ended; live state for it has been discarded
    SessionEnded {
        session_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Group connected to the session
    GroupJoined {
        session_id: Uuid,
        group_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Targeted signal to a single group (transport `signal`)
    ///
    /// Examples: `start_recording`, `assessment_released`
    GroupSignal {
        session_id: Uuid,
        group_id: String,
        event_name: String,
        payload: serde_json::Value,
        timestamp: DateTime<Utc>,
    },

    /// Signal to every group in a session (transport `broadcast`)
    SessionBroadcast {
        session_id: Uuid,
        event_name: String,
        payload: serde_json::Value,
        timestamp: DateTime<Utc>,
    },

    /// A processing round finished for a group
    ///
    /// Session-owner only: carries the unreleased live snapshot.
    ProgressUpdated {
        session_id: Uuid,
        group_id: String,
        accepted_count: usize,
        snapshot: ReleaseSnapshot,
        timestamp: DateTime<Utc>,
    },

    /// Snapshot released to a group
    SnapshotReleased {
        session_id: Uuid,
        group_id: String,
        snapshot: ReleaseSnapshot,
        timestamp: DateTime<Utc>,
    },

    /// Start-recording broadcast settled (all acknowledged or deadline reached)
    BroadcastSettled {
        session_id: Uuid,
        acknowledged: Vec<String>,
        unacknowledged: Vec<String>,
        timestamp: DateTime<Utc>,
    },
}

impl GroupSightEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &str {
        match self {
            GroupSightEvent::SessionCreated { .. } => "SessionCreated",
            GroupSightEvent::SessionEnded { .. } => "SessionEnded",
            GroupSightEvent::GroupJoined { .. } => "GroupJoined",
            GroupSightEvent::GroupSignal { .. } => "GroupSignal",
            GroupSightEvent::SessionBroadcast { .. } => "SessionBroadcast",
            GroupSightEvent::ProgressUpdated { .. } => "ProgressUpdated",
            GroupSightEvent::SnapshotReleased { .. } => "SnapshotReleased",
            GroupSightEvent::BroadcastSettled { .. } => "BroadcastSettled",
        }
    }

    pub fn session_id(&self) -> Uuid {
        match self {
            GroupSightEvent::SessionCreated { session_id, .. }
            | GroupSightEvent::SessionEnded { session_id, .. }
            | GroupSightEvent::GroupJoined { session_id, .. }
            | GroupSightEvent::GroupSignal { session_id, .. }
            | GroupSightEvent::SessionBroadcast { session_id, .. }
            | GroupSightEvent::ProgressUpdated { session_id, .. }
            | GroupSightEvent::SnapshotReleased { session_id, .. }
            | GroupSightEvent::BroadcastSettled { session_id, .. } => *session_id,
        }
    }

    /// Group the event is addressed to, if it is group-scoped
    pub fn group_id(&self) -> Option<&str> {
        match self {
            GroupSightEvent::GroupJoined { group_id, .. }
            | GroupSightEvent::GroupSignal { group_id, .. }
            | GroupSightEvent::ProgressUpdated { group_id, .. }
            | GroupSightEvent::SnapshotReleased { group_id, .. } => Some(group_id),
            _ => None,
        }
    }

    /// Whether a group's own stream may carry this event
    ///
    /// Live progress stays with the session owner until it is released.
    pub fn visible_to_group(&self, session_id: Uuid, group_id: &str) -> bool {
        if self.session_id() != session_id {
            return false;
        }
        match self {
            GroupSightEvent::GroupSignal { group_id: g, .. }
            | GroupSightEvent::SnapshotReleased { group_id: g, .. } => g == group_id,
            GroupSightEvent::SessionBroadcast { .. } | GroupSightEvent::SessionEnded { .. } => true,
            _ => false,
        }
    }
}

/// Central event distribution bus
///
/// Thin wrapper around `tokio::sync::broadcast`. Cloning shares the channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<GroupSightEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before slow receivers lag
    ///
    /// # Examples
    ///
    /// ```
    /// use groupsight_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(1000);
    /// assert_eq!(event_bus.capacity(), 1000);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<GroupSightEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: GroupSightEvent,
    ) -> Result<usize, broadcast::error::SendError<GroupSightEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: GroupSightEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(session_id: Uuid, group_id: &str) -> GroupSightEvent {
        GroupSightEvent::GroupSignal {
            session_id,
            group_id: group_id.to_string(),
            event_name: "start_recording".to_string(),
            payload: serde_json::json!({}),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_eventbus_subscribe_counts() {
        let bus = EventBus::new(16);
        assert_eq!(bus.subscriber_count(), 0);
        let _rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_eventbus_emit_no_subscribers() {
        let bus = EventBus::new(16);
        assert!(bus.emit(signal(Uuid::new_v4(), "g1")).is_err());
        // Lossy emit never panics
        bus.emit_lossy(signal(Uuid::new_v4(), "g1"));
    }

    #[tokio::test]
    async fn test_eventbus_emit_with_subscriber() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let session_id = Uuid::new_v4();

        assert_eq!(bus.emit(signal(session_id, "g7")).unwrap(), 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type(), "GroupSignal");
        assert_eq!(received.session_id(), session_id);
        assert_eq!(received.group_id(), Some("g7"));
    }

    #[test]
    fn test_group_visibility() {
        let session_id = Uuid::new_v4();
        let event = signal(session_id, "g1");

        assert!(event.visible_to_group(session_id, "g1"));
        assert!(!event.visible_to_group(session_id, "g2"));
        assert!(!event.visible_to_group(Uuid::new_v4(), "g1"));

        let broadcast = GroupSightEvent::SessionBroadcast {
            session_id,
            event_name: "stop_recording".to_string(),
            payload: serde_json::Value::Null,
            timestamp: Utc::now(),
        };
        assert!(broadcast.visible_to_group(session_id, "anyone"));
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = GroupSightEvent::SessionEnded {
            session_id: Uuid::nil(),
            timestamp: Utc::now(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "SessionEnded");
    }
}
