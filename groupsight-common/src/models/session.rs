//! Classroom sessions and ephemeral group state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A live classroom session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: Uuid,
    pub title: String,
    /// Activity context forwarded to the oracle with every transcript
    pub context: String,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(title: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            title: title.into(),
            context: context.into(),
            created_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.ended_at.is_some()
    }
}

/// In-memory connection state of one group
///
/// Bound to process uptime; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupLiveState {
    pub joined: bool,
    pub recording: bool,
    pub last_ack_at: Option<DateTime<Utc>>,
}
