//! Per-session live state
//!
//! Owns everything about a session that lives only in memory: group
//! connection state, the start-recording broadcast and its retry task, and
//! the last snapshot emitted per group. Entries are created on first
//! reference and destroyed when the session ends. Each session's state sits
//! behind one async mutex.

use chrono::Utc;
use groupsight_common::{GroupLiveState, ReleaseSnapshot};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use super::broadcast_coordinator::BroadcastStatus;

/// Mutable live state of one session
#[derive(Debug, Default)]
pub struct SessionLiveState {
    /// Keyed by group id; ordered so signals go out deterministically
    pub groups: BTreeMap<String, GroupLiveState>,
    /// Recording has been started and not stopped
    pub recording_active: bool,
    pub broadcast: BroadcastStatus,
    /// Cancels the running broadcast retry task, if any
    pub broadcast_cancel: Option<CancellationToken>,
    /// Last snapshot emitted per group (processing or release)
    pub snapshot_cache: HashMap<String, ReleaseSnapshot>,
}

impl SessionLiveState {
    /// Get or create the live state of a group
    pub fn group_mut(&mut self, group_id: &str) -> &mut GroupLiveState {
        self.groups.entry(group_id.to_string()).or_default()
    }

    pub fn joined_groups(&self) -> Vec<String> {
        self.groups
            .iter()
            .filter(|(_, g)| g.joined)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Joined groups that have not acknowledged recording
    pub fn pending_groups(&self) -> Vec<String> {
        self.groups
            .iter()
            .filter(|(_, g)| g.joined && !g.recording)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Record a recording acknowledgement
    ///
    /// Returns true if the group was waiting for one.
    pub fn acknowledge(&mut self, group_id: &str) -> bool {
        let group = self.group_mut(group_id);
        let was_pending = group.joined && !group.recording;
        group.joined = true;
        group.recording = true;
        group.last_ack_at = Some(Utc::now());
        was_pending
    }

    /// Cancel the retry task, if one is running
    pub fn cancel_broadcast(&mut self) {
        if let Some(token) = self.broadcast_cancel.take() {
            token.cancel();
        }
    }
}

/// One registered session
#[derive(Debug)]
pub struct SessionHandle {
    session_id: Uuid,
    state: Mutex<SessionLiveState>,
}

impl SessionHandle {
    fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            state: Mutex::new(SessionLiveState::default()),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub async fn lock(&self) -> MutexGuard<'_, SessionLiveState> {
        self.state.lock().await
    }

    /// Mark a group joined
    ///
    /// Returns true if this is the group's first join.
    pub async fn join_group(&self, group_id: &str) -> bool {
        let mut state = self.lock().await;
        let group = state.group_mut(group_id);
        let first = !group.joined;
        group.joined = true;
        first
    }

    pub async fn group_state(&self, group_id: &str) -> Option<GroupLiveState> {
        self.lock().await.groups.get(group_id).cloned()
    }

    pub async fn cache_snapshot(&self, snapshot: ReleaseSnapshot) {
        let mut state = self.lock().await;
        state.snapshot_cache.insert(snapshot.group_id.clone(), snapshot);
    }

    pub async fn cached_snapshot(&self, group_id: &str) -> Option<ReleaseSnapshot> {
        self.lock().await.snapshot_cache.get(group_id).cloned()
    }

    pub async fn broadcast_status(&self) -> BroadcastStatus {
        self.lock().await.broadcast.clone()
    }

    pub async fn recording_active(&self) -> bool {
        self.lock().await.recording_active
    }
}

/// All sessions with live state in this process
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the live state of a session, creating it on first reference
    pub async fn get_or_create(&self, session_id: Uuid) -> Arc<SessionHandle> {
        if let Some(handle) = self.sessions.read().await.get(&session_id) {
            return Arc::clone(handle);
        }

        let mut sessions = self.sessions.write().await;
        Arc::clone(sessions.entry(session_id).or_insert_with(|| {
            debug!(session_id = %session_id, "Creating live session state");
            Arc::new(SessionHandle::new(session_id))
        }))
    }

    pub async fn get(&self, session_id: Uuid) -> Option<Arc<SessionHandle>> {
        self.sessions.read().await.get(&session_id).cloned()
    }

    /// Destroy a session's live state, cancelling its broadcast task
    pub async fn remove(&self, session_id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&session_id);
        match removed {
            Some(handle) => {
                let mut state = handle.lock().await;
                state.cancel_broadcast();
                state.recording_active = false;
                debug!(session_id = %session_id, "Live session state discarded");
                true
            }
            None => false,
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
