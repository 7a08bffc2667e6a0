//! Per-group processing mutex
//!
//! A held-set keyed by (session, group). A round that finds its key held is
//! skipped, not queued. The key is released when the permit drops, so errors
//! and panics release it too.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

type GroupKey = (Uuid, String);

#[derive(Clone, Default)]
pub struct ProcessingGuard {
    held: Arc<Mutex<HashSet<GroupKey>>>,
}

/// Proof that this task owns the group's processing slot
pub struct ProcessingPermit {
    held: Arc<Mutex<HashSet<GroupKey>>>,
    key: GroupKey,
}

impl ProcessingGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for a group, or `None` if a round is already running
    pub fn try_acquire(&self, session_id: Uuid, group_id: &str) -> Option<ProcessingPermit> {
        let key = (session_id, group_id.to_string());
        let mut held = self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !held.insert(key.clone()) {
            return None;
        }
        Some(ProcessingPermit {
            held: Arc::clone(&self.held),
            key,
        })
    }

    pub fn is_held(&self, session_id: Uuid, group_id: &str) -> bool {
        let held = self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        held.contains(&(session_id, group_id.to_string()))
    }

    /// Number of rounds currently running
    pub fn held_count(&self) -> usize {
        self.held
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl Drop for ProcessingPermit {
    fn drop(&mut self) {
        let mut held = self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        held.remove(&self.key);
    }
}
