//! Live assessment service
//!
//! Entry point for every session, group and recording operation. Combines
//! the durable store, the session registry, the processing guard, the oracle
//! and the broadcast coordinator.

use chrono::Utc;
use groupsight_common::events::{EventBus, GroupSightEvent};
use groupsight_common::{
    Criterion, Error, GroupLiveState, PayloadEntry, ReleaseSnapshot, Result, Session,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::broadcast_coordinator::{BroadcastCoordinator, BroadcastStatus};
use super::oracle::Oracle;
use super::processing_guard::ProcessingGuard;
use super::reconciler::{criteria_to_evaluate, reconcile};
use super::session_registry::{SessionHandle, SessionRegistry};
use super::snapshot_builder::{build_snapshot, progress_snapshot, SnapshotSources};
use super::transport::{Transport, ASSESSMENT_RELEASED, SESSION_ENDED, START_RECORDING};
use crate::db;

/// Criterion as supplied when creating a session
#[derive(Debug, Clone, Deserialize)]
pub struct NewCriterion {
    pub description: String,
    #[serde(default)]
    pub rubric: String,
}

/// Result of one transcript round
#[derive(Debug, Clone)]
pub enum ProcessOutcome {
    Processed {
        accepted_count: usize,
        snapshot: ReleaseSnapshot,
    },
    /// Another round for the same group was still running
    Skipped,
}

#[derive(Clone)]
pub struct AssessmentService {
    db: SqlitePool,
    event_bus: EventBus,
    registry: Arc<SessionRegistry>,
    guard: ProcessingGuard,
    oracle: Arc<dyn Oracle>,
    transport: Arc<dyn Transport>,
    coordinator: BroadcastCoordinator,
}

impl AssessmentService {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        oracle: Arc<dyn Oracle>,
        transport: Arc<dyn Transport>,
        coordinator: BroadcastCoordinator,
    ) -> Self {
        Self {
            db,
            event_bus,
            registry: Arc::new(SessionRegistry::new()),
            guard: ProcessingGuard::new(),
            oracle,
            transport,
            coordinator,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn guard(&self) -> &ProcessingGuard {
        &self.guard
    }

    /// Create a session; `order_index` follows list position
    pub async fn create_session(
        &self,
        title: &str,
        context: &str,
        criteria: Vec<NewCriterion>,
    ) -> Result<(Session, Vec<Criterion>)> {
        if title.trim().is_empty() {
            return Err(Error::InvalidInput("title must not be empty".to_string()));
        }
        if let Some(position) = criteria.iter().position(|c| c.description.trim().is_empty()) {
            return Err(Error::InvalidInput(format!(
                "criterion {} has an empty description",
                position
            )));
        }

        let session = Session::new(title.trim(), context);
        let criteria: Vec<Criterion> = criteria
            .into_iter()
            .enumerate()
            .map(|(i, c)| Criterion::new(i as u32, c.description.trim(), c.rubric))
            .collect();

        db::sessions::create_session(&self.db, &session).await?;
        db::criteria::insert_criteria(&self.db, session.session_id, &criteria).await?;
        self.registry.get_or_create(session.session_id).await;

        info!(
            session_id = %session.session_id,
            criteria = criteria.len(),
            "Session created"
        );

        self.event_bus.emit_lossy(GroupSightEvent::SessionCreated {
            session_id: session.session_id,
            title: session.title.clone(),
            criteria_count: criteria.len(),
            timestamp: Utc::now(),
        });

        Ok((session, criteria))
    }

    /// Session with its criteria
    pub async fn get_session(&self, session_id: Uuid) -> Result<(Session, Vec<Criterion>)> {
        let session = self.require_session(session_id).await?;
        let criteria = db::criteria::get_criteria(&self.db, session_id).await?;
        Ok((session, criteria))
    }

    /// Run one evaluation round on a group's transcript
    ///
    /// Skipped when a round for the same group is already running. Oracle
    /// failures degrade to a no-op round.
    pub async fn process_transcript(
        &self,
        session_id: Uuid,
        group_id: &str,
        text: &str,
    ) -> Result<ProcessOutcome> {
        let session = self.require_active_session(session_id).await?;

        let Some(_permit) = self.guard.try_acquire(session_id, group_id) else {
            debug!(session_id = %session_id, group_id, "Round already running, skipping");
            return Ok(ProcessOutcome::Skipped);
        };

        let handle = self.handle(session_id).await;
        let criteria = db::criteria::get_criteria(&self.db, session_id).await?;
        let existing = db::progress::get_progress(&self.db, session_id, group_id).await?;

        let items = criteria_to_evaluate(&criteria, &existing);
        let raw_matches = if items.is_empty() {
            debug!(session_id = %session_id, group_id, "All criteria GREEN, oracle not called");
            Vec::new()
        } else if text.trim().is_empty() {
            debug!(session_id = %session_id, group_id, "Empty transcript, oracle not called");
            Vec::new()
        } else {
            match self.oracle.evaluate(text, &items, &session.context).await {
                Ok(matches) => matches,
                Err(e) => {
                    warn!(
                        session_id = %session_id,
                        group_id,
                        error = %e,
                        "Oracle evaluation failed, treating round as no matches"
                    );
                    Vec::new()
                }
            }
        };

        // Re-read after the oracle await; the store may have moved on
        let existing = db::progress::get_progress(&self.db, session_id, group_id).await?;
        let now = Utc::now();
        let reconciliation = reconcile(&raw_matches, &criteria, &existing, now);

        db::progress::upsert_progress_batch(&self.db, session_id, group_id, &reconciliation.accepted)
            .await?;

        let accepted_count = reconciliation.accepted_count();
        let snapshot = progress_snapshot(session_id, group_id, &criteria, &reconciliation.records, now);
        handle.cache_snapshot(snapshot.clone()).await;

        info!(
            session_id = %session_id,
            group_id,
            raw_matches = raw_matches.len(),
            accepted = accepted_count,
            "Transcript processed"
        );

        self.event_bus.emit_lossy(GroupSightEvent::ProgressUpdated {
            session_id,
            group_id: group_id.to_string(),
            accepted_count,
            snapshot: snapshot.clone(),
            timestamp: now,
        });

        Ok(ProcessOutcome::Processed {
            accepted_count,
            snapshot,
        })
    }

    /// Build and publish the authoritative snapshot for a group
    pub async fn release_to_group(
        &self,
        session_id: Uuid,
        group_id: &str,
        caller_payload: &[PayloadEntry],
    ) -> Result<ReleaseSnapshot> {
        let session = self.require_session(session_id).await?;

        // Ended sessions have no live state to consult or keep
        let handle = if session.is_ended() {
            None
        } else {
            Some(self.handle(session_id).await)
        };

        let criteria = db::criteria::get_criteria(&self.db, session_id).await?;
        let progress = db::progress::get_progress(&self.db, session_id, group_id).await?;
        let cached = match &handle {
            Some(handle) => handle.cached_snapshot(group_id).await,
            None => None,
        };

        let snapshot = build_snapshot(
            session_id,
            group_id,
            SnapshotSources {
                durable_criteria: &criteria,
                durable_progress: &progress,
                cached: cached.as_ref(),
                payload: caller_payload,
            },
            Utc::now(),
        );

        if let Some(handle) = &handle {
            handle.cache_snapshot(snapshot.clone()).await;
        }

        let payload = serde_json::to_value(&snapshot)
            .map_err(|e| Error::Internal(format!("Failed to serialize snapshot: {}", e)))?;
        self.transport
            .signal(session_id, group_id, ASSESSMENT_RELEASED, payload);

        info!(
            session_id = %session_id,
            group_id,
            entries = snapshot.entries.len(),
            "Snapshot released"
        );

        self.event_bus.emit_lossy(GroupSightEvent::SnapshotReleased {
            session_id,
            group_id: group_id.to_string(),
            snapshot: snapshot.clone(),
            timestamp: snapshot.generated_at,
        });

        Ok(snapshot)
    }

    /// Read-only view of a group's durable progress
    pub async fn current_progress(&self, session_id: Uuid, group_id: &str) -> Result<ReleaseSnapshot> {
        self.require_session(session_id).await?;
        let criteria = db::criteria::get_criteria(&self.db, session_id).await?;
        let progress = db::progress::get_progress(&self.db, session_id, group_id).await?;
        Ok(progress_snapshot(session_id, group_id, &criteria, &progress, Utc::now()))
    }

    /// Mark a group joined
    ///
    /// A group joining while recording is active is told to start at once.
    pub async fn join_group(&self, session_id: Uuid, group_id: &str) -> Result<GroupLiveState> {
        self.require_active_session(session_id).await?;
        let handle = self.handle(session_id).await;

        let first_join = handle.join_group(group_id).await;
        let recording_active = handle.recording_active().await;

        if first_join {
            info!(session_id = %session_id, group_id, "Group joined");
            self.event_bus.emit_lossy(GroupSightEvent::GroupJoined {
                session_id,
                group_id: group_id.to_string(),
                timestamp: Utc::now(),
            });
        }

        if recording_active {
            let state = handle.group_state(group_id).await.unwrap_or_default();
            if !state.recording {
                self.transport
                    .signal(session_id, group_id, START_RECORDING, serde_json::json!({}));
            }
        }

        Ok(handle.group_state(group_id).await.unwrap_or_default())
    }

    /// Group heartbeat; acknowledges recording while recording is active
    pub async fn heartbeat(&self, session_id: Uuid, group_id: &str) -> Result<GroupLiveState> {
        self.require_active_session(session_id).await?;
        let handle = self.handle(session_id).await;

        let mut state = handle.lock().await;
        if state.recording_active {
            if state.acknowledge(group_id) {
                debug!(session_id = %session_id, group_id, "Heartbeat acknowledged recording");
            }
        } else {
            state.group_mut(group_id).joined = true;
        }

        Ok(state.groups.get(group_id).cloned().unwrap_or_default())
    }

    /// Start the recording broadcast; returns the groups signalled
    pub async fn begin_recording(&self, session_id: Uuid) -> Result<Vec<String>> {
        self.require_active_session(session_id).await?;
        let handle = self.handle(session_id).await;
        Ok(self.coordinator.begin(&handle).await)
    }

    /// Explicit "recording started" from a group
    pub async fn ack_recording(&self, session_id: Uuid, group_id: &str) -> Result<bool> {
        self.require_active_session(session_id).await?;
        let handle = self.handle(session_id).await;
        Ok(self.coordinator.acknowledge(&handle, group_id).await)
    }

    pub async fn stop_recording(&self, session_id: Uuid) -> Result<()> {
        self.require_active_session(session_id).await?;
        let handle = self.handle(session_id).await;
        self.coordinator.stop(&handle).await;
        Ok(())
    }

    pub async fn broadcast_status(&self, session_id: Uuid) -> Result<BroadcastStatus> {
        self.require_session(session_id).await?;
        match self.registry.get(session_id).await {
            Some(handle) => Ok(handle.broadcast_status().await),
            None => Ok(BroadcastStatus::default()),
        }
    }

    /// End a session and discard its live state
    pub async fn end_session(&self, session_id: Uuid) -> Result<Session> {
        self.require_session(session_id).await?;

        let now = Utc::now();
        db::sessions::end_session(&self.db, session_id, now).await?;
        self.registry.remove(session_id).await;

        self.transport
            .broadcast(session_id, SESSION_ENDED, serde_json::json!({}));
        self.event_bus.emit_lossy(GroupSightEvent::SessionEnded {
            session_id,
            timestamp: now,
        });

        info!(session_id = %session_id, "Session ended");
        self.require_session(session_id).await
    }

    /// Whole-session cleanup: live state, progress, criteria and session
    pub async fn delete_session(&self, session_id: Uuid) -> Result<()> {
        self.registry.remove(session_id).await;
        if !db::sessions::delete_session(&self.db, session_id).await? {
            return Err(Error::session_not_found(session_id));
        }
        info!(session_id = %session_id, "Session deleted");
        Ok(())
    }

    /// Live state for a session, created on first reference
    async fn handle(&self, session_id: Uuid) -> Arc<SessionHandle> {
        self.registry.get_or_create(session_id).await
    }

    async fn require_session(&self, session_id: Uuid) -> Result<Session> {
        db::sessions::load_session(&self.db, session_id)
            .await?
            .ok_or_else(|| Error::session_not_found(session_id))
    }

    async fn require_active_session(&self, session_id: Uuid) -> Result<Session> {
        let session = self.require_session(session_id).await?;
        if session.is_ended() {
            return Err(Error::session_ended(session_id));
        }
        Ok(session)
    }
}
