//! Start-recording broadcast coordinator
//!
//! Best-effort, at-least-once delivery of `start_recording` to every joined
//! group. Per session: `Idle -> Broadcasting -> Settled`.
//!
//! On begin, every joined group is reset to not-recording and signalled. A
//! cancellable task then ticks every retry interval: an empty pending set
//! settles the broadcast; otherwise the pending groups (and only those) are
//! re-signalled while an acknowledgement could still arrive before the
//! deadline. The deadline settles the broadcast whatever is still pending.
//! Starting a new broadcast, stopping recording or ending the session cancels
//! the running task.

use chrono::{DateTime, Utc};
use groupsight_common::events::{EventBus, GroupSightEvent};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::session_registry::SessionHandle;
use super::transport::{Transport, START_RECORDING, STOP_RECORDING};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum BroadcastPhase {
    #[default]
    Idle,
    Broadcasting,
    Settled,
}

/// Observable state of a session's broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastStatus {
    pub phase: BroadcastPhase,
    pub started_at: Option<DateTime<Utc>>,
    pub settled_at: Option<DateTime<Utc>>,
    /// Time from begin to settlement
    #[serde(skip)]
    pub settled_after: Option<Duration>,
    /// Re-signals sent after the initial fan-out
    pub resignal_count: u32,
    pub acknowledged: Vec<String>,
    pub unacknowledged: Vec<String>,
}

#[derive(Clone)]
pub struct BroadcastCoordinator {
    transport: Arc<dyn Transport>,
    event_bus: EventBus,
    retry_interval: Duration,
    deadline: Duration,
}

impl BroadcastCoordinator {
    pub fn new(
        transport: Arc<dyn Transport>,
        event_bus: EventBus,
        retry_interval: Duration,
        deadline: Duration,
    ) -> Self {
        Self {
            transport,
            event_bus,
            retry_interval,
            deadline,
        }
    }

    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Start (or restart) the broadcast for a session
    ///
    /// Never fails and never waits for acknowledgements. Returns the groups
    /// signalled in the initial fan-out.
    pub async fn begin(&self, session: &Arc<SessionHandle>) -> Vec<String> {
        let session_id = session.session_id();
        let cancel = CancellationToken::new();

        let joined = {
            let mut state = session.lock().await;
            state.cancel_broadcast();

            state.recording_active = true;
            for group in state.groups.values_mut().filter(|g| g.joined) {
                group.recording = false;
            }

            state.broadcast = BroadcastStatus {
                phase: BroadcastPhase::Broadcasting,
                started_at: Some(Utc::now()),
                ..Default::default()
            };
            state.broadcast_cancel = Some(cancel.clone());

            let joined = state.joined_groups();
            for group_id in &joined {
                self.transport
                    .signal(session_id, group_id, START_RECORDING, json!({}));
            }
            joined
        };

        info!(
            session_id = %session_id,
            groups = joined.len(),
            "Start-recording broadcast begun"
        );

        let coordinator = self.clone();
        let session = Arc::clone(session);
        tokio::spawn(async move {
            coordinator.run_retry_loop(session, cancel).await;
        });

        joined
    }

    /// Acknowledge that a group started recording
    ///
    /// Returns true if the group was still pending.
    pub async fn acknowledge(&self, session: &SessionHandle, group_id: &str) -> bool {
        let was_pending = session.lock().await.acknowledge(group_id);
        if was_pending {
            debug!(session_id = %session.session_id(), group_id, "Recording acknowledged");
        }
        was_pending
    }

    /// Stop recording: cancel any retry task and tell every group
    pub async fn stop(&self, session: &SessionHandle) {
        let session_id = session.session_id();
        {
            let mut state = session.lock().await;
            state.cancel_broadcast();
            state.recording_active = false;
            for group in state.groups.values_mut() {
                group.recording = false;
            }
            if state.broadcast.phase == BroadcastPhase::Broadcasting {
                state.broadcast.phase = BroadcastPhase::Idle;
            }
        }

        self.transport.broadcast(session_id, STOP_RECORDING, json!({}));
        info!(session_id = %session_id, "Recording stopped");
    }

    async fn run_retry_loop(&self, session: Arc<SessionHandle>, cancel: CancellationToken) {
        let session_id = session.session_id();
        let start = Instant::now();

        let mut ticker = interval_at(start + self.retry_interval, self.retry_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let deadline = sleep_until(start + self.deadline);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!(session_id = %session_id, "Broadcast retry task cancelled");
                    return;
                }

                _ = &mut deadline => {
                    self.settle(&session, &cancel, start).await;
                    return;
                }

                _ = ticker.tick() => {
                    let mut state = session.lock().await;
                    if cancel.is_cancelled() {
                        return;
                    }

                    let pending = state.pending_groups();
                    if pending.is_empty() {
                        drop(state);
                        self.settle(&session, &cancel, start).await;
                        return;
                    }

                    // Only re-signal if an ack could still land before the deadline
                    if start.elapsed() + self.retry_interval <= self.deadline {
                        for group_id in &pending {
                            self.transport.signal(session_id, group_id, START_RECORDING, json!({}));
                        }
                        state.broadcast.resignal_count += 1;
                        debug!(
                            session_id = %session_id,
                            pending = pending.len(),
                            "Re-signalled pending groups"
                        );
                    }
                }
            }
        }
    }

    async fn settle(&self, session: &SessionHandle, cancel: &CancellationToken, start: Instant) {
        let session_id = session.session_id();
        let mut state = session.lock().await;
        if cancel.is_cancelled() {
            return;
        }

        let acknowledged: Vec<String> = state
            .groups
            .iter()
            .filter(|(_, g)| g.joined && g.recording)
            .map(|(id, _)| id.clone())
            .collect();
        let unacknowledged = state.pending_groups();

        for group_id in &unacknowledged {
            warn!(
                session_id = %session_id,
                group_id = %group_id,
                "Group never acknowledged start_recording before deadline"
            );
        }

        let settled_at = Utc::now();
        state.broadcast.phase = BroadcastPhase::Settled;
        state.broadcast.settled_at = Some(settled_at);
        state.broadcast.settled_after = Some(start.elapsed());
        state.broadcast.acknowledged = acknowledged.clone();
        state.broadcast.unacknowledged = unacknowledged.clone();
        state.broadcast_cancel = None;

        info!(
            session_id = %session_id,
            acknowledged = acknowledged.len(),
            unacknowledged = unacknowledged.len(),
            "Start-recording broadcast settled"
        );

        self.event_bus.emit_lossy(GroupSightEvent::BroadcastSettled {
            session_id,
            acknowledged,
            unacknowledged,
            timestamp: settled_at,
        });
    }
}
