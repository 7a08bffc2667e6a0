//! Assessment service integration tests
//!
//! Full rounds through the durable store with a scripted oracle.

mod helpers;

use groupsight_common::events::GroupSightEvent;
use groupsight_common::{CriterionStatus, Evidence, PayloadEntry};
use groupsight_live::services::{AssessmentService, NewCriterion, ProcessOutcome};
use helpers::{green, red, test_app_state, ScriptedOracle};
use uuid::Uuid;

fn criteria() -> Vec<NewCriterion> {
    serde_json::from_value(helpers::titration_criteria()).unwrap()
}

async fn processed(
    service: &AssessmentService,
    session_id: Uuid,
    group_id: &str,
    text: &str,
) -> (usize, groupsight_common::ReleaseSnapshot) {
    match service
        .process_transcript(session_id, group_id, text)
        .await
        .unwrap()
    {
        ProcessOutcome::Processed {
            accepted_count,
            snapshot,
        } => (accepted_count, snapshot),
        ProcessOutcome::Skipped => panic!("round unexpectedly skipped"),
    }
}

#[tokio::test]
async fn test_rounds_progress_monotonically() {
    let oracle = ScriptedOracle::new(vec![
        vec![red(0, "we could use some indicator")],
        vec![
            green(0, "phenolphthalein is our indicator"),
            red(1, "it goes pink"),
        ],
        // Regressions and repeats of GREEN criteria are ignored
        vec![red(1, "it goes pink"), red(0, "maybe litmus instead")],
    ]);
    let (state, _dir) = test_app_state(oracle.clone()).await;
    let service = &state.service;

    let (session, _) = service
        .create_session("Titration lab", "Year 10 chemistry", criteria())
        .await
        .unwrap();
    let sid = session.session_id;

    let (accepted, snapshot) = processed(service, sid, "g1", "round one").await;
    assert_eq!(accepted, 1);
    assert_eq!(snapshot.entries.len(), 3);
    assert_eq!(snapshot.entries[0].status(), CriterionStatus::Red);
    assert!(!snapshot.released);

    let (accepted, snapshot) = processed(service, sid, "g1", "round two").await;
    assert_eq!(accepted, 2);
    assert_eq!(
        snapshot.entries[0].evidence,
        Evidence::Green {
            quote: "phenolphthalein is our indicator".to_string()
        }
    );
    assert_eq!(snapshot.entries[1].status(), CriterionStatus::Red);

    let (accepted, snapshot) = processed(service, sid, "g1", "round three").await;
    assert_eq!(accepted, 0);
    assert_eq!(snapshot.entries[0].status(), CriterionStatus::Green);
    assert_eq!(snapshot.entries[1].status(), CriterionStatus::Red);
    assert_eq!(snapshot.entries[2].status(), CriterionStatus::Grey);

    // GREEN criteria are no longer sent to the oracle
    assert_eq!(oracle.calls(), vec![vec![0, 1, 2], vec![0, 1, 2], vec![1, 2]]);

    let durable = service.current_progress(sid, "g1").await.unwrap();
    assert_eq!(durable.entries, snapshot.entries);
}

#[tokio::test]
async fn test_groups_are_isolated() {
    let oracle = ScriptedOracle::new(vec![vec![green(0, "phenolphthalein is our indicator")]]);
    let (state, _dir) = test_app_state(oracle).await;
    let service = &state.service;

    let (session, _) = service.create_session("Lab", "", criteria()).await.unwrap();
    let sid = session.session_id;

    processed(service, sid, "g1", "transcript").await;

    let other = service.current_progress(sid, "g2").await.unwrap();
    assert!(other.entries.iter().all(|e| e.status() == CriterionStatus::Grey));
}

#[tokio::test]
async fn test_misfiled_quote_is_rerouted() {
    // Quote filed under "concentration" clearly belongs to "indicator"
    let oracle = ScriptedOracle::new(vec![vec![green(2, "phenolphthalein indicator chosen")]]);
    let (state, _dir) = test_app_state(oracle).await;
    let service = &state.service;

    let (session, _) = service.create_session("Lab", "", criteria()).await.unwrap();
    let (accepted, snapshot) = processed(service, session.session_id, "g1", "text").await;

    assert_eq!(accepted, 1);
    assert_eq!(snapshot.entries[0].status(), CriterionStatus::Green);
    assert_eq!(snapshot.entries[2].status(), CriterionStatus::Grey);
}

#[tokio::test]
async fn test_oracle_failure_is_a_noop_round() {
    // No scripted replies: every call fails
    let oracle = ScriptedOracle::new(vec![]);
    let (state, _dir) = test_app_state(oracle.clone()).await;
    let service = &state.service;

    let (session, _) = service.create_session("Lab", "", criteria()).await.unwrap();
    let (accepted, snapshot) = processed(service, session.session_id, "g1", "text").await;

    assert_eq!(accepted, 0);
    assert!(snapshot.entries.iter().all(|e| e.evidence.is_grey()));
    assert_eq!(oracle.calls().len(), 1);
}

#[tokio::test]
async fn test_blank_transcript_skips_oracle() {
    let oracle = ScriptedOracle::new(vec![]);
    let (state, _dir) = test_app_state(oracle.clone()).await;
    let service = &state.service;

    let (session, _) = service.create_session("Lab", "", criteria()).await.unwrap();
    let (accepted, _) = processed(service, session.session_id, "g1", "   ").await;

    assert_eq!(accepted, 0);
    assert!(oracle.calls().is_empty());
}

#[tokio::test]
async fn test_concurrent_round_is_skipped() {
    let oracle = ScriptedOracle::new(vec![]);
    let (state, _dir) = test_app_state(oracle.clone()).await;
    let service = &state.service;

    let (session, _) = service.create_session("Lab", "", criteria()).await.unwrap();
    let sid = session.session_id;

    let permit = service.guard().try_acquire(sid, "g1").unwrap();
    let outcome = service.process_transcript(sid, "g1", "text").await.unwrap();
    assert!(matches!(outcome, ProcessOutcome::Skipped));
    assert!(oracle.calls().is_empty());

    // Other groups are unaffected
    let outcome = service.process_transcript(sid, "g2", "text").await.unwrap();
    assert!(matches!(outcome, ProcessOutcome::Processed { .. }));

    drop(permit);
    assert!(!service.guard().is_held(sid, "g1"));
}

#[tokio::test]
async fn test_release_signals_group() {
    let oracle = ScriptedOracle::new(vec![vec![red(1, "it goes pink")]]);
    let (state, _dir) = test_app_state(oracle).await;
    let service = &state.service;
    let mut rx = state.event_bus.subscribe();

    let (session, _) = service.create_session("Lab", "", criteria()).await.unwrap();
    let sid = session.session_id;
    processed(service, sid, "g1", "text").await;

    let snapshot = service.release_to_group(sid, "g1", &[]).await.unwrap();
    assert!(snapshot.released);
    assert_eq!(snapshot.entries.len(), 3);
    assert_eq!(snapshot.entries[1].status(), CriterionStatus::Red);

    let mut saw_signal = false;
    let mut saw_release = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            GroupSightEvent::GroupSignal {
                group_id,
                event_name,
                ..
            } if event_name == "assessment_released" => {
                assert_eq!(group_id, "g1");
                saw_signal = true;
            }
            GroupSightEvent::SnapshotReleased { snapshot: s, .. } => {
                assert_eq!(s, snapshot);
                saw_release = true;
            }
            _ => {}
        }
    }
    assert!(saw_signal && saw_release);
}

#[tokio::test]
async fn test_release_keeps_stronger_durable_evidence() {
    let oracle = ScriptedOracle::new(vec![vec![green(0, "phenolphthalein is our indicator")]]);
    let (state, _dir) = test_app_state(oracle).await;
    let service = &state.service;

    let (session, _) = service.create_session("Lab", "", criteria()).await.unwrap();
    let sid = session.session_id;
    processed(service, sid, "g1", "text").await;

    // Stale client view: criterion 0 still RED, criterion 2 newly RED
    let payload: Vec<PayloadEntry> = serde_json::from_value(serde_json::json!([
        {"criterion_index": 0, "status": "RED", "quote": "old quote"},
        {"criterion_index": 2, "status": "RED", "quote": "divide by the volume"}
    ]))
    .unwrap();

    let snapshot = service.release_to_group(sid, "g1", &payload).await.unwrap();
    assert_eq!(snapshot.entries[0].status(), CriterionStatus::Green);
    assert_eq!(snapshot.entries[2].status(), CriterionStatus::Red);
}

#[tokio::test]
async fn test_ended_session_rejects_rounds_but_releases() {
    let oracle = ScriptedOracle::new(vec![vec![red(1, "it goes pink")]]);
    let (state, _dir) = test_app_state(oracle).await;
    let service = &state.service;

    let (session, _) = service.create_session("Lab", "", criteria()).await.unwrap();
    let sid = session.session_id;
    processed(service, sid, "g1", "text").await;

    let ended = service.end_session(sid).await.unwrap();
    assert!(ended.is_ended());
    assert!(service.registry().get(sid).await.is_none());

    let err = service.process_transcript(sid, "g1", "more").await.unwrap_err();
    assert!(matches!(err, groupsight_common::Error::InvalidInput(_)));

    // Durable progress survives the end of live state
    let snapshot = service.release_to_group(sid, "g1", &[]).await.unwrap();
    assert_eq!(snapshot.entries[1].status(), CriterionStatus::Red);
    assert!(service.registry().get(sid).await.is_none());
}

#[tokio::test]
async fn test_delete_session_removes_everything() {
    let oracle = ScriptedOracle::new(vec![vec![red(1, "it goes pink")]]);
    let (state, _dir) = test_app_state(oracle).await;
    let service = &state.service;

    let (session, _) = service.create_session("Lab", "", criteria()).await.unwrap();
    let sid = session.session_id;
    processed(service, sid, "g1", "text").await;

    service.delete_session(sid).await.unwrap();

    assert!(matches!(
        service.get_session(sid).await.unwrap_err(),
        groupsight_common::Error::NotFound(_)
    ));
    assert!(matches!(
        service.delete_session(sid).await.unwrap_err(),
        groupsight_common::Error::NotFound(_)
    ));
}

#[tokio::test]
async fn test_create_session_validation() {
    let (state, _dir) = test_app_state(ScriptedOracle::new(vec![])).await;
    let service = &state.service;

    assert!(service.create_session("  ", "", criteria()).await.is_err());

    let bad = vec![NewCriterion {
        description: " ".to_string(),
        rubric: String::new(),
    }];
    assert!(service.create_session("Lab", "", bad).await.is_err());

    let (_, created) = service.create_session("Lab", "", criteria()).await.unwrap();
    let order: Vec<u32> = created.iter().map(|c| c.order_index).collect();
    assert_eq!(order, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_late_joiner_gets_start_recording() {
    let (state, _dir) = test_app_state(ScriptedOracle::new(vec![])).await;
    let service = &state.service;

    let (session, _) = service.create_session("Lab", "", criteria()).await.unwrap();
    let sid = session.session_id;

    service.join_group(sid, "g1").await.unwrap();
    let signalled = service.begin_recording(sid).await.unwrap();
    assert_eq!(signalled, vec!["g1".to_string()]);

    let mut rx = state.event_bus.subscribe();
    service.join_group(sid, "g2").await.unwrap();

    let mut started = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let GroupSightEvent::GroupSignal {
            group_id,
            event_name,
            ..
        } = event
        {
            if event_name == "start_recording" {
                started.push(group_id);
            }
        }
    }
    assert_eq!(started, vec!["g2".to_string()]);

    // Heartbeat during recording counts as an acknowledgement
    let live = service.heartbeat(sid, "g2").await.unwrap();
    assert!(live.recording);

    service.stop_recording(sid).await.unwrap();
}
