//! Shared fixtures for groupsight-live integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use groupsight_common::config::TomlConfig;
use groupsight_common::events::EventBus;
use groupsight_common::{CriterionStatus, RawMatch, RubricItem};
use groupsight_live::services::{Oracle, OracleError};
use groupsight_live::AppState;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Oracle replaying canned replies, one per call
///
/// Records the criterion indices it was asked about. Runs out of replies as
/// a failing oracle would.
#[derive(Default)]
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<Vec<RawMatch>>>,
    calls: Mutex<Vec<Vec<u32>>>,
}

impl ScriptedOracle {
    pub fn new(replies: Vec<Vec<RawMatch>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Criterion indices sent on each call so far
    pub fn calls(&self) -> Vec<Vec<u32>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn evaluate(
        &self,
        _transcript: &str,
        rubric_items: &[RubricItem],
        _context: &str,
    ) -> Result<Vec<RawMatch>, OracleError> {
        self.calls
            .lock()
            .unwrap()
            .push(rubric_items.iter().map(|i| i.criterion_index).collect());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| OracleError::Network("no scripted reply left".to_string()))
    }
}

pub fn red(index: i64, quote: &str) -> RawMatch {
    RawMatch::new(index, CriterionStatus::Red, Some(quote))
}

pub fn green(index: i64, quote: &str) -> RawMatch {
    RawMatch::new(index, CriterionStatus::Green, Some(quote))
}

/// Titration rubric used across tests
pub fn titration_criteria() -> serde_json::Value {
    serde_json::json!([
        {"description": "Choose an indicator", "rubric": "phenolphthalein chosen"},
        {"description": "Describe the endpoint", "rubric": "solution turns pale pink"},
        {"description": "Calculate the concentration", "rubric": "moles divided by volume"}
    ])
}

/// App state on a fresh on-disk database
///
/// Keep the returned TempDir alive for the duration of the test.
pub async fn test_app_state(oracle: Arc<dyn Oracle>) -> (AppState, TempDir) {
    let dir = TempDir::new().unwrap();
    let db = groupsight_live::db::init_database_pool(&dir.path().join("groupsight.db"))
        .await
        .unwrap();
    let state = AppState::new(db, EventBus::new(64), oracle, TomlConfig::default());
    (state, dir)
}
