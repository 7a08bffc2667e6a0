//! # GroupSight Common Library
//!
//! Shared code for the GroupSight live-assessment services including:
//! - Assessment data model (criteria, evidence, snapshots)
//! - Event types (GroupSightEvent enum) and the EventBus
//! - Bootstrap configuration loading
//! - Database bootstrap
//! - SSE and timestamp utilities

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod sse;
pub mod time;

pub use error::{Error, Result};
pub use models::{
    AssessmentRecord, Criterion, CriterionStatus, Evidence, GroupLiveState, PayloadEntry, RawMatch,
    ReleaseSnapshot, RubricItem, Session, SnapshotEntry,
};
