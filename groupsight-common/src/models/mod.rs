//! Assessment data model shared by every GroupSight component
//!
//! `order_index` on a [`Criterion`] is the canonical identity of a rubric item.
//! Every `criterion_index` field elsewhere in this module refers to it.

mod assessment;
mod criterion;
mod raw_match;
mod session;
mod snapshot;

pub use assessment::{AssessmentRecord, CriterionStatus, Evidence};
pub use criterion::{Criterion, RubricItem};
pub use raw_match::RawMatch;
pub use session::{GroupLiveState, Session};
pub use snapshot::{PayloadEntry, ReleaseSnapshot, SnapshotEntry};
