//! Progressive assessment state machine
//!
//! The single gate for status changes. Status only moves forward on
//! GREY < RED < GREEN, and GREEN is terminal. Every (current, proposed)
//! pair has a defined outcome; nothing here fails.

use chrono::{DateTime, Utc};
use groupsight_common::{AssessmentRecord, CriterionStatus, Evidence};
use tracing::debug;

/// Outcome of one proposed status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub accept: bool,
    /// Status after the transition (the current status when rejected)
    pub result: CriterionStatus,
}

impl Transition {
    fn accepted(result: CriterionStatus) -> Self {
        Self { accept: true, result }
    }

    fn rejected(current: CriterionStatus) -> Self {
        Self { accept: false, result: current }
    }
}

/// Decide whether `current` may move to `proposed`
pub fn transition(current: CriterionStatus, proposed: CriterionStatus) -> Transition {
    use CriterionStatus::*;

    match (current, proposed) {
        // Terminal
        (Green, _) => Transition::rejected(Green),
        (Grey, Red | Green) => Transition::accepted(proposed),
        // Already at the floor
        (Grey, Grey) => Transition::rejected(Grey),
        (Red, Green) => Transition::accepted(Green),
        // No regression, no redundant write
        (Red, Red | Grey) => Transition::rejected(Red),
    }
}

/// Apply proposed evidence to a record through the state machine
///
/// Returns the updated record when the transition is accepted, `None` when
/// the existing record must stay as it is.
pub fn apply(
    existing: &AssessmentRecord,
    proposed: &Evidence,
    at: DateTime<Utc>,
) -> Option<AssessmentRecord> {
    let outcome = transition(existing.status(), proposed.status());

    if !outcome.accept {
        if !proposed.is_grey() {
            debug!(
                criterion_index = existing.criterion_index,
                current = %existing.status(),
                proposed = %proposed.status(),
                "Transition rejected (no-op)"
            );
        }
        return None;
    }

    // An accepted transition never lands on GREY
    debug_assert!(outcome.result != CriterionStatus::Grey);
    debug_assert_eq!(outcome.result, proposed.status());

    Some(AssessmentRecord {
        criterion_index: existing.criterion_index,
        evidence: proposed.clone(),
        updated_at: at,
    })
}
