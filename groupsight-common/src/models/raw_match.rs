//! Oracle output before reconciliation

use serde::{Deserialize, Serialize};

use super::CriterionStatus;

/// One evidence judgement returned by the oracle
///
/// Untrusted: the index may be out of range and the quote may be missing.
/// Never persisted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMatch {
    #[serde(alias = "index", alias = "criterionIndex")]
    pub criterion_index: i64,
    #[serde(default)]
    pub quote: Option<String>,
    pub status: CriterionStatus,
    #[serde(default, alias = "reason")]
    pub rationale: Option<String>,
}

impl RawMatch {
    pub fn new(criterion_index: i64, status: CriterionStatus, quote: Option<&str>) -> Self {
        Self {
            criterion_index,
            quote: quote.map(str::to_string),
            status,
            rationale: None,
        }
    }
}
