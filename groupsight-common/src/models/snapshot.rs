//! Point-in-time views of a group's assessment

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CriterionStatus, Evidence};

/// One criterion's line in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub criterion_index: u32,
    pub description: String,
    pub rubric: String,
    #[serde(flatten)]
    pub evidence: Evidence,
}

impl SnapshotEntry {
    pub fn status(&self) -> CriterionStatus {
        self.evidence.status()
    }
}

/// Complete, ordered view of every criterion for one group
///
/// The only assessment structure exposed outside the session owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseSnapshot {
    pub session_id: Uuid,
    pub group_id: String,
    pub entries: Vec<SnapshotEntry>,
    pub released: bool,
    pub generated_at: DateTime<Utc>,
}

impl ReleaseSnapshot {
    pub fn entry(&self, criterion_index: u32) -> Option<&SnapshotEntry> {
        self.entries
            .iter()
            .find(|e| e.criterion_index == criterion_index)
    }
}

/// Client-held view of one criterion, supplied when releasing
///
/// Optimistic client state: description and rubric may be omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadEntry {
    pub criterion_index: u32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rubric: Option<String>,
    #[serde(flatten)]
    pub evidence: Evidence,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_entry_tolerates_missing_fields() {
        let entry: PayloadEntry = serde_json::from_value(json!({
            "criterion_index": 1,
            "status": "RED"
        }))
        .unwrap();

        assert_eq!(entry.criterion_index, 1);
        assert!(entry.description.is_none());
        // RED without a quote is not valid evidence
        assert_eq!(entry.evidence, Evidence::Grey);
    }

    #[test]
    fn test_snapshot_entry_lookup() {
        let snapshot = ReleaseSnapshot {
            session_id: Uuid::new_v4(),
            group_id: "g1".to_string(),
            entries: vec![SnapshotEntry {
                criterion_index: 4,
                description: "Names indicator".to_string(),
                rubric: "Mentions phenolphthalein".to_string(),
                evidence: Evidence::Grey,
            }],
            released: false,
            generated_at: Utc::now(),
        };

        assert!(snapshot.entry(4).is_some());
        assert!(snapshot.entry(0).is_none());
    }
}
