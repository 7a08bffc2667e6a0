//! Release snapshot builder
//!
//! Merges three possibly-inconsistent sources into one authoritative view of
//! a group's progress: the durable store, the caller's optimistic payload and
//! the last snapshot this process emitted. Pure function of its inputs.

use chrono::{DateTime, Utc};
use groupsight_common::{
    AssessmentRecord, Criterion, Evidence, PayloadEntry, ReleaseSnapshot, SnapshotEntry,
};
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

/// Sources feeding one snapshot
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotSources<'a> {
    pub durable_criteria: &'a [Criterion],
    pub durable_progress: &'a [AssessmentRecord],
    pub cached: Option<&'a ReleaseSnapshot>,
    pub payload: &'a [PayloadEntry],
}

/// Whether `other` should replace `current`
///
/// A GREEN `other` always wins, including over another GREEN; a GREY current
/// value is treated as stale when the other source knows more. A GREY
/// `other` never overwrites anything.
pub fn prefer_other(current: &Evidence, other: &Evidence) -> bool {
    !other.is_grey() && (other.status().is_terminal() || current.is_grey())
}

/// Build the released snapshot for one group
pub fn build_snapshot(
    session_id: Uuid,
    group_id: &str,
    sources: SnapshotSources<'_>,
    at: DateTime<Utc>,
) -> ReleaseSnapshot {
    let progress: HashMap<u32, &Evidence> = sources
        .durable_progress
        .iter()
        .map(|r| (r.criterion_index, &r.evidence))
        .collect();

    let mut payload: HashMap<u32, &PayloadEntry> = HashMap::new();
    for entry in sources.payload {
        payload.entry(entry.criterion_index).or_insert(entry);
    }

    let cached: HashMap<u32, &SnapshotEntry> = sources
        .cached
        .map(|snapshot| {
            snapshot
                .entries
                .iter()
                .map(|e| (e.criterion_index, e))
                .collect()
        })
        .unwrap_or_default();

    let merge = |index: u32, start: Evidence| -> Evidence {
        let mut evidence = start;
        if let Some(entry) = payload.get(&index) {
            if prefer_other(&evidence, &entry.evidence) {
                evidence = entry.evidence.clone();
            }
        }
        if let Some(entry) = cached.get(&index) {
            if prefer_other(&evidence, &entry.evidence) {
                evidence = entry.evidence.clone();
            }
        }
        evidence
    };

    let mut entries: Vec<SnapshotEntry> = if !sources.durable_criteria.is_empty() {
        sources
            .durable_criteria
            .iter()
            .map(|criterion| {
                let index = criterion.order_index;
                let durable = progress.get(&index).map(|e| (*e).clone()).unwrap_or_default();
                SnapshotEntry {
                    criterion_index: index,
                    description: criterion.description.clone(),
                    rubric: criterion.rubric.clone(),
                    evidence: merge(index, durable),
                }
            })
            .collect()
    } else if !sources.payload.is_empty() {
        info!(
            group_id,
            entries = sources.payload.len(),
            "No durable criteria yet, rebuilding snapshot from caller payload"
        );
        sources
            .payload
            .iter()
            .map(|entry| {
                let index = entry.criterion_index;
                let cached_entry = cached.get(&index);
                let durable = progress.get(&index).map(|e| (*e).clone()).unwrap_or_default();
                SnapshotEntry {
                    criterion_index: index,
                    description: entry
                        .description
                        .clone()
                        .or_else(|| cached_entry.map(|c| c.description.clone()))
                        .unwrap_or_default(),
                    rubric: entry
                        .rubric
                        .clone()
                        .or_else(|| cached_entry.map(|c| c.rubric.clone()))
                        .unwrap_or_default(),
                    evidence: merge(index, durable),
                }
            })
            .collect()
    } else if let Some(snapshot) = sources.cached {
        debug!(group_id, "No durable or caller data, reusing cached snapshot");
        snapshot.entries.clone()
    } else {
        debug!(group_id, "No sources at all, emitting empty snapshot");
        Vec::new()
    };

    entries.sort_by_key(|e| e.criterion_index);

    ReleaseSnapshot {
        session_id,
        group_id: group_id.to_string(),
        entries,
        released: true,
        generated_at: at,
    }
}

/// Live (unreleased) view of a group's progress from durable data only
pub fn progress_snapshot(
    session_id: Uuid,
    group_id: &str,
    criteria: &[Criterion],
    records: &[AssessmentRecord],
    at: DateTime<Utc>,
) -> ReleaseSnapshot {
    let progress: HashMap<u32, &Evidence> =
        records.iter().map(|r| (r.criterion_index, &r.evidence)).collect();

    let mut entries: Vec<SnapshotEntry> = criteria
        .iter()
        .map(|c| SnapshotEntry {
            criterion_index: c.order_index,
            description: c.description.clone(),
            rubric: c.rubric.clone(),
            evidence: progress.get(&c.order_index).map(|e| (*e).clone()).unwrap_or_default(),
        })
        .collect();
    entries.sort_by_key(|e| e.criterion_index);

    ReleaseSnapshot {
        session_id,
        group_id: group_id.to_string(),
        entries,
        released: false,
        generated_at: at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use groupsight_common::CriterionStatus;

    fn criteria() -> Vec<Criterion> {
        vec![
            Criterion::new(1, "Indicator", "Names an indicator"),
            Criterion::new(0, "Method", "Describes titration"),
            Criterion::new(2, "Result", "States the concentration"),
        ]
    }

    fn red(q: &str) -> Evidence {
        Evidence::Red { quote: q.to_string() }
    }

    fn green(q: &str) -> Evidence {
        Evidence::Green { quote: q.to_string() }
    }

    fn record(index: u32, evidence: Evidence) -> AssessmentRecord {
        AssessmentRecord { criterion_index: index, evidence, updated_at: Utc::now() }
    }

    fn payload(index: u32, evidence: Evidence) -> PayloadEntry {
        PayloadEntry { criterion_index: index, description: None, rubric: None, evidence }
    }

    fn snapshot_with(entries: Vec<(u32, Evidence)>) -> ReleaseSnapshot {
        ReleaseSnapshot {
            session_id: Uuid::nil(),
            group_id: "g1".to_string(),
            entries: entries
                .into_iter()
                .map(|(i, evidence)| SnapshotEntry {
                    criterion_index: i,
                    description: format!("cached {}", i),
                    rubric: String::new(),
                    evidence,
                })
                .collect(),
            released: false,
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_prefer_other_rules() {
        assert!(prefer_other(&Evidence::Grey, &red("x")));
        assert!(prefer_other(&red("x"), &green("y")));
        assert!(!prefer_other(&red("x"), &red("y")));
        assert!(!prefer_other(&red("x"), &Evidence::Grey));
        assert!(prefer_other(&green("x"), &green("y")));
        assert!(!prefer_other(&green("x"), &red("y")));
    }

    #[test]
    fn test_durable_only_sorted_and_released() {
        let criteria = criteria();
        let progress = vec![record(1, red("methyl orange"))];
        let snapshot = build_snapshot(
            Uuid::nil(),
            "g1",
            SnapshotSources { durable_criteria: &criteria, durable_progress: &progress, ..Default::default() },
            Utc::now(),
        );

        assert!(snapshot.released);
        let order: Vec<u32> = snapshot.entries.iter().map(|e| e.criterion_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(snapshot.entry(1).unwrap().evidence, red("methyl orange"));
        assert_eq!(snapshot.entry(0).unwrap().description, "Method");
        assert_eq!(snapshot.entry(2).unwrap().status(), CriterionStatus::Grey);
    }

    #[test]
    fn test_caller_grey_never_overwrites_durable() {
        let criteria = criteria();
        let progress = vec![record(0, red("partial"))];
        let payload = vec![payload(0, Evidence::Grey)];

        let snapshot = build_snapshot(
            Uuid::nil(),
            "g1",
            SnapshotSources {
                durable_criteria: &criteria,
                durable_progress: &progress,
                payload: &payload,
                ..Default::default()
            },
            Utc::now(),
        );

        assert_eq!(snapshot.entry(0).unwrap().evidence, red("partial"));
    }

    #[test]
    fn test_caller_green_and_cache_fill_gaps() {
        let criteria = criteria();
        let progress = vec![record(0, red("partial"))];
        let payload = vec![payload(0, green("complete method"))];
        let cached = snapshot_with(vec![(2, red("about 0.1 molar"))]);

        let snapshot = build_snapshot(
            Uuid::nil(),
            "g1",
            SnapshotSources {
                durable_criteria: &criteria,
                durable_progress: &progress,
                cached: Some(&cached),
                payload: &payload,
            },
            Utc::now(),
        );

        assert_eq!(snapshot.entry(0).unwrap().evidence, green("complete method"));
        assert_eq!(snapshot.entry(1).unwrap().evidence, Evidence::Grey);
        assert_eq!(snapshot.entry(2).unwrap().evidence, red("about 0.1 molar"));
    }

    #[test]
    fn test_later_green_source_supplies_quote() {
        let criteria = criteria();
        let progress = vec![record(0, green("durable quote"))];
        let payload = vec![payload(0, green("caller quote"))];
        let cached = snapshot_with(vec![(0, green("cached quote")), (1, red("partial"))]);

        let sources = SnapshotSources {
            durable_criteria: &criteria,
            durable_progress: &progress,
            cached: None,
            payload: &payload,
        };
        let snapshot = build_snapshot(Uuid::nil(), "g1", sources, Utc::now());
        assert_eq!(snapshot.entry(0).unwrap().evidence, green("caller quote"));

        // Cache is consulted after the caller payload
        let snapshot = build_snapshot(
            Uuid::nil(),
            "g1",
            SnapshotSources { cached: Some(&cached), ..sources },
            Utc::now(),
        );
        assert_eq!(snapshot.entry(0).unwrap().evidence, green("cached quote"));
        assert_eq!(snapshot.entry(1).unwrap().evidence, red("partial"));
    }

    #[test]
    fn test_fallback_to_payload_when_no_criteria() {
        let payload = vec![
            PayloadEntry {
                criterion_index: 3,
                description: Some("Safety".to_string()),
                rubric: Some("Mentions goggles".to_string()),
                evidence: red("we wore goggles"),
            },
            payload(1, Evidence::Grey),
        ];

        let snapshot = build_snapshot(
            Uuid::nil(),
            "g1",
            SnapshotSources { payload: &payload, ..Default::default() },
            Utc::now(),
        );

        assert_eq!(snapshot.entries.len(), payload.len());
        assert_eq!(snapshot.entries[0].criterion_index, 1);
        assert_eq!(snapshot.entries[1].description, "Safety");
        assert_eq!(snapshot.entries[1].evidence, red("we wore goggles"));
    }

    #[test]
    fn test_fallback_to_cache_verbatim() {
        let cached = snapshot_with(vec![(1, green("done")), (0, red("partial"))]);
        let at = Utc::now();

        let snapshot = build_snapshot(
            Uuid::nil(),
            "g1",
            SnapshotSources { cached: Some(&cached), ..Default::default() },
            at,
        );

        assert!(snapshot.released);
        assert_eq!(snapshot.generated_at, at);
        assert_eq!(snapshot.entries.len(), 2);
        assert_eq!(snapshot.entries[0].evidence, red("partial"));
        assert_eq!(snapshot.entries[1].description, "cached 1");
    }

    #[test]
    fn test_no_sources_is_empty_snapshot() {
        let snapshot = build_snapshot(Uuid::nil(), "g1", SnapshotSources::default(), Utc::now());
        assert!(snapshot.entries.is_empty());
        assert!(snapshot.released);
    }

    #[test]
    fn test_progress_snapshot_unreleased() {
        let criteria = criteria();
        let snapshot = progress_snapshot(Uuid::nil(), "g1", &criteria, &[], Utc::now());
        assert!(!snapshot.released);
        assert_eq!(snapshot.entries.len(), 3);
        assert!(snapshot.entries.iter().all(|e| e.evidence.is_grey()));
    }
}
