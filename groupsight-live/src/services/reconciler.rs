//! Reconciliation of raw oracle output into accepted transitions
//!
//! The oracle is re-run on a growing transcript every round. It may repeat
//! criteria that are already GREEN, give one quote to two criteria, or file a
//! quote under a weaker-matching criterion. Reconciliation resolves all three
//! and then gates every surviving proposal through the state machine.
//!
//! Rerouting rule: a quote moves to another criterion when that criterion's
//! overlap score is at least the assigned criterion's score plus
//! [`REROUTE_MARGIN`]. Only criteria still under evaluation are candidates.

use chrono::{DateTime, Utc};
use groupsight_common::{AssessmentRecord, Criterion, CriterionStatus, Evidence, RawMatch, RubricItem};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

use super::progression;
use super::text_normalizer::{overlap_score, token_set};

/// Token margin by which another criterion must out-score the assigned one
pub const REROUTE_MARGIN: usize = 2;

/// Result of one reconciliation round
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    /// One record per criterion, in `order_index` order
    pub records: Vec<AssessmentRecord>,
    /// Records whose transition was accepted this round
    pub accepted: Vec<AssessmentRecord>,
}

impl Reconciliation {
    pub fn accepted_count(&self) -> usize {
        self.accepted.len()
    }
}

/// A validated proposal for one criterion
#[derive(Debug, Clone, PartialEq)]
struct Proposal {
    criterion_index: u32,
    evidence: Evidence,
}

/// Rubric items still worth sending to the oracle (everything not GREEN)
pub fn criteria_to_evaluate(criteria: &[Criterion], existing: &[AssessmentRecord]) -> Vec<RubricItem> {
    let green: HashSet<u32> = existing
        .iter()
        .filter(|r| r.status().is_terminal())
        .map(|r| r.criterion_index)
        .collect();

    let mut items: Vec<RubricItem> = criteria
        .iter()
        .filter(|c| !green.contains(&c.order_index))
        .map(Criterion::rubric_item)
        .collect();
    items.sort_by_key(|item| item.criterion_index);
    items
}

/// Turn raw oracle matches into a complete, gated set of records
///
/// An empty `raw_matches` (oracle failure) is a no-op round: every criterion
/// keeps its existing status.
pub fn reconcile(
    raw_matches: &[RawMatch],
    criteria: &[Criterion],
    existing: &[AssessmentRecord],
    at: DateTime<Utc>,
) -> Reconciliation {
    let mut ordered: Vec<&Criterion> = criteria.iter().collect();
    ordered.sort_by_key(|c| c.order_index);

    let existing_by_index: HashMap<u32, &AssessmentRecord> =
        existing.iter().map(|r| (r.criterion_index, r)).collect();

    // Pre-filter
    let to_evaluate: Vec<&Criterion> = ordered
        .iter()
        .copied()
        .filter(|c| {
            !existing_by_index
                .get(&c.order_index)
                .is_some_and(|r| r.status().is_terminal())
        })
        .collect();
    let evaluable: HashSet<u32> = to_evaluate.iter().map(|c| c.order_index).collect();

    let proposals: Vec<Proposal> = raw_matches
        .iter()
        .filter_map(|raw| validate(raw, &evaluable))
        .collect();

    // Quotes already attributed in the store stay with their criterion
    let stored_claims: HashMap<String, u32> = existing
        .iter()
        .filter_map(|r| r.quote().map(|q| (q.trim().to_string(), r.criterion_index)))
        .collect();

    let proposals = dedup_quotes(proposals, &stored_claims);
    let proposals = reroute(proposals, &to_evaluate);
    let proposals = dedup_quotes(proposals, &stored_claims);
    let chosen = resolve_collisions(proposals);

    // Gate through the state machine
    let mut records = Vec::with_capacity(ordered.len());
    let mut accepted = Vec::new();

    for criterion in ordered {
        let current = existing_by_index
            .get(&criterion.order_index)
            .map(|r| (*r).clone())
            .unwrap_or_else(|| AssessmentRecord::grey(criterion.order_index, at));

        let next = chosen
            .get(&criterion.order_index)
            .and_then(|proposal| progression::apply(&current, &proposal.evidence, at));

        match next {
            Some(updated) => {
                accepted.push(updated.clone());
                records.push(updated);
            }
            None => records.push(current),
        }
    }

    Reconciliation { records, accepted }
}

/// Structural validation of one raw match
fn validate(raw: &RawMatch, evaluable: &HashSet<u32>) -> Option<Proposal> {
    let Some(criterion_index) = u32::try_from(raw.criterion_index)
        .ok()
        .filter(|idx| evaluable.contains(idx))
    else {
        debug!(
            criterion_index = raw.criterion_index,
            "Dropping match: index not under evaluation"
        );
        return None;
    };

    let quote = raw
        .quote
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string);

    let evidence = match (raw.status, quote) {
        (CriterionStatus::Grey, _) => Evidence::Grey,
        (CriterionStatus::Red, Some(quote)) => Evidence::Red { quote },
        (CriterionStatus::Green, Some(quote)) => Evidence::Green { quote },
        (status, None) => {
            debug!(criterion_index, %status, "Dropping match: missing quote");
            return None;
        }
    };

    Some(Proposal { criterion_index, evidence })
}

/// First claimant of a quote keeps it; later claimants drop to GREY
///
/// `stored_claims` maps quotes already persisted to their criterion; those
/// claims come first, so only the stored owner may reuse such a quote.
fn dedup_quotes(proposals: Vec<Proposal>, stored_claims: &HashMap<String, u32>) -> Vec<Proposal> {
    let mut claims = stored_claims.clone();

    proposals
        .into_iter()
        .map(|proposal| {
            let Some(quote) = proposal.evidence.quote() else {
                return proposal;
            };
            let owner = *claims
                .entry(quote.trim().to_string())
                .or_insert(proposal.criterion_index);
            if owner == proposal.criterion_index {
                proposal
            } else {
                debug!(
                    criterion_index = proposal.criterion_index,
                    "Duplicate quote attribution, downgrading to GREY"
                );
                Proposal {
                    criterion_index: proposal.criterion_index,
                    evidence: Evidence::Grey,
                }
            }
        })
        .collect()
}

/// Move quotes to a clearly better-fitting criterion
fn reroute(proposals: Vec<Proposal>, to_evaluate: &[&Criterion]) -> Vec<Proposal> {
    let targets: Vec<(u32, HashSet<String>)> = to_evaluate
        .iter()
        .map(|c| (c.order_index, token_set(&format!("{} {}", c.description, c.rubric))))
        .collect();

    proposals
        .into_iter()
        .map(|proposal| {
            let Some(quote) = proposal.evidence.quote() else {
                return proposal;
            };
            let quote_tokens = token_set(quote);

            let assigned_score = targets
                .iter()
                .find(|(idx, _)| *idx == proposal.criterion_index)
                .map(|(_, tokens)| overlap_score(&quote_tokens, tokens))
                .unwrap_or(0);

            // Highest score wins; ties keep the lowest order_index
            let best_other = targets
                .iter()
                .filter(|(idx, _)| *idx != proposal.criterion_index)
                .map(|(idx, tokens)| (*idx, overlap_score(&quote_tokens, tokens)))
                .fold(None::<(u32, usize)>, |best, (idx, score)| match best {
                    Some((_, best_score)) if best_score >= score => best,
                    _ => Some((idx, score)),
                });

            match best_other {
                Some((target, score)) if score >= assigned_score + REROUTE_MARGIN => {
                    debug!(
                        from = proposal.criterion_index,
                        to = target,
                        assigned_score,
                        best_score = score,
                        "Rerouting quote to better-matching criterion"
                    );
                    Proposal {
                        criterion_index: target,
                        evidence: proposal.evidence,
                    }
                }
                _ => proposal,
            }
        })
        .collect()
}

/// One proposal per criterion: strongest status, then first seen
fn resolve_collisions(proposals: Vec<Proposal>) -> BTreeMap<u32, Proposal> {
    let mut chosen: BTreeMap<u32, Proposal> = BTreeMap::new();

    for proposal in proposals {
        match chosen.get(&proposal.criterion_index) {
            Some(current) if current.evidence.status() >= proposal.evidence.status() => {}
            _ => {
                chosen.insert(proposal.criterion_index, proposal);
            }
        }
    }

    chosen
}
