//! Tally engine
//!
//! A tally is a pure function of a position and a ballot set. It is
//! recomputed on demand and never stored; the ballot set stays the single
//! source of truth.
//!
//! Counting rules:
//! - `single` and `multiple`: every ballot adds one unit of weight to each
//!   candidate it selects (approval counting, no split weighting).
//! - `ranked`: only the first preference carries weight. There is no
//!   elimination round.
//!
//! Ties for the top weight are reported as a tied winner set.

pub mod results;

use crate::crypto::CryptoUtils;
use crate::types::{Ballot, CandidateId, Position, PositionId, VotingMethod};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub use results::{ElectionResults, PositionResults, Standing, Turnout};

/// Where a tally's weights came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TallySource {
    /// Counted from stored ballots
    Ballots,
    /// Read from frozen catalog vote counts
    Frozen,
}

/// One candidate's line in a tally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateTally {
    pub candidate_id: CandidateId,
    pub weight: u64,
    /// Percentage of the position's total weight (0 when nothing was counted)
    pub share: f64,
}

/// Aggregated outcome for one position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TallyResult {
    pub position_id: PositionId,
    pub method: VotingMethod,
    pub source: TallySource,
    /// Descending weight; ties keep catalog order
    pub entries: Vec<CandidateTally>,
    /// Every candidate holding the top weight; empty if nothing was counted
    pub winners: Vec<CandidateId>,
    pub ballots_counted: u64,
    /// Hex BLAKE3 over the sorted receipts of the counted ballots
    pub ballot_digest: Option<String>,
}

impl TallyResult {
    /// Weight recorded for a candidate
    pub fn weight_of(&self, candidate_id: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|e| e.candidate_id == candidate_id)
            .map(|e| e.weight)
    }

    /// Whether more than one candidate shares the top weight
    pub fn is_tied(&self) -> bool {
        self.winners.len() > 1
    }

    pub fn total_weight(&self) -> u64 {
        self.entries.iter().map(|e| e.weight).sum()
    }

    /// Tally built from the catalog's frozen `vote_count`s
    ///
    /// Returns `None` unless every candidate of the position carries one.
    /// Frozen counts do not say how many ballots were cast for approval
    /// positions, so `total_votes_cast` (or else the top weight) stands in.
    pub fn from_frozen(position: &Position, total_votes_cast: Option<u64>) -> Option<Self> {
        if !position.has_frozen_counts() {
            return None;
        }

        let weights: Vec<u64> = position
            .candidates
            .iter()
            .map(|c| c.vote_count.unwrap_or(0))
            .collect();
        let ballots_counted = match position.method {
            VotingMethod::Single | VotingMethod::Ranked { .. } => weights.iter().sum(),
            VotingMethod::Multiple { .. } => total_votes_cast
                .unwrap_or_else(|| weights.iter().copied().max().unwrap_or(0)),
        };

        Some(assemble(
            position,
            &weights,
            ballots_counted,
            TallySource::Frozen,
            None,
        ))
    }
}

/// Count the ballots cast for `position`
///
/// Ballots for other positions are ignored, so a whole-election snapshot may
/// be passed in.
pub fn tally(position: &Position, ballots: &[Ballot]) -> TallyResult {
    let slots: HashMap<&str, usize> = position
        .candidates
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id.as_str(), i))
        .collect();
    let mut weights = vec![0u64; position.candidates.len()];
    let mut receipts = Vec::new();

    for ballot in ballots.iter().filter(|b| b.position_id() == position.id) {
        receipts.push(ballot.receipt());

        let counted: &[CandidateId] = match position.method {
            VotingMethod::Single | VotingMethod::Multiple { .. } => ballot.candidate_ids(),
            VotingMethod::Ranked { .. } => ballot
                .candidate_ids()
                .first()
                .map(std::slice::from_ref)
                .unwrap_or_default(),
        };

        for candidate_id in counted {
            match slots.get(candidate_id.as_str()) {
                Some(&slot) => weights[slot] += 1,
                None => tracing::warn!(
                    "Ballot {} names candidate {} not standing for position {}",
                    ballot.ballot_id(),
                    candidate_id,
                    position.id
                ),
            }
        }
    }

    let ballots_counted = receipts.len() as u64;
    let digest = ballot_set_digest(receipts);

    assemble(
        position,
        &weights,
        ballots_counted,
        TallySource::Ballots,
        Some(digest),
    )
}

/// Participation rate in `[0, 1]`; `None` when the electorate size is zero or unknown
pub fn turnout(ballots_cast: u64, eligible_voters: Option<u64>) -> Option<f64> {
    match eligible_voters {
        Some(eligible) if eligible > 0 => Some(ballots_cast as f64 / eligible as f64),
        _ => None,
    }
}

/// Distinct voters holding at least one ballot in `election_id`
pub fn participating_voters(ballots: &[Ballot], election_id: &str) -> u64 {
    ballots
        .iter()
        .filter(|b| b.election_id() == election_id)
        .map(Ballot::voter_id)
        .collect::<HashSet<_>>()
        .len() as u64
}

fn assemble(
    position: &Position,
    weights: &[u64],
    ballots_counted: u64,
    source: TallySource,
    ballot_digest: Option<String>,
) -> TallyResult {
    let total: u64 = weights.iter().sum();

    let mut order: Vec<usize> = (0..weights.len()).collect();
    // Stable: equal weights keep catalog order
    order.sort_by(|&a, &b| weights[b].cmp(&weights[a]));

    let entries: Vec<CandidateTally> = order
        .into_iter()
        .map(|i| CandidateTally {
            candidate_id: position.candidates[i].id.clone(),
            weight: weights[i],
            share: if total == 0 {
                0.0
            } else {
                weights[i] as f64 * 100.0 / total as f64
            },
        })
        .collect();

    let top = entries.first().map(|e| e.weight).unwrap_or(0);
    let winners = if ballots_counted == 0 || top == 0 {
        Vec::new()
    } else {
        entries
            .iter()
            .take_while(|e| e.weight == top)
            .map(|e| e.candidate_id.clone())
            .collect()
    };

    TallyResult {
        position_id: position.id.clone(),
        method: position.method,
        source,
        entries,
        winners,
        ballots_counted,
        ballot_digest,
    }
}

fn ballot_set_digest(mut receipts: Vec<&str>) -> String {
    receipts.sort_unstable();
    let mut canonical = Vec::with_capacity(receipts.len() * 72);
    for receipt in receipts {
        canonical.extend_from_slice(&(receipt.len() as u64).to_le_bytes());
        canonical.extend_from_slice(receipt.as_bytes());
    }
    CryptoUtils::hash_to_hex(&CryptoUtils::hash(&canonical))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Candidate;
    use chrono::Utc;

    fn position(method: VotingMethod, candidates: &[&str]) -> Position {
        Position::new(
            "pos",
            "Representative",
            method,
            candidates.iter().map(|c| Candidate::new(*c, *c)).collect(),
        )
    }

    fn ballot(voter: usize, position_id: &str, choices: &[&str]) -> Ballot {
        let b = Ballot::new(
            format!("voter-{voter}"),
            "e1".to_string(),
            position_id.to_string(),
            choices.iter().map(|c| c.to_string()).collect(),
            Utc::now(),
        );
        let receipt = format!("{:064x}", voter);
        b.with_receipt(receipt)
    }

    #[test]
    fn test_single_ordering_and_winner() {
        let pos = position(VotingMethod::Single, &["A", "B"]);
        let mut ballots: Vec<Ballot> = (0..2000).map(|i| ballot(i, "pos", &["A"])).collect();
        ballots.extend((2000..3750).map(|i| ballot(i, "pos", &["B"])));

        let result = tally(&pos, &ballots);
        let lines: Vec<(&str, u64)> = result
            .entries
            .iter()
            .map(|e| (e.candidate_id.as_str(), e.weight))
            .collect();
        assert_eq!(lines, vec![("A", 2000), ("B", 1750)]);
        assert_eq!(result.winners, vec!["A".to_string()]);
        assert_eq!(result.ballots_counted, 3750);
        assert!(!result.is_tied());
    }

    #[test]
    fn test_multiple_tie_is_reported() {
        let pos = position(VotingMethod::Multiple { max_selections: 2 }, &["A", "B", "C"]);
        let ballots: Vec<Ballot> = (0..3).map(|i| ballot(i, "pos", &["A", "B"])).collect();

        let result = tally(&pos, &ballots);
        assert_eq!(result.weight_of("A"), Some(3));
        assert_eq!(result.weight_of("B"), Some(3));
        assert_eq!(result.weight_of("C"), Some(0));
        assert_eq!(result.winners, vec!["A".to_string(), "B".to_string()]);
        assert!(result.is_tied());
        assert_eq!(result.ballots_counted, 3);
    }

    #[test]
    fn test_ranked_counts_first_preference_only() {
        let pos = position(VotingMethod::Ranked { max_selections: 2 }, &["A", "B", "C"]);
        let ballots = vec![
            ballot(1, "pos", &["B", "A"]),
            ballot(2, "pos", &["C", "A"]),
            ballot(3, "pos", &["B"]),
        ];

        let result = tally(&pos, &ballots);
        assert_eq!(result.weight_of("A"), Some(0));
        assert_eq!(result.weight_of("B"), Some(2));
        assert_eq!(result.weight_of("C"), Some(1));
        assert_eq!(result.winners, vec!["B".to_string()]);
        assert_eq!(result.total_weight(), 3);
    }

    #[test]
    fn test_ties_keep_catalog_order() {
        let pos = position(VotingMethod::Single, &["C", "A", "B"]);
        let ballots = vec![
            ballot(1, "pos", &["B"]),
            ballot(2, "pos", &["A"]),
            ballot(3, "pos", &["C"]),
            ballot(4, "pos", &["B"]),
        ];
        let order: Vec<_> = tally(&pos, &ballots)
            .entries
            .into_iter()
            .map(|e| e.candidate_id)
            .collect();
        assert_eq!(order, vec!["B", "C", "A"]);
    }

    #[test]
    fn test_tally_is_deterministic() {
        let pos = position(VotingMethod::Multiple { max_selections: 2 }, &["A", "B", "C"]);
        let ballots = vec![
            ballot(1, "pos", &["A", "C"]),
            ballot(2, "pos", &["C"]),
            ballot(3, "pos", &["B", "A"]),
            ballot(4, "other", &["A"]),
        ];
        let first = tally(&pos, &ballots);
        let second = tally(&pos, &ballots);
        assert_eq!(first, second);

        // Ballot order does not change the outcome or the digest
        let mut reversed = ballots.clone();
        reversed.reverse();
        assert_eq!(tally(&pos, &reversed), first);
        assert_eq!(first.ballots_counted, 3);
    }

    #[test]
    fn test_empty_ballot_set() {
        let pos = position(VotingMethod::Single, &["A", "B"]);
        let result = tally(&pos, &[]);
        assert_eq!(result.ballots_counted, 0);
        assert!(result.winners.is_empty());
        assert!(result.entries.iter().all(|e| e.weight == 0 && e.share == 0.0));
        assert!(result.ballot_digest.is_some());
    }

    #[test]
    fn test_frozen_counts() {
        let mut pos = position(VotingMethod::Single, &["cand10", "cand11"]);
        assert!(TallyResult::from_frozen(&pos, None).is_none());

        pos.candidates[0].vote_count = Some(1750);
        pos.candidates[1].vote_count = Some(2000);
        let result = TallyResult::from_frozen(&pos, Some(3750)).unwrap();
        assert_eq!(result.source, TallySource::Frozen);
        assert_eq!(result.entries[0].candidate_id, "cand11");
        assert_eq!(result.winners, vec!["cand11".to_string()]);
        assert_eq!(result.ballots_counted, 3750);
        assert!(result.ballot_digest.is_none());
    }

    #[test]
    fn test_turnout_guards_zero() {
        assert_eq!(turnout(3750, Some(5000)), Some(0.75));
        assert_eq!(turnout(10, Some(0)), None);
        assert_eq!(turnout(10, None), None);
    }

    #[test]
    fn test_participating_voters_are_distinct() {
        let ballots = vec![
            ballot(1, "pos1", &["A"]),
            ballot(1, "pos2", &["C"]),
            ballot(2, "pos1", &["B"]),
        ];
        assert_eq!(participating_voters(&ballots, "e1"), 2);
        assert_eq!(participating_voters(&ballots, "e2"), 0);
    }
}
