//! # Core Types for the Ballot Engine
//!
//! Catalog entities ([`Election`], [`Position`], [`Candidate`]) are read-only
//! snapshots supplied by an external administrative process. [`Ballot`] is the
//! only record this crate creates, and it is never mutated after creation.
//!
//! ## Status
//!
//! An election's status is never stored. It is always derived from the voting
//! window through [`election_status`], so displayed and enforced status
//! cannot drift apart.
//!
//! ```rust
//! use ballot_engine::types::{election_status, ElectionStatus};
//! use chrono::{Duration, Utc};
//!
//! let now = Utc::now();
//! let status = election_status(now, now - Duration::hours(1), now + Duration::hours(1));
//! assert_eq!(status, ElectionStatus::Ongoing);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of an election in the catalog
pub type ElectionId = String;

/// Identifier of a position, unique across the catalog
pub type PositionId = String;

/// Identifier of a candidate, unique across the catalog
pub type CandidateId = String;

/// Verified voter identity supplied by the authentication collaborator
pub type VoterId = String;

/// Lifecycle status derived from the voting window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElectionStatus {
    /// Voting has not started
    Upcoming,
    /// Inside `[starts_at, ends_at)`
    Ongoing,
    /// Voting has closed
    Archived,
}

impl fmt::Display for ElectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElectionStatus::Upcoming => "upcoming",
            ElectionStatus::Ongoing => "ongoing",
            ElectionStatus::Archived => "archived",
        };
        f.write_str(name)
    }
}

/// The one status function. The window is half-open: `starts_at` is inside,
/// `ends_at` is not.
pub fn election_status(
    now: DateTime<Utc>,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
) -> ElectionStatus {
    if now < starts_at {
        ElectionStatus::Upcoming
    } else if now < ends_at {
        ElectionStatus::Ongoing
    } else {
        ElectionStatus::Archived
    }
}

/// How a position's ballots are marked and counted
///
/// A closed set: the selection rules and the tally both match on it
/// exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VotingMethod {
    /// Exactly one candidate
    Single,
    /// Approval-style choice of up to `max_selections` candidates
    Multiple { max_selections: usize },
    /// Up to `max_selections` candidates in preference order
    Ranked { max_selections: usize },
}

impl VotingMethod {
    /// Map the two-field encoding (`maxSelections`, `isRanked`) used by older
    /// catalog exports onto the tagged method.
    pub fn from_legacy(max_selections: usize, is_ranked: bool) -> Self {
        if is_ranked {
            VotingMethod::Ranked { max_selections }
        } else if max_selections == 1 {
            VotingMethod::Single
        } else {
            VotingMethod::Multiple { max_selections }
        }
    }

    /// Upper bound on the length of a selection
    pub fn max_selections(&self) -> usize {
        match self {
            VotingMethod::Single => 1,
            VotingMethod::Multiple { max_selections } | VotingMethod::Ranked { max_selections } => {
                *max_selections
            }
        }
    }

    /// Whether selection order encodes preference
    pub fn is_ranked(&self) -> bool {
        matches!(self, VotingMethod::Ranked { .. })
    }
}

/// A person (or option) standing for a position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Unique candidate identifier
    pub id: CandidateId,

    /// Display name
    pub name: String,

    /// Campaign statement shown next to the name
    #[serde(default)]
    pub manifesto: String,

    /// Portrait URL, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    /// Frozen vote total, present only once results have been finalised
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote_count: Option<u64>,
}

impl Candidate {
    /// Candidate without a recorded vote total
    pub fn new(id: impl Into<CandidateId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            manifesto: String::new(),
            image_url: None,
            vote_count: None,
        }
    }

    /// Attach a manifesto
    pub fn with_manifesto(mut self, manifesto: impl Into<String>) -> Self {
        self.manifesto = manifesto.into();
        self
    }

    /// Attach a frozen vote total (imported or finalised results)
    pub fn with_vote_count(mut self, votes: u64) -> Self {
        self.vote_count = Some(votes);
        self
    }
}

/// An office or question within an election
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub method: VotingMethod,
    /// Candidates in catalog order; this order breaks display ties
    pub candidates: Vec<Candidate>,
}

impl Position {
    pub fn new(
        id: impl Into<PositionId>,
        title: impl Into<String>,
        method: VotingMethod,
        candidates: Vec<Candidate>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            method,
            candidates,
        }
    }

    /// Look up a candidate standing for this position
    pub fn candidate(&self, candidate_id: &str) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id == candidate_id)
    }

    /// Whether `candidate_id` stands for this position
    pub fn has_candidate(&self, candidate_id: &str) -> bool {
        self.candidate(candidate_id).is_some()
    }

    /// Every candidate carries a frozen vote total
    pub fn has_frozen_counts(&self) -> bool {
        !self.candidates.is_empty() && self.candidates.iter().all(|c| c.vote_count.is_some())
    }
}

/// A time-boxed voting event made of independent positions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    pub id: ElectionId,
    pub title: String,
    #[serde(default)]
    pub description: String,

    /// Voting opens at this instant (inclusive)
    pub starts_at: DateTime<Utc>,

    /// Voting closes at this instant (exclusive)
    pub ends_at: DateTime<Utc>,

    /// Positions in display order
    pub positions: Vec<Position>,

    /// Size of the electorate, supplied by the registry; needed for turnout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eligible_voters: Option<u64>,

    /// Historic participation figure for imported archived elections
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_votes_cast: Option<u64>,
}

impl Election {
    /// Status at `now`, via [`election_status`]
    pub fn status(&self, now: DateTime<Utc>) -> ElectionStatus {
        election_status(now, self.starts_at, self.ends_at)
    }

    /// Whether ballots may be accepted at `now`
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.status(now) == ElectionStatus::Ongoing
    }

    /// Look up a position of this election
    pub fn position(&self, position_id: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.id == position_id)
    }

    /// Find which position a candidate stands for
    pub fn position_of_candidate(&self, candidate_id: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.has_candidate(candidate_id))
    }
}

/// Immutable record of one voter's accepted choice for one position
///
/// At most one exists per `(voter_id, position_id)`; the ballot store
/// enforces that, not the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    ballot_id: Uuid,
    voter_id: VoterId,
    election_id: ElectionId,
    position_id: PositionId,
    candidate_ids: Vec<CandidateId>,
    submitted_at: DateTime<Utc>,
    /// Hex keyed BLAKE3 digest over the fields above
    receipt: String,
}

impl Ballot {
    pub(crate) fn new(
        voter_id: VoterId,
        election_id: ElectionId,
        position_id: PositionId,
        candidate_ids: Vec<CandidateId>,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            ballot_id: Uuid::new_v4(),
            voter_id,
            election_id,
            position_id,
            candidate_ids,
            submitted_at,
            receipt: String::new(),
        }
    }

    pub(crate) fn with_receipt(mut self, receipt: String) -> Self {
        self.receipt = receipt;
        self
    }

    pub fn ballot_id(&self) -> Uuid {
        self.ballot_id
    }

    pub fn voter_id(&self) -> &str {
        &self.voter_id
    }

    pub fn election_id(&self) -> &str {
        &self.election_id
    }

    pub fn position_id(&self) -> &str {
        &self.position_id
    }

    /// Selected candidates; for ranked positions index 0 is the first preference
    pub fn candidate_ids(&self) -> &[CandidateId] {
        &self.candidate_ids
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    /// Voter-facing receipt digest (hex)
    pub fn receipt(&self) -> &str {
        &self.receipt
    }

    /// The first preference (or the only choice)
    pub fn first_choice(&self) -> Option<&str> {
        self.candidate_ids.first().map(String::as_str)
    }

    /// Whether the ballot selects `candidate_id` at any rank
    pub fn selects(&self, candidate_id: &str) -> bool {
        self.candidate_ids.iter().any(|c| c == candidate_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_election_status_window() {
        let start = Utc::now();
        let end = start + Duration::hours(2);

        assert_eq!(
            election_status(start - Duration::seconds(1), start, end),
            ElectionStatus::Upcoming
        );
        assert_eq!(election_status(start, start, end), ElectionStatus::Ongoing);
        assert_eq!(
            election_status(end - Duration::seconds(1), start, end),
            ElectionStatus::Ongoing
        );
        // End of the window is exclusive
        assert_eq!(election_status(end, start, end), ElectionStatus::Archived);
    }

    #[test]
    fn test_voting_method_from_legacy() {
        assert_eq!(VotingMethod::from_legacy(1, false), VotingMethod::Single);
        assert_eq!(
            VotingMethod::from_legacy(3, false),
            VotingMethod::Multiple { max_selections: 3 }
        );
        assert_eq!(
            VotingMethod::from_legacy(2, true),
            VotingMethod::Ranked { max_selections: 2 }
        );
        assert_eq!(VotingMethod::Single.max_selections(), 1);
        assert!(VotingMethod::Ranked { max_selections: 2 }.is_ranked());
    }

    #[test]
    fn test_voting_method_serde_shape() {
        let json = serde_json::to_string(&VotingMethod::Multiple { max_selections: 2 }).unwrap();
        assert_eq!(json, r#"{"kind":"multiple","max_selections":2}"#);

        let single: VotingMethod = serde_json::from_str(r#"{"kind":"single"}"#).unwrap();
        assert_eq!(single, VotingMethod::Single);
    }

    #[test]
    fn test_lookups() {
        let now = Utc::now();
        let election = Election {
            id: "1".to_string(),
            title: "Guild Elections".to_string(),
            description: String::new(),
            starts_at: now,
            ends_at: now + Duration::days(2),
            positions: vec![
                Position::new(
                    "pos1",
                    "Guild President",
                    VotingMethod::Single,
                    vec![Candidate::new("cand1", "A"), Candidate::new("cand2", "B")],
                ),
                Position::new(
                    "pos2",
                    "Academic Affairs Minister",
                    VotingMethod::Single,
                    vec![Candidate::new("cand3", "C")],
                ),
            ],
            eligible_voters: None,
            total_votes_cast: None,
        };

        assert!(election.is_open(now));
        assert_eq!(election.position("pos2").map(|p| p.title.as_str()), Some("Academic Affairs Minister"));
        assert_eq!(election.position_of_candidate("cand3").map(|p| p.id.as_str()), Some("pos2"));
        assert!(election.position_of_candidate("cand9").is_none());
        assert!(!election.positions[0].has_frozen_counts());
    }
}
