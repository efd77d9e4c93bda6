//! Ballot submission guard
//!
//! Turns a selection into an immutable [`Ballot`] at most once per
//! `(voter, position)`. The time window is re-checked here on every call;
//! whatever status a client displayed is never trusted.

use crate::ballot::store::{BallotStore, InsertOutcome};
use crate::crypto::ReceiptIssuer;
use crate::errors::{EntityKind, SelectionViolation};
use crate::types::{Ballot, CandidateId, Election, Position};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;

/// Check a candidate list against a position's method and candidate set
pub fn validate_selection(
    election: &Election,
    position: &Position,
    candidate_ids: &[CandidateId],
) -> std::result::Result<(), SelectionViolation> {
    if candidate_ids.is_empty() {
        return Err(SelectionViolation::Empty);
    }

    let max = position.method.max_selections();
    if candidate_ids.len() > max {
        return Err(SelectionViolation::TooMany {
            max,
            got: candidate_ids.len(),
        });
    }

    let mut seen = HashSet::with_capacity(candidate_ids.len());
    for candidate_id in candidate_ids {
        if !seen.insert(candidate_id.as_str()) {
            return Err(SelectionViolation::DuplicateCandidate {
                candidate_id: candidate_id.clone(),
            });
        }
        if position.has_candidate(candidate_id) {
            continue;
        }
        return Err(match election.position_of_candidate(candidate_id) {
            Some(other) => SelectionViolation::WrongPosition {
                candidate_id: candidate_id.clone(),
                position_id: other.id.clone(),
            },
            None => SelectionViolation::UnknownCandidate {
                candidate_id: candidate_id.clone(),
            },
        });
    }

    Ok(())
}

/// Enforces at-most-one accepted ballot per voter and position
#[derive(Clone)]
pub struct SubmissionGuard {
    store: Arc<dyn BallotStore>,
    receipts: ReceiptIssuer,
}

impl SubmissionGuard {
    pub fn new(store: Arc<dyn BallotStore>, receipts: ReceiptIssuer) -> Self {
        Self { store, receipts }
    }

    /// Guard over a fresh in-memory store
    pub fn for_testing() -> Self {
        Self::new(
            Arc::new(crate::ballot::InMemoryBallotStore::new()),
            ReceiptIssuer::for_testing(),
        )
    }

    /// Validate and record a ballot
    ///
    /// Fails with `ElectionNotOpen` outside the window, `NotFound` for an
    /// unknown position, `Invalid` for a malformed selection and
    /// `AlreadyVoted` (carrying the stored ballot's timestamp) on a duplicate.
    pub fn submit(
        &self,
        voter_id: &str,
        election: &Election,
        position_id: &str,
        candidate_ids: &[CandidateId],
        now: DateTime<Utc>,
    ) -> Result<Ballot> {
        let status = election.status(now);
        if !election.is_open(now) {
            tracing::warn!(
                "⛔ Submission outside voting window: voter={}, election={}, status={}",
                short_id(voter_id),
                election.id,
                status
            );
            return Err(Error::ElectionNotOpen {
                election_id: election.id.clone(),
                status,
            });
        }

        let position = election
            .position(position_id)
            .ok_or_else(|| Error::not_found(EntityKind::Position, position_id))?;

        if let Err(violation) = validate_selection(election, position, candidate_ids) {
            tracing::debug!(
                "Rejected selection: voter={}, position={}, reason={}",
                short_id(voter_id),
                position.id,
                violation
            );
            return Err(Error::invalid(violation));
        }

        let ballot = Ballot::new(
            voter_id.to_string(),
            election.id.clone(),
            position.id.clone(),
            candidate_ids.to_vec(),
            now,
        );
        let receipt = self.receipts.issue(&ballot);
        let ballot = ballot.with_receipt(receipt);

        match self.store.insert_if_absent(ballot)? {
            InsertOutcome::Inserted(ballot) => {
                tracing::info!(
                    "🗳️ Ballot accepted: voter={}, election={}, position={}, receipt={}",
                    short_id(voter_id),
                    ballot.election_id(),
                    ballot.position_id(),
                    &ballot.receipt()[..8]
                );
                Ok(ballot)
            }
            InsertOutcome::Existing(existing) => {
                tracing::info!(
                    "🚫 Duplicate submission: voter={}, position={}, first submitted at {}",
                    short_id(voter_id),
                    existing.position_id(),
                    existing.submitted_at()
                );
                Err(Error::AlreadyVoted {
                    voter_id: voter_id.to_string(),
                    position_id: existing.position_id().to_string(),
                    submitted_at: existing.submitted_at(),
                })
            }
        }
    }

    /// Whether a ballot exists for the pair
    pub fn has_voted(&self, voter_id: &str, position_id: &str) -> Result<bool> {
        Ok(self.store.find(voter_id, position_id)?.is_some())
    }

    pub fn store(&self) -> &Arc<dyn BallotStore> {
        &self.store
    }

    pub fn receipts(&self) -> &ReceiptIssuer {
        &self.receipts
    }
}

/// Voter ids are truncated in log lines
pub(crate) fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Candidate, VotingMethod};
    use chrono::Duration;

    fn election(now: DateTime<Utc>) -> Election {
        Election {
            id: "2".to_string(),
            title: "Faculty Representatives Election".to_string(),
            description: String::new(),
            starts_at: now - Duration::days(1),
            ends_at: now + Duration::days(8),
            positions: vec![
                Position::new(
                    "pos3",
                    "Science Faculty Representative",
                    VotingMethod::Single,
                    vec![
                        Candidate::new("cand5", "Bukenya Sarah"),
                        Candidate::new("cand6", "David Lee"),
                    ],
                ),
                Position::new(
                    "pos4",
                    "Business Faculty Representative",
                    VotingMethod::Ranked { max_selections: 2 },
                    vec![
                        Candidate::new("cand7", "Mugerwa Joseph"),
                        Candidate::new("cand8", "Frank Wilson"),
                        Candidate::new("cand9", "Grace Taylor"),
                    ],
                ),
            ],
            eligible_voters: None,
            total_votes_cast: None,
        }
    }

    fn ids(list: &[&str]) -> Vec<CandidateId> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_validate_selection_violations() {
        let e = election(Utc::now());
        let pos4 = &e.positions[1];

        assert_eq!(validate_selection(&e, pos4, &[]), Err(SelectionViolation::Empty));
        assert_eq!(
            validate_selection(&e, pos4, &ids(&["cand7", "cand8", "cand9"])),
            Err(SelectionViolation::TooMany { max: 2, got: 3 })
        );
        assert_eq!(
            validate_selection(&e, pos4, &ids(&["cand7", "cand7"])),
            Err(SelectionViolation::DuplicateCandidate {
                candidate_id: "cand7".to_string()
            })
        );
        assert_eq!(
            validate_selection(&e, pos4, &ids(&["cand5"])),
            Err(SelectionViolation::WrongPosition {
                candidate_id: "cand5".to_string(),
                position_id: "pos3".to_string()
            })
        );
        assert_eq!(
            validate_selection(&e, pos4, &ids(&["cand42"])),
            Err(SelectionViolation::UnknownCandidate {
                candidate_id: "cand42".to_string()
            })
        );
        assert_eq!(validate_selection(&e, pos4, &ids(&["cand9", "cand7"])), Ok(()));
    }

    #[test]
    fn test_submit_once() {
        let now = Utc::now();
        let e = election(now);
        let guard = SubmissionGuard::for_testing();

        let ballot = guard
            .submit("voter-1", &e, "pos4", &ids(&["cand9", "cand7"]), now)
            .unwrap();
        assert_eq!(ballot.candidate_ids(), ["cand9", "cand7"]);
        assert!(guard.receipts().verify(&ballot));
        assert!(guard.has_voted("voter-1", "pos4").unwrap());
        assert!(!guard.has_voted("voter-1", "pos3").unwrap());

        let later = now + Duration::minutes(5);
        match guard.submit("voter-1", &e, "pos4", &ids(&["cand8"]), later) {
            Err(Error::AlreadyVoted { submitted_at, .. }) => assert_eq!(submitted_at, now),
            other => panic!("Expected AlreadyVoted, got {other:?}"),
        }
        assert_eq!(guard.store().len().unwrap(), 1);
    }

    #[test]
    fn test_submit_outside_window() {
        let now = Utc::now();
        let e = election(now);
        let guard = SubmissionGuard::for_testing();

        let closed = e.ends_at;
        assert!(matches!(
            guard.submit("voter-1", &e, "pos3", &ids(&["cand5"]), closed),
            Err(Error::ElectionNotOpen { status: crate::types::ElectionStatus::Archived, .. })
        ));

        let early = e.starts_at - Duration::seconds(1);
        assert!(matches!(
            guard.submit("voter-1", &e, "pos3", &ids(&["cand5"]), early),
            Err(Error::ElectionNotOpen { status: crate::types::ElectionStatus::Upcoming, .. })
        ));
        assert!(guard.store().is_empty().unwrap());
    }

    #[test]
    fn test_submit_unknown_position_and_invalid() {
        let now = Utc::now();
        let e = election(now);
        let guard = SubmissionGuard::for_testing();

        assert!(matches!(
            guard.submit("voter-1", &e, "pos1", &ids(&["cand5"]), now),
            Err(Error::NotFound { kind: EntityKind::Position, .. })
        ));
        assert!(matches!(
            guard.submit("voter-1", &e, "pos3", &ids(&["cand5", "cand6"]), now),
            Err(Error::Invalid { violation: SelectionViolation::TooMany { max: 1, got: 2 } })
        ));
        assert!(!guard.has_voted("voter-1", "pos3").unwrap());
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("voter-123456789"), "voter-12");
        assert_eq!(short_id("v1"), "v1");
    }
}
