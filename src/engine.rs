//! The ballot engine facade
//!
//! [`VotingEngine`] is what external collaborators call. It assumes the voter
//! id it is handed was already verified by an authentication service; no
//! identity checks happen here.

use crate::ballot::{BallotDraft, BallotStore, InMemoryBallotStore, SubmissionGuard};
use crate::catalog::CatalogStore;
use crate::config::EngineConfig;
use crate::crypto::{ReceiptIssuer, ResultAttestation, ResultSigner};
use crate::errors::EntityKind;
use crate::tally::{self, ElectionResults, TallyResult, Turnout};
use crate::types::{Ballot, CandidateId, Candidate, Election, ElectionStatus, PositionId};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and replays
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        // A poisoned lock still holds a valid timestamp
        let mut guard = self.now.write().unwrap_or_else(|e| e.into_inner());
        *guard = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut guard = self.now.write().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }
}

/// Per-position outcome of an election-level submission
#[derive(Debug)]
pub struct DraftSubmission {
    /// Ballots accepted by this call
    pub accepted: Vec<Ballot>,
    /// Positions the voter had already voted on, with the original submission time
    pub already_voted: Vec<(PositionId, DateTime<Utc>)>,
}

/// An archived election with frozen vote counts and signed results
#[derive(Debug, Clone)]
pub struct FinalizedElection {
    /// Catalog entry with every candidate's `vote_count` populated
    pub election: Election,
    pub results: ElectionResults,
    pub attestation: ResultAttestation,
}

/// Entry point used by external collaborators
pub struct VotingEngine {
    catalog: Arc<dyn CatalogStore>,
    guard: SubmissionGuard,
    clock: Arc<dyn Clock>,
    signer: ResultSigner,
    live_results: bool,
}

impl VotingEngine {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        store: Arc<dyn BallotStore>,
        clock: Arc<dyn Clock>,
        config: &EngineConfig,
    ) -> Result<Self> {
        let receipts = ReceiptIssuer::from_config(config)?;
        let signer = match config.results_signing_key_bytes()? {
            Some(secret) => ResultSigner::from_secret(&secret)?,
            None => {
                tracing::warn!("No results signing key configured, using a throwaway key");
                ResultSigner::generate()
            }
        };

        tracing::info!(
            "🗳️  Ballot engine ready: live_results={}, results_key={}",
            config.live_results,
            &signer.public_key_hex()[..16]
        );

        Ok(Self {
            catalog,
            guard: SubmissionGuard::new(store, receipts),
            clock,
            signer,
            live_results: config.live_results,
        })
    }

    /// Engine over an in-memory store with testing configuration
    pub fn for_testing(catalog: Arc<dyn CatalogStore>, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::new(
            catalog,
            Arc::new(InMemoryBallotStore::new()),
            clock,
            &EngineConfig::for_testing(),
        )
    }

    /// Catalog entry for an election
    pub fn get_catalog(&self, election_id: &str) -> Result<Arc<Election>> {
        self.catalog.election(election_id)
    }

    /// Current status of an election, derived from its window
    pub fn status(&self, election_id: &str) -> Result<ElectionStatus> {
        Ok(self.get_catalog(election_id)?.status(self.clock.now()))
    }

    /// Submit one position's ballot
    pub fn submit_ballot(
        &self,
        voter_id: &str,
        election_id: &str,
        position_id: &str,
        candidate_ids: &[CandidateId],
    ) -> Result<Ballot> {
        let election = self.get_catalog(election_id)?;
        self.guard
            .submit(voter_id, &election, position_id, candidate_ids, self.clock.now())
    }

    /// Submit every ready position of a draft
    ///
    /// Offered only when each position is either ready or already voted on;
    /// otherwise fails with `Invalid(Empty)` before anything is stored. Every
    /// selection is validated up front, so a malformed one rejects the whole
    /// call. Positions already voted on are reported, not failed.
    pub fn submit_draft(&self, voter_id: &str, draft: &BallotDraft) -> Result<DraftSubmission> {
        let election = self.get_catalog(draft.election_id())?;
        let now = self.clock.now();
        let status = election.status(now);
        if status != ElectionStatus::Ongoing {
            return Err(Error::ElectionNotOpen {
                election_id: election.id.clone(),
                status,
            });
        }

        let settled = self.settled_positions(voter_id, &election)?;
        if !draft.ready_to_submit(&election, &settled) {
            return Err(Error::invalid(crate::errors::SelectionViolation::Empty));
        }

        let pending: Vec<_> = election
            .positions
            .iter()
            .filter(|p| !settled.contains(&p.id))
            .collect();
        for position in &pending {
            crate::ballot::validate_selection(
                &election,
                position,
                draft.selection(&position.id).candidate_ids(),
            )
            .map_err(Error::invalid)?;
        }

        let mut outcome = DraftSubmission {
            accepted: Vec::with_capacity(pending.len()),
            already_voted: Vec::new(),
        };
        for position in pending {
            let selection = draft.selection(&position.id);
            match self
                .guard
                .submit(voter_id, &election, &position.id, selection.candidate_ids(), now)
            {
                Ok(ballot) => outcome.accepted.push(ballot),
                // Lost a race with a concurrent submission for the same position
                Err(Error::AlreadyVoted { submitted_at, .. }) => {
                    outcome.already_voted.push((position.id.clone(), submitted_at))
                }
                Err(e) => return Err(e),
            }
        }
        for position_id in settled {
            if let Some(existing) = self.guard.store().find(voter_id, &position_id)? {
                outcome
                    .already_voted
                    .push((position_id, existing.submitted_at()));
            }
        }

        Ok(outcome)
    }

    /// Whether the voter holds a ballot for the position
    pub fn has_voted(&self, voter_id: &str, election_id: &str, position_id: &str) -> Result<bool> {
        let election = self.get_catalog(election_id)?;
        if election.position(position_id).is_none() {
            return Err(Error::not_found(EntityKind::Position, position_id));
        }
        self.guard.has_voted(voter_id, position_id)
    }

    /// The voter's own ballot for a position, for receipt display
    pub fn voter_ballot(&self, voter_id: &str, position_id: &str) -> Result<Option<Ballot>> {
        self.guard.store().find(voter_id, position_id)
    }

    /// Check a stored ballot against its receipt
    pub fn verify_receipt(&self, ballot: &Ballot) -> bool {
        self.guard.receipts().verify(ballot)
    }

    /// Tally one position over a consistent snapshot
    pub fn get_tally(&self, election_id: &str, position_id: &str) -> Result<TallyResult> {
        let election = self.get_catalog(election_id)?;
        self.ensure_results_visible(&election)?;
        let position = election
            .position(position_id)
            .ok_or_else(|| Error::not_found(EntityKind::Position, position_id))?;

        let snapshot = self.guard.store().election_snapshot(&election.id)?;
        let counted = tally::tally(position, &snapshot);
        if counted.ballots_counted == 0 {
            if let Some(frozen) = TallyResult::from_frozen(position, election.total_votes_cast) {
                return Ok(frozen);
            }
        }
        Ok(counted)
    }

    /// Results view for every position of an election
    pub fn get_results(&self, election_id: &str) -> Result<ElectionResults> {
        let election = self.get_catalog(election_id)?;
        self.ensure_results_visible(&election)?;
        let snapshot = self.guard.store().election_snapshot(&election.id)?;
        Ok(ElectionResults::compose(&election, &snapshot, self.clock.now()))
    }

    /// Participation so far
    pub fn turnout(&self, election_id: &str) -> Result<Turnout> {
        self.get_results(election_id).map(|r| r.turnout)
    }

    /// Freeze vote counts into the catalog entry and sign the results
    ///
    /// Only allowed once the election is archived.
    pub fn finalize(&self, election_id: &str) -> Result<FinalizedElection> {
        let election = self.get_catalog(election_id)?;
        let now = self.clock.now();
        let status = election.status(now);
        if status != ElectionStatus::Archived {
            return Err(Error::ElectionNotClosed {
                election_id: election.id.clone(),
                status,
            });
        }

        let snapshot = self.guard.store().election_snapshot(&election.id)?;
        let results = ElectionResults::compose(&election, &snapshot, now);
        let attestation = self.signer.sign(&results)?;

        let mut frozen = (*election).clone();
        for position in &mut frozen.positions {
            let Some(view) = results.position(&position.id) else {
                continue;
            };
            for candidate in &mut position.candidates {
                freeze_candidate(candidate, view);
            }
        }
        frozen.total_votes_cast = Some(results.turnout.ballots_cast);

        tracing::info!(
            "🏁 Election finalised: election={}, ballots={}, turnout={:?}",
            election.id,
            snapshot.len(),
            results.turnout.percentage()
        );

        Ok(FinalizedElection {
            election: frozen,
            results,
            attestation,
        })
    }

    /// Hex key that verifies result attestations
    pub fn results_public_key(&self) -> String {
        self.signer.public_key_hex()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn settled_positions(&self, voter_id: &str, election: &Election) -> Result<HashSet<PositionId>> {
        let mut settled = HashSet::new();
        for position in &election.positions {
            if self.guard.has_voted(voter_id, &position.id)? {
                settled.insert(position.id.clone());
            }
        }
        Ok(settled)
    }

    fn ensure_results_visible(&self, election: &Election) -> Result<()> {
        let status = election.status(self.clock.now());
        if status == ElectionStatus::Archived || self.live_results {
            Ok(())
        } else {
            Err(Error::ElectionNotClosed {
                election_id: election.id.clone(),
                status,
            })
        }
    }
}

fn freeze_candidate(candidate: &mut Candidate, view: &tally::PositionResults) {
    let votes = view
        .standings
        .iter()
        .find(|s| s.candidate_id == candidate.id)
        .map(|s| s.votes)
        .unwrap_or(0);
    candidate.vote_count = Some(votes);
}
