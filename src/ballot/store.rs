//! Ballot storage with an atomic insert-if-absent
//!
//! The store is the one shared mutation point of the engine. Everything else
//! reads point-in-time snapshots of an append-only log.

use crate::store_error;
use crate::types::{Ballot, PositionId, VoterId};
use crate::Result;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::RwLock;

/// Result of an insert attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The ballot is now stored
    Inserted(Ballot),
    /// A ballot for the same voter and position was already stored; it is returned unchanged
    Existing(Ballot),
}

/// Persistent set of accepted ballots keyed by `(voter_id, position_id)`
///
/// A production backend must implement `insert_if_absent` as a single
/// transaction or behind a unique constraint on the key.
pub trait BallotStore: Send + Sync {
    /// Store `ballot` unless its key is taken. Check and insert are one step.
    fn insert_if_absent(&self, ballot: Ballot) -> Result<InsertOutcome>;

    /// Ballot held by a voter for a position
    fn find(&self, voter_id: &str, position_id: &str) -> Result<Option<Ballot>>;

    /// Point-in-time copy of every ballot, in acceptance order
    fn snapshot(&self) -> Result<Vec<Ballot>>;

    /// Point-in-time copy of the ballots of one election
    fn election_snapshot(&self, election_id: &str) -> Result<Vec<Ballot>> {
        Ok(self
            .snapshot()?
            .into_iter()
            .filter(|b| b.election_id() == election_id)
            .collect())
    }

    /// Number of stored ballots
    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    /// Key to offset in `log`
    index: HashMap<(VoterId, PositionId), usize>,
    /// Append-only
    log: Vec<Ballot>,
}

/// In-memory ballot store
///
/// The key index and the log live behind the same lock, so a snapshot can
/// never observe a ballot that is indexed but not yet logged, or the reverse.
#[derive(Debug, Default)]
pub struct InMemoryBallotStore {
    inner: RwLock<StoreInner>,
}

impl InMemoryBallotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BallotStore for InMemoryBallotStore {
    fn insert_if_absent(&self, ballot: Ballot) -> Result<InsertOutcome> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| store_error!("Ballot store write error"))?;
        let StoreInner { index, log } = &mut *inner;

        let key = (ballot.voter_id().to_string(), ballot.position_id().to_string());
        match index.entry(key) {
            Entry::Occupied(existing) => Ok(InsertOutcome::Existing(log[*existing.get()].clone())),
            Entry::Vacant(slot) => {
                slot.insert(log.len());
                log.push(ballot.clone());
                Ok(InsertOutcome::Inserted(ballot))
            }
        }
    }

    fn find(&self, voter_id: &str, position_id: &str) -> Result<Option<Ballot>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| store_error!("Ballot store read error"))?;

        Ok(inner
            .index
            .get(&(voter_id.to_string(), position_id.to_string()))
            .map(|&i| inner.log[i].clone()))
    }

    fn snapshot(&self) -> Result<Vec<Ballot>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| store_error!("Ballot store read error"))?;
        Ok(inner.log.clone())
    }

    fn election_snapshot(&self, election_id: &str) -> Result<Vec<Ballot>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| store_error!("Ballot store read error"))?;
        Ok(inner
            .log
            .iter()
            .filter(|b| b.election_id() == election_id)
            .cloned()
            .collect())
    }

    fn len(&self) -> Result<usize> {
        let inner = self
            .inner
            .read()
            .map_err(|_| store_error!("Ballot store read error"))?;
        Ok(inner.log.len())
    }
}
