//! Read-only catalog of elections, positions and candidates
//!
//! The catalog is produced by an external administrative process. This module
//! validates a snapshot once at load time and then only serves reads.

use crate::types::{Election, ElectionId, ElectionStatus};
use crate::{Error, Result, catalog_error};
use crate::errors::EntityKind;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Source of catalog snapshots
pub trait CatalogStore: Send + Sync {
    /// Fetch one election by id
    fn election(&self, election_id: &str) -> Result<Arc<Election>>;

    /// All elections in catalog order
    fn elections(&self) -> Result<Vec<Arc<Election>>>;

    /// Elections whose window has not opened at `now`
    fn upcoming(&self, now: DateTime<Utc>) -> Result<Vec<Arc<Election>>> {
        self.with_status(now, ElectionStatus::Upcoming)
    }

    /// Elections accepting ballots at `now`
    fn ongoing(&self, now: DateTime<Utc>) -> Result<Vec<Arc<Election>>> {
        self.with_status(now, ElectionStatus::Ongoing)
    }

    /// Elections whose window has closed at `now`
    fn archived(&self, now: DateTime<Utc>) -> Result<Vec<Arc<Election>>> {
        self.with_status(now, ElectionStatus::Archived)
    }

    /// Elections in the given status at `now`
    fn with_status(&self, now: DateTime<Utc>, status: ElectionStatus) -> Result<Vec<Arc<Election>>> {
        Ok(self
            .elections()?
            .into_iter()
            .filter(|e| e.status(now) == status)
            .collect())
    }
}

/// Validate a catalog snapshot
///
/// Checks windows, selection bounds and identifier uniqueness across the
/// whole snapshot; position and candidate ids must be globally unique so a
/// ballot key `(voter, position)` is never ambiguous.
pub fn validate_catalog(elections: &[Election]) -> Result<()> {
    let mut election_ids = HashSet::new();
    let mut position_ids = HashSet::new();
    let mut candidate_ids = HashSet::new();

    for election in elections {
        if !election_ids.insert(election.id.as_str()) {
            return Err(catalog_error!("duplicate election id {}", election.id));
        }
        if election.starts_at >= election.ends_at {
            return Err(catalog_error!(
                "election {} closes before it opens",
                election.id
            ));
        }
        if election.positions.is_empty() {
            return Err(catalog_error!("election {} has no positions", election.id));
        }

        for position in &election.positions {
            if !position_ids.insert(position.id.as_str()) {
                return Err(catalog_error!("duplicate position id {}", position.id));
            }
            if position.method.max_selections() == 0 {
                return Err(catalog_error!(
                    "position {} allows zero selections",
                    position.id
                ));
            }
            if position.candidates.is_empty() {
                return Err(catalog_error!("position {} has no candidates", position.id));
            }
            if position.method.max_selections() > position.candidates.len() {
                tracing::warn!(
                    "Position {} allows {} selections but lists {} candidates",
                    position.id,
                    position.method.max_selections(),
                    position.candidates.len()
                );
            }

            for candidate in &position.candidates {
                if !candidate_ids.insert(candidate.id.as_str()) {
                    return Err(catalog_error!("duplicate candidate id {}", candidate.id));
                }
            }
        }
    }

    Ok(())
}

/// Immutable in-memory catalog snapshot
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    elections: Vec<Arc<Election>>,
    index: HashMap<ElectionId, usize>,
}

impl InMemoryCatalog {
    /// Build a catalog from validated elections
    pub fn new(elections: Vec<Election>) -> Result<Self> {
        validate_catalog(&elections)?;

        let index = elections
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.clone(), i))
            .collect();
        let elections: Vec<Arc<Election>> = elections.into_iter().map(Arc::new).collect();

        tracing::info!(
            "📚 Catalog loaded: elections={}, positions={}",
            elections.len(),
            elections.iter().map(|e| e.positions.len()).sum::<usize>()
        );

        Ok(Self { elections, index })
    }

    /// Parse a JSON array of elections
    pub fn from_json(json: &str) -> Result<Self> {
        let elections: Vec<Election> = serde_json::from_str(json)?;
        Self::new(elections)
    }

    pub fn len(&self) -> usize {
        self.elections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elections.is_empty()
    }
}

impl CatalogStore for InMemoryCatalog {
    fn election(&self, election_id: &str) -> Result<Arc<Election>> {
        self.index
            .get(election_id)
            .map(|&i| Arc::clone(&self.elections[i]))
            .ok_or_else(|| Error::not_found(EntityKind::Election, election_id))
    }

    fn elections(&self) -> Result<Vec<Arc<Election>>> {
        Ok(self.elections.clone())
    }
}
