//! In-progress selections and the toggle rules for each voting method
//!
//! A [`Selection`] belongs to one voter's session for one position and has a
//! single writer, so it needs no synchronisation. Toggling never mutates in
//! place: it returns the next selection together with what happened.

use crate::errors::EntityKind;
use crate::types::{CandidateId, Election, ElectionId, Position, PositionId, VotingMethod};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// What a toggle did to the selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleEffect {
    /// Candidate appended (or chosen on an empty single-choice selection)
    Selected,
    /// Single choice switched to another candidate
    Replaced,
    /// Candidate removed; later ranks moved up
    Deselected,
    /// Selection is full, nothing changed; callers should tell the voter
    CapacityReached,
    /// Re-selected the current single choice
    Unchanged,
}

/// Outcome of [`Selection::toggle`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toggle {
    pub selection: Selection,
    pub effect: ToggleEffect,
}

/// Ordered, duplicate-free list of candidate ids for one position
///
/// Order is the preference rank for ranked positions and carries no meaning
/// otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selection(Vec<CandidateId>);

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the position's method rules for a click on `candidate_id`
    pub fn toggle(&self, position: &Position, candidate_id: &str) -> Result<Toggle> {
        if !position.has_candidate(candidate_id) {
            return Err(Error::not_found(EntityKind::Candidate, candidate_id));
        }

        let toggle = match position.method {
            VotingMethod::Single => {
                let effect = match self.0.as_slice() {
                    [current] if current == candidate_id => ToggleEffect::Unchanged,
                    [] => ToggleEffect::Selected,
                    _ => ToggleEffect::Replaced,
                };
                Toggle {
                    selection: Selection(vec![candidate_id.to_string()]),
                    effect,
                }
            }
            VotingMethod::Multiple { max_selections }
            | VotingMethod::Ranked { max_selections } => {
                self.toggle_bounded(candidate_id, max_selections)
            }
        };

        Ok(toggle)
    }

    fn toggle_bounded(&self, candidate_id: &str, max_selections: usize) -> Toggle {
        if self.contains(candidate_id) {
            let remaining = self
                .0
                .iter()
                .filter(|c| c.as_str() != candidate_id)
                .cloned()
                .collect();
            return Toggle {
                selection: Selection(remaining),
                effect: ToggleEffect::Deselected,
            };
        }

        if self.0.len() < max_selections {
            let mut next = self.0.clone();
            next.push(candidate_id.to_string());
            Toggle {
                selection: Selection(next),
                effect: ToggleEffect::Selected,
            }
        } else {
            Toggle {
                selection: self.clone(),
                effect: ToggleEffect::CapacityReached,
            }
        }
    }

    /// 1-based preference rank, if selected
    pub fn rank(&self, candidate_id: &str) -> Option<usize> {
        self.0.iter().position(|c| c == candidate_id).map(|i| i + 1)
    }

    pub fn contains(&self, candidate_id: &str) -> bool {
        self.0.iter().any(|c| c == candidate_id)
    }

    /// A position may be submitted once at least one candidate is chosen
    pub fn is_ready(&self) -> bool {
        !self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn candidate_ids(&self) -> &[CandidateId] {
        &self.0
    }

    pub fn into_candidate_ids(self) -> Vec<CandidateId> {
        self.0
    }
}

/// A voter's selections across every position of one election
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotDraft {
    election_id: ElectionId,
    selections: HashMap<PositionId, Selection>,
}

impl BallotDraft {
    /// Empty draft for `election_id`
    pub fn new(election_id: impl Into<ElectionId>) -> Self {
        Self {
            election_id: election_id.into(),
            selections: HashMap::new(),
        }
    }

    pub fn election_id(&self) -> &str {
        &self.election_id
    }

    /// Toggle a candidate on one position of the draft's election
    pub fn toggle(
        &mut self,
        election: &Election,
        position_id: &str,
        candidate_id: &str,
    ) -> Result<ToggleEffect> {
        if election.id != self.election_id {
            return Err(Error::not_found(EntityKind::Election, election.id.as_str()));
        }
        let position = election
            .position(position_id)
            .ok_or_else(|| Error::not_found(EntityKind::Position, position_id))?;

        let Toggle { selection, effect } = self.selection(position_id).toggle(position, candidate_id)?;
        self.selections.insert(position.id.clone(), selection);
        Ok(effect)
    }

    /// Current selection for a position (empty if never touched)
    pub fn selection(&self, position_id: &str) -> Selection {
        self.selections.get(position_id).cloned().unwrap_or_default()
    }

    /// 1-based rank of a candidate within a position
    pub fn rank(&self, position_id: &str, candidate_id: &str) -> Option<usize> {
        self.selections.get(position_id)?.rank(candidate_id)
    }

    pub fn is_ready(&self, position_id: &str) -> bool {
        self.selections
            .get(position_id)
            .is_some_and(Selection::is_ready)
    }

    /// Positions still needing a choice. `settled` lists positions the voter
    /// already holds a ballot for; those are excluded.
    pub fn missing_positions(
        &self,
        election: &Election,
        settled: &HashSet<PositionId>,
    ) -> Vec<PositionId> {
        election
            .positions
            .iter()
            .filter(|p| !settled.contains(&p.id) && !self.is_ready(&p.id))
            .map(|p| p.id.clone())
            .collect()
    }

    /// Election-level submit is offered only when every unsettled position is ready
    pub fn ready_to_submit(&self, election: &Election, settled: &HashSet<PositionId>) -> bool {
        self.missing_positions(election, settled).is_empty()
    }

    /// Remove and return a position's selection
    pub fn take(&mut self, position_id: &str) -> Selection {
        self.selections.remove(position_id).unwrap_or_default()
    }
}
