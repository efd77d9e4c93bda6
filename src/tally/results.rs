//! Read-only results projection
//!
//! Combines catalog display data with tally output into the shape handed to
//! presentation collaborators.

use crate::tally::{self, TallyResult};
use crate::types::{Ballot, CandidateId, Election, ElectionId, ElectionStatus, Position, PositionId, VotingMethod};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One candidate's row in a results table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    /// 1-based place; tied candidates share a place and the next one is skipped
    pub place: usize,
    pub candidate_id: CandidateId,
    pub name: String,
    pub manifesto: String,
    pub votes: u64,
    /// Percentage of the position's total votes
    pub share: f64,
    pub is_winner: bool,
}

/// Results for one position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionResults {
    pub position_id: PositionId,
    pub title: String,
    pub method: VotingMethod,
    pub standings: Vec<Standing>,
    pub winners: Vec<CandidateId>,
    pub ballots_counted: u64,
    pub ballot_digest: Option<String>,
}

impl PositionResults {
    /// Attach display attributes from `position` to a tally
    pub fn from_tally(position: &Position, tally: &TallyResult) -> Self {
        let mut standings = Vec::with_capacity(tally.entries.len());
        let mut previous: Option<u64> = None;
        let mut place = 0;

        for (i, entry) in tally.entries.iter().enumerate() {
            if previous != Some(entry.weight) {
                place = i + 1;
                previous = Some(entry.weight);
            }
            let candidate = position.candidate(&entry.candidate_id);
            standings.push(Standing {
                place,
                candidate_id: entry.candidate_id.clone(),
                name: candidate.map(|c| c.name.clone()).unwrap_or_default(),
                manifesto: candidate.map(|c| c.manifesto.clone()).unwrap_or_default(),
                votes: entry.weight,
                share: entry.share,
                is_winner: tally.winners.contains(&entry.candidate_id),
            });
        }

        Self {
            position_id: position.id.clone(),
            title: position.title.clone(),
            method: position.method,
            standings,
            winners: tally.winners.clone(),
            ballots_counted: tally.ballots_counted,
            ballot_digest: tally.ballot_digest.clone(),
        }
    }

    /// Display names of the winners
    pub fn winner_names(&self) -> Vec<&str> {
        self.standings
            .iter()
            .filter(|s| s.is_winner)
            .map(|s| s.name.as_str())
            .collect()
    }
}

/// Participation figures for an election
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turnout {
    /// Distinct voters with at least one ballot
    pub ballots_cast: u64,
    pub eligible_voters: Option<u64>,
    /// `ballots_cast / eligible_voters`; absent when the electorate is zero or unknown
    pub rate: Option<f64>,
}

impl Turnout {
    pub fn new(ballots_cast: u64, eligible_voters: Option<u64>) -> Self {
        Self {
            ballots_cast,
            eligible_voters,
            rate: tally::turnout(ballots_cast, eligible_voters),
        }
    }

    /// Rate as a whole percentage
    pub fn percentage(&self) -> Option<u64> {
        self.rate.map(|r| (r * 100.0).round() as u64)
    }
}

/// Full results view for one election
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionResults {
    pub election_id: ElectionId,
    pub title: String,
    pub status: ElectionStatus,
    pub positions: Vec<PositionResults>,
    pub turnout: Turnout,
}

impl ElectionResults {
    /// Tally every position of `election` over a ballot snapshot
    ///
    /// A position without ballots whose candidates carry frozen vote counts
    /// (imported historic results) is reported from those counts instead.
    pub fn compose(election: &Election, ballots: &[Ballot], now: DateTime<Utc>) -> Self {
        let positions = election
            .positions
            .iter()
            .map(|position| {
                let counted = tally::tally(position, ballots);
                let result = if counted.ballots_counted == 0 {
                    TallyResult::from_frozen(position, election.total_votes_cast)
                        .unwrap_or(counted)
                } else {
                    counted
                };
                PositionResults::from_tally(position, &result)
            })
            .collect();

        let participating = tally::participating_voters(ballots, &election.id);
        let ballots_cast = match election.total_votes_cast {
            Some(historic) if participating == 0 => historic,
            _ => participating,
        };

        Self {
            election_id: election.id.clone(),
            title: election.title.clone(),
            status: election.status(now),
            positions,
            turnout: Turnout::new(ballots_cast, election.eligible_voters),
        }
    }

    pub fn position(&self, position_id: &str) -> Option<&PositionResults> {
        self.positions.iter().find(|p| p.position_id == position_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Candidate;
    use chrono::Duration;

    fn archived_guild_election(now: DateTime<Utc>) -> Election {
        Election {
            id: "3".to_string(),
            title: "2024 Guild Presidential Elections".to_string(),
            description: "Previous year's Guild Presidential Elections".to_string(),
            starts_at: now - Duration::days(400),
            ends_at: now - Duration::days(398),
            positions: vec![Position::new(
                "pos5",
                "Guild President",
                VotingMethod::Single,
                vec![
                    Candidate::new("cand10", "Musiitwa Joel")
                        .with_manifesto("Student welfare first")
                        .with_vote_count(2000),
                    Candidate::new("cand11", "Jack Moore")
                        .with_manifesto("Transparency and accountability")
                        .with_vote_count(1750),
                ],
            )],
            eligible_voters: Some(5000),
            total_votes_cast: Some(3750),
        }
    }

    #[test]
    fn test_frozen_archived_results() {
        let now = Utc::now();
        let election = archived_guild_election(now);
        let results = ElectionResults::compose(&election, &[], now);

        assert_eq!(results.status, ElectionStatus::Archived);
        let president = results.position("pos5").unwrap();
        assert_eq!(president.standings[0].name, "Musiitwa Joel");
        assert_eq!(president.standings[0].votes, 2000);
        assert_eq!(president.standings[1].votes, 1750);
        assert_eq!(president.winner_names(), vec!["Musiitwa Joel"]);
        assert_eq!(president.ballots_counted, 3750);

        assert_eq!(results.turnout.ballots_cast, 3750);
        assert_eq!(results.turnout.rate, Some(0.75));
        assert_eq!(results.turnout.percentage(), Some(75));
    }

    #[test]
    fn test_tied_places() {
        let position = Position::new(
            "pos1",
            "Committee",
            VotingMethod::Multiple { max_selections: 2 },
            vec![
                Candidate::new("a", "A").with_vote_count(3),
                Candidate::new("b", "B").with_vote_count(3),
                Candidate::new("c", "C").with_vote_count(1),
            ],
        );
        let tally = TallyResult::from_frozen(&position, Some(4)).unwrap();
        let view = PositionResults::from_tally(&position, &tally);

        let places: Vec<usize> = view.standings.iter().map(|s| s.place).collect();
        assert_eq!(places, vec![1, 1, 3]);
        assert_eq!(view.winner_names(), vec!["A", "B"]);
        assert_eq!(view.ballots_counted, 4);
    }

    #[test]
    fn test_unknown_electorate_has_no_rate() {
        let now = Utc::now();
        let mut election = archived_guild_election(now);
        election.eligible_voters = Some(0);
        let results = ElectionResults::compose(&election, &[], now);
        assert_eq!(results.turnout.rate, None);
        assert_eq!(results.turnout.percentage(), None);
    }
}
