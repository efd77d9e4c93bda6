//! Error handling for the ballot engine
//!
//! Every expected outcome a caller has to react to (bad selection, duplicate
//! submission, closed election, unknown reference) is a typed variant. None of
//! them is retried inside the engine.

use crate::types::{CandidateId, ElectionId, ElectionStatus, PositionId, VoterId};
use chrono::{DateTime, Utc};
use std::fmt;

/// Result type alias for the ballot engine
pub type Result<T> = std::result::Result<T, Error>;

/// Which catalog entity a lookup failed on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Election,
    Position,
    Candidate,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Election => "election",
            EntityKind::Position => "position",
            EntityKind::Candidate => "candidate",
        };
        f.write_str(name)
    }
}

/// The constraint a selection broke
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionViolation {
    /// No candidate selected; every voting method needs at least one
    #[error("at least one candidate must be selected")]
    Empty,
    /// More candidates than the position's method allows
    #[error("{got} candidates selected, at most {max} allowed")]
    TooMany { max: usize, got: usize },
    /// Candidate id is not part of the election at all
    #[error("unknown candidate {candidate_id}")]
    UnknownCandidate { candidate_id: CandidateId },
    /// Same candidate listed more than once
    #[error("candidate {candidate_id} selected more than once")]
    DuplicateCandidate { candidate_id: CandidateId },
    /// Candidate exists but stands for a different position
    #[error("candidate {candidate_id} stands for position {position_id}")]
    WrongPosition {
        candidate_id: CandidateId,
        position_id: PositionId,
    },
}

/// Main error type for the ballot engine
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Selection violates the position's voting method
    #[error("Invalid selection: {violation}")]
    Invalid { violation: SelectionViolation },

    /// A ballot already exists for this voter and position
    #[error("Voter {voter_id} already voted for position {position_id} at {submitted_at}")]
    AlreadyVoted {
        voter_id: VoterId,
        position_id: PositionId,
        submitted_at: DateTime<Utc>,
    },

    /// Submission attempted outside the voting window
    #[error("Election {election_id} is not open for voting (status: {status})")]
    ElectionNotOpen {
        election_id: ElectionId,
        status: ElectionStatus,
    },

    /// Final results requested before the election closed
    #[error("Election {election_id} has not closed yet (status: {status})")]
    ElectionNotClosed {
        election_id: ElectionId,
        status: ElectionStatus,
    },

    /// Unknown election, position or candidate reference
    #[error("Unknown {kind}: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// Catalog data rejected at load time
    #[error("Catalog error: {message}")]
    Catalog { message: String },

    /// Ballot store failures
    #[error("Ballot store error: {message}")]
    Store { message: String },

    /// Cryptographic operation errors
    #[error("Cryptographic error: {message}")]
    Crypto { message: String },

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl Error {
    /// Create a new invalid-selection error
    pub fn invalid(violation: SelectionViolation) -> Self {
        Self::Invalid { violation }
    }

    /// Create a new not-found error
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Create a new catalog error
    pub fn catalog(message: impl Into<String>) -> Self {
        Self::Catalog {
            message: message.into(),
        }
    }

    /// Create a new store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Create a new crypto error
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto {
            message: message.into(),
        }
    }

    /// Create a new internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Duplicate submissions are reported to the voter, not treated as failures
    pub fn is_informational(&self) -> bool {
        matches!(self, Error::AlreadyVoted { .. })
    }

    /// The engine never retries; callers may resubmit because duplicates are detected
    pub fn is_retryable(&self) -> bool {
        false
    }
}

/// Convenience macros for creating specific error types
#[macro_export]
macro_rules! catalog_error {
    ($msg:expr) => {
        $crate::Error::catalog($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::catalog(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! store_error {
    ($msg:expr) => {
        $crate::Error::store($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::store(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! crypto_error {
    ($msg:expr) => {
        $crate::Error::crypto($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::crypto(format!($fmt, $($arg)*))
    };
}
