//! Selecting, validating and storing ballots

pub mod guard;
pub mod selection;
pub mod store;

pub use guard::{SubmissionGuard, validate_selection};
pub use selection::{BallotDraft, Selection, Toggle, ToggleEffect};
pub use store::{BallotStore, InMemoryBallotStore, InsertOutcome};
