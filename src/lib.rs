//! Ballot selection and tallying engine
//!
//! Elections are grouped into positions, each offering candidates under a
//! voting method. Voters build a selection per position, submit it once, and
//! tallies are recomputed from the stored ballot set on demand.

pub mod ballot;
pub mod catalog;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod errors;
pub mod tally;
pub mod types;

// Re-export commonly used types
pub use ballot::{BallotDraft, BallotStore, InMemoryBallotStore, Selection, SubmissionGuard, ToggleEffect};
pub use catalog::{CatalogStore, InMemoryCatalog};
pub use config::{EngineConfig, LoggingConfig};
pub use engine::{Clock, DraftSubmission, FinalizedElection, FixedClock, SystemClock, VotingEngine};
pub use errors::{Error, Result};
pub use tally::{ElectionResults, TallyResult};
pub use types::{Ballot, Candidate, Election, ElectionStatus, Position, VotingMethod};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default filter when `RUST_LOG` is unset
const DEFAULT_DIRECTIVE: &str = "ballot_engine=info";

/// Initialize the engine with proper logging
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_DIRECTIVE.into()),
        )
        .try_init()
        .map_err(|e| Error::internal(format!("Failed to install subscriber: {e}")))?;

    tracing::info!("🗳️  Ballot engine v{} initialized", VERSION);
    Ok(())
}

/// Initialize logging from configuration
///
/// `RUST_LOG` still wins over the configured level when set.
pub fn init_with(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("ballot_engine={}", logging.level).into());

    let installed = match logging.format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init(),
        "pretty" => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
        other => {
            return Err(Error::internal(format!(
                "Unknown LOG_FORMAT '{other}' (expected pretty or json)"
            )));
        }
    };
    installed.map_err(|e| Error::internal(format!("Failed to install subscriber: {e}")))?;

    tracing::info!(
        "🗳️  Ballot engine v{} initialized ({} logs)",
        VERSION,
        logging.format
    );
    Ok(())
}
