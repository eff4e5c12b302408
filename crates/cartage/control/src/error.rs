//! Error types for cartage-control.

use std::time::Duration;

use cartage_types::{ConcurrencyMode, EpisodeId, NodeId, ParcelId, ResilienceMode};
use thiserror::Error;

/// Errors that can occur in control-plane orchestration.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The local node is not present in the topology.
    #[error("node not found in topology: {0}")]
    UnknownNode(NodeId),

    /// The mode combination has no implemented strategy.
    #[error("mode combination {resilience}/{concurrency} is not supported")]
    UnsupportedMode {
        resilience: ResilienceMode,
        concurrency: ConcurrencyMode,
    },

    /// No status element is tracked for the parcel.
    #[error("status element not found: {0}")]
    ElementNotFound(ParcelId),

    /// An episode under synchronisation has no registered parcels at all.
    /// This should never happen for a card that was registered first.
    #[error("no parcels registered for episode {0}")]
    EmptyEpisode(EpisodeId),

    /// The execution grant did not arrive before the deadline.
    #[error("execution grant timed out after {0:?}")]
    GrantTimedOut(Duration),

    /// The job card was already marked for discard.
    #[error("job card is marked for discard")]
    Discarded,

    /// A required component was not supplied to the builder.
    #[error("missing required component: {0}")]
    MissingComponent(&'static str),

    /// Underlying matrix failure.
    #[error(transparent)]
    Matrix(#[from] cartage_matrix::MatrixError),
}

/// Result type for control-plane operations.
pub type ControlResult<T> = Result<T, ControlError>;
