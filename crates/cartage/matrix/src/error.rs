//! Error types for cartage-matrix.

use cartage_types::ParcelId;
use thiserror::Error;

/// Errors that can occur against the activity matrix.
#[derive(Debug, Error)]
pub enum MatrixError {
    /// The activity has no present parcel or episode identifier yet.
    #[error("activity is missing its present parcel or episode identifier")]
    IncompleteActivity,

    /// No status element is tracked for the parcel.
    #[error("status element not found: {0}")]
    ElementNotFound(ParcelId),
}

/// Result type for matrix operations.
pub type MatrixResult<T> = Result<T, MatrixError>;
