//! Error types for cartage-services.

use cartage_types::ParcelId;
use thiserror::Error;

/// Errors that can occur in parcel lifecycle operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The parcel a notification refers to is not in the cache.
    #[error("parcel not found: {0}")]
    ParcelNotFound(ParcelId),

    /// Underlying cache failure.
    #[error(transparent)]
    Cache(#[from] cartage_cache::CacheError),
}

/// Result type for parcel lifecycle operations.
pub type ServiceResult<T> = Result<T, ServiceError>;
