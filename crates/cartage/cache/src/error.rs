//! Error types for cartage-cache.

use cartage_types::ParcelId;
use thiserror::Error;

/// Errors that can occur against the parcel cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Parcel not present in the cache.
    #[error("parcel not found: {0}")]
    ParcelNotFound(ParcelId),
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
