//! Concurrent parcel cache.
//!
//! The durable in-process store of resilience parcels. Map-level operations
//! are individually atomic; cross-entry invariants are the callers'
//! responsibility.

pub mod error;
pub mod parcel_cache;

pub use error::{CacheError, CacheResult};
pub use parcel_cache::ParcelCache;
