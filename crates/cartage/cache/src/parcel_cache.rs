//! In-process parcel store.

use dashmap::DashMap;
use tracing::debug;

use cartage_types::{
    EpisodeId, ParcelId, ParcelProcessingStatus, ResilienceParcel, UowTypeId, WupInstanceId,
};

use crate::error::{CacheError, CacheResult};

/// Keyed store of resilience parcels.
///
/// All operations are simple map operations; no cross-entry invariants are
/// enforced here.
pub struct ParcelCache {
    parcels: DashMap<ParcelId, ResilienceParcel>,
}

impl ParcelCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            parcels: DashMap::new(),
        }
    }

    /// Store a parcel, replacing any existing entry under the same key.
    pub fn add(&self, parcel: ResilienceParcel) {
        debug!(parcel_id = %parcel.parcel_id, "parcel added to cache");
        self.parcels.insert(parcel.parcel_id.clone(), parcel);
    }

    /// Fetch a parcel by id.
    pub fn get(&self, parcel_id: &ParcelId) -> Option<ResilienceParcel> {
        self.parcels.get(parcel_id).map(|p| p.clone())
    }

    /// Remove a parcel, returning it if present.
    pub fn remove(&self, parcel_id: &ParcelId) -> Option<ResilienceParcel> {
        let removed = self.parcels.remove(parcel_id).map(|(_, p)| p);
        if removed.is_some() {
            debug!(parcel_id = %parcel_id, "parcel removed from cache");
        }
        removed
    }

    /// Replace a stored parcel. The parcel must already be present.
    pub fn update(&self, parcel: ResilienceParcel) -> CacheResult<()> {
        if !self.parcels.contains_key(&parcel.parcel_id) {
            return Err(CacheError::ParcelNotFound(parcel.parcel_id));
        }
        self.parcels.insert(parcel.parcel_id.clone(), parcel);
        Ok(())
    }

    /// All parcels currently in the given lifecycle state.
    pub fn list_by_status(&self, status: ParcelProcessingStatus) -> Vec<ResilienceParcel> {
        self.parcels
            .iter()
            .filter(|entry| entry.processing_status == status)
            .map(|entry| entry.clone())
            .collect()
    }

    /// All parcels belonging to the given episode.
    pub fn list_by_episode(&self, episode_id: &EpisodeId) -> Vec<ResilienceParcel> {
        self.parcels
            .iter()
            .filter(|entry| entry.episode_id == *episode_id)
            .map(|entry| entry.clone())
            .collect()
    }

    /// The parcel a processor instance currently holds for a unit-of-work
    /// type, if any.
    ///
    /// Linear scan; used to keep registration idempotent per
    /// (instance, type) pair.
    pub fn find_current_for_wup(
        &self,
        wup_instance_id: &WupInstanceId,
        uow_type: &UowTypeId,
    ) -> Option<ResilienceParcel> {
        self.parcels
            .iter()
            .find(|entry| {
                entry.wup_instance_id == *wup_instance_id && entry.type_id == *uow_type
            })
            .map(|entry| entry.clone())
    }

    /// Number of parcels currently stored.
    pub fn len(&self) -> usize {
        self.parcels.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.parcels.is_empty()
    }
}

impl Default for ParcelCache {
    fn default() -> Self {
        Self::new()
    }
}
