//! Parcel status elements.
//!
//! The activity matrix's lightweight tracking record for a parcel: its
//! current status, the focus flags that arbitrate ownership between
//! redundant instances, and the retry marker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::ActivityId;
use crate::ids::ParcelId;
use crate::parcel::ParcelProcessingStatus;

/// Live tracking record for one parcel.
///
/// At most one status element exists per parcel at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParcelStatusElement {
    /// Parcel this element tracks.
    pub parcel_id: ParcelId,

    /// Activity the parcel was registered under.
    pub activity_id: ActivityId,

    /// Current lifecycle state.
    pub status: ParcelProcessingStatus,

    /// Whether this parcel is the authoritative instance across the whole
    /// deployment.
    pub has_system_wide_focus: bool,

    /// Whether this parcel is the authoritative instance within its cluster.
    pub has_cluster_focus: bool,

    /// Whether the surrounding transport should re-drive this work.
    pub requires_retry: bool,

    /// When this element was created.
    pub entered_at: DateTime<Utc>,
}

impl ParcelStatusElement {
    /// Create a new element for a registered activity.
    pub fn new(parcel_id: ParcelId, activity_id: ActivityId, status: ParcelProcessingStatus) -> Self {
        Self {
            parcel_id,
            activity_id,
            status,
            has_system_wide_focus: false,
            has_cluster_focus: false,
            requires_retry: false,
            entered_at: Utc::now(),
        }
    }

    /// Whether an activity describes the same registration as the one this
    /// element was created under: same parcel, episode, processor instance,
    /// processor function, and upstream episode.
    pub fn matches_registration(&self, activity: &ActivityId) -> bool {
        let recorded = &self.activity_id;
        recorded.present_parcel_id == activity.present_parcel_id
            && recorded.present_episode_id == activity.present_episode_id
            && recorded.present_wup_instance == activity.present_wup_instance
            && recorded.present_wup_function == activity.present_wup_function
            && recorded.previous_episode_id == activity.previous_episode_id
    }
}
