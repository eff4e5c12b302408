//! Activity identifiers.
//!
//! An [`ActivityId`] names one hop of work: the processor instance that
//! produced the packet and the processor instance now handling it. Each
//! ingress stage creates a fresh activity by chaining the outgoing
//! activity's "present" fields into the new activity's "previous" fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{EpisodeId, ParcelId, WupFunctionToken, WupInstanceId};

/// Identifies one hop of work through the pipeline.
///
/// Immutable after creation, except that the present parcel and episode
/// identifiers may be unset at construction and are assigned once known
/// during registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityId {
    /// Parcel of the upstream hop, if any.
    pub previous_parcel_id: Option<ParcelId>,

    /// Episode of the upstream hop, if any.
    pub previous_episode_id: Option<EpisodeId>,

    /// Function of the upstream processor, if any.
    pub previous_wup_function: Option<WupFunctionToken>,

    /// Instance of the upstream processor, if any.
    pub previous_wup_instance: Option<WupInstanceId>,

    /// Parcel of this hop; assigned during registration.
    pub present_parcel_id: Option<ParcelId>,

    /// Episode of this hop; assigned during registration when not supplied
    /// upstream.
    pub present_episode_id: Option<EpisodeId>,

    /// Function of the processor handling this hop.
    pub present_wup_function: WupFunctionToken,

    /// Instance of the processor handling this hop.
    pub present_wup_instance: WupInstanceId,

    /// When this activity was created.
    pub created_at: DateTime<Utc>,
}

impl ActivityId {
    /// Create the first activity of a pipeline traversal (no upstream hop).
    pub fn new(function: WupFunctionToken, instance: WupInstanceId) -> Self {
        Self {
            previous_parcel_id: None,
            previous_episode_id: None,
            previous_wup_function: None,
            previous_wup_instance: None,
            present_parcel_id: None,
            present_episode_id: None,
            present_wup_function: function,
            present_wup_instance: instance,
            created_at: Utc::now(),
        }
    }

    /// Create the activity for the next hop, chaining the outgoing
    /// activity's present fields into the new activity's previous fields.
    pub fn continuation(
        outgoing: &ActivityId,
        function: WupFunctionToken,
        instance: WupInstanceId,
    ) -> Self {
        Self {
            previous_parcel_id: outgoing.present_parcel_id.clone(),
            previous_episode_id: outgoing.present_episode_id.clone(),
            previous_wup_function: Some(outgoing.present_wup_function.clone()),
            previous_wup_instance: Some(outgoing.present_wup_instance.clone()),
            present_parcel_id: None,
            present_episode_id: None,
            present_wup_function: function,
            present_wup_instance: instance,
            created_at: Utc::now(),
        }
    }

    /// Assign the present parcel identifier. Assigned once; later calls with
    /// a parcel already in place leave the original untouched.
    pub fn assign_present_parcel(&mut self, parcel_id: ParcelId) {
        if self.present_parcel_id.is_none() {
            self.present_parcel_id = Some(parcel_id);
        }
    }

    /// Assign the present episode identifier. Assigned once, as above.
    pub fn assign_present_episode(&mut self, episode_id: EpisodeId) {
        if self.present_episode_id.is_none() {
            self.present_episode_id = Some(episode_id);
        }
    }
}
