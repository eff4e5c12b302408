//! Status element store, episode index, and focus arbitration.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, info};

use cartage_types::{
    ActivityId, EpisodeId, ParcelId, ParcelProcessingStatus, ParcelStatusElement,
};

use crate::error::{MatrixError, MatrixResult};

/// A status element shared by reference, so every fetch observes the same
/// mutually-exclusive view.
pub type SharedStatusElement = Arc<RwLock<ParcelStatusElement>>;

/// Which focus kind an arbitration call operates on.
#[derive(Clone, Copy, PartialEq, Eq)]
enum FocusKind {
    SystemWide,
    Cluster,
}

/// Tracks status elements per parcel and arbitrates focus per episode.
pub struct ActivityMatrix {
    /// Status elements keyed by parcel.
    elements: DashMap<ParcelId, SharedStatusElement>,

    /// Parcels registered under each episode. Grows as parcels register;
    /// shrinks only through [`ActivityMatrix::evict`].
    episodes: DashMap<EpisodeId, HashSet<ParcelId>>,

    /// Serialises the check-then-set sequence of focus arbitration so two
    /// concurrent grants can never leave an episode with two holders.
    focus: Mutex<()>,
}

impl ActivityMatrix {
    /// Create an empty matrix.
    pub fn new() -> Self {
        Self {
            elements: DashMap::new(),
            episodes: DashMap::new(),
            focus: Mutex::new(()),
        }
    }

    /// Register a work-unit activity, idempotently.
    ///
    /// If an element already exists for the activity's parcel and the
    /// activity describes the same registration (same parcel, episode,
    /// processor instance, processor function, and upstream episode), the
    /// existing element's status is updated in place and the same element is
    /// returned. A differing activity for the same parcel key replaces the
    /// element. The episode index always ends up containing the
    /// (episode → parcel) pair.
    pub fn add_activity(
        &self,
        activity: &ActivityId,
        initial_status: ParcelProcessingStatus,
    ) -> MatrixResult<SharedStatusElement> {
        let parcel_id = activity
            .present_parcel_id
            .clone()
            .ok_or(MatrixError::IncompleteActivity)?;
        let episode_id = activity
            .present_episode_id
            .clone()
            .ok_or(MatrixError::IncompleteActivity)?;

        let element = match self.elements.entry(parcel_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                let existing = occupied.get().clone();
                let same_registration = existing
                    .read()
                    .unwrap()
                    .matches_registration(activity);

                if same_registration {
                    existing.write().unwrap().status = initial_status;
                    debug!(
                        parcel_id = %parcel_id,
                        status = %initial_status,
                        "activity re-registered, status updated in place"
                    );
                    existing
                } else {
                    let replacement: SharedStatusElement =
                        Arc::new(RwLock::new(ParcelStatusElement::new(
                            parcel_id.clone(),
                            activity.clone(),
                            initial_status,
                        )));
                    occupied.insert(replacement.clone());
                    debug!(
                        parcel_id = %parcel_id,
                        episode_id = %episode_id,
                        "status element replaced for re-keyed activity"
                    );
                    replacement
                }
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let created: SharedStatusElement =
                    Arc::new(RwLock::new(ParcelStatusElement::new(
                        parcel_id.clone(),
                        activity.clone(),
                        initial_status,
                    )));
                vacant.insert(created.clone());
                debug!(
                    parcel_id = %parcel_id,
                    episode_id = %episode_id,
                    "status element created"
                );
                created
            }
        };

        self.episodes
            .entry(episode_id)
            .or_default()
            .insert(parcel_id);

        Ok(element)
    }

    /// Set the status for an activity, registering it first when absent.
    pub fn update_activity(
        &self,
        activity: &ActivityId,
        status: ParcelProcessingStatus,
    ) -> MatrixResult<SharedStatusElement> {
        let parcel_id = activity
            .present_parcel_id
            .as_ref()
            .ok_or(MatrixError::IncompleteActivity)?;

        match self.status_element(parcel_id) {
            Some(element) => {
                element.write().unwrap().status = status;
                Ok(element)
            }
            None => self.add_activity(activity, status),
        }
    }

    /// The status element for a parcel, if tracked.
    pub fn status_element(&self, parcel_id: &ParcelId) -> Option<SharedStatusElement> {
        self.elements.get(parcel_id).map(|e| e.clone())
    }

    /// All status elements for parcels registered under an episode.
    pub fn episode_elements(&self, episode_id: &EpisodeId) -> Vec<SharedStatusElement> {
        let Some(members) = self.episodes.get(episode_id) else {
            return Vec::new();
        };
        members
            .iter()
            .filter_map(|parcel_id| self.status_element(parcel_id))
            .collect()
    }

    /// The parcel holding system-wide focus for an episode, if any.
    pub fn system_wide_focus(&self, episode_id: &EpisodeId) -> Option<ParcelId> {
        self.focus_holder(episode_id, FocusKind::SystemWide)
    }

    /// The parcel holding cluster focus for an episode, if any.
    pub fn cluster_focus(&self, episode_id: &EpisodeId) -> Option<ParcelId> {
        self.focus_holder(episode_id, FocusKind::Cluster)
    }

    /// Grant system-wide focus to a parcel, revoking it from any other
    /// parcel in the episode first. No-op when the parcel already holds it.
    pub fn set_system_wide_focus(
        &self,
        episode_id: &EpisodeId,
        parcel_id: &ParcelId,
    ) -> MatrixResult<()> {
        self.transfer_focus(episode_id, parcel_id, FocusKind::SystemWide)
    }

    /// Grant cluster focus; symmetric to
    /// [`ActivityMatrix::set_system_wide_focus`].
    pub fn set_cluster_focus(
        &self,
        episode_id: &EpisodeId,
        parcel_id: &ParcelId,
    ) -> MatrixResult<()> {
        self.transfer_focus(episode_id, parcel_id, FocusKind::Cluster)
    }

    /// Flag whether the surrounding transport should re-drive a parcel's
    /// work. The matrix only records the signal; it never retries anything
    /// itself.
    pub fn set_requires_retry(&self, parcel_id: &ParcelId, requires_retry: bool) -> MatrixResult<()> {
        let element = self
            .status_element(parcel_id)
            .ok_or_else(|| MatrixError::ElementNotFound(parcel_id.clone()))?;
        element.write().unwrap().requires_retry = requires_retry;
        Ok(())
    }

    /// Collect the parcels whose tracking has aged out.
    ///
    /// Finalised parcels become candidates once older than the retention
    /// cutoff; parcels still moving through the lifecycle once older than
    /// the activity timeout; failed parcels (and anything outside the
    /// recognised forward path) immediately. The caller purges the returned
    /// parcels from both this matrix and the parcel cache.
    pub fn sweep_aged(&self, retention: Duration, activity_timeout: Duration) -> Vec<ParcelId> {
        let now = Utc::now();
        let retention_cutoff = now - chrono_duration(retention);
        let timeout_cutoff = now - chrono_duration(activity_timeout);

        let mut candidates = Vec::new();
        for entry in self.elements.iter() {
            let element = entry.value().read().unwrap();
            let aged_out = match element.status {
                ParcelProcessingStatus::Finalised
                | ParcelProcessingStatus::FinalisedElsewhere => {
                    element.entered_at < retention_cutoff
                }
                ParcelProcessingStatus::Registered
                | ParcelProcessingStatus::Initiated
                | ParcelProcessingStatus::Active
                | ParcelProcessingStatus::Finished
                | ParcelProcessingStatus::FinishedElsewhere => {
                    element.entered_at < timeout_cutoff
                }
                // Failed work and anything outside the recognised forward
                // path is collected immediately.
                ParcelProcessingStatus::Failed | ParcelProcessingStatus::ActiveElsewhere => true,
            };
            if aged_out {
                candidates.push(element.parcel_id.clone());
            }
        }

        if !candidates.is_empty() {
            debug!(count = candidates.len(), "aging sweep collected candidates");
        }
        candidates
    }

    /// Drop a parcel's status element and its episode-index entry.
    pub fn evict(&self, parcel_id: &ParcelId) -> Option<SharedStatusElement> {
        let (_, element) = self.elements.remove(parcel_id)?;

        let episode_id = element
            .read()
            .unwrap()
            .activity_id
            .present_episode_id
            .clone();
        if let Some(episode_id) = episode_id {
            let mut drop_episode = false;
            if let Some(mut members) = self.episodes.get_mut(&episode_id) {
                members.remove(parcel_id);
                drop_episode = members.is_empty();
            }
            if drop_episode {
                self.episodes.remove(&episode_id);
            }
        }

        debug!(parcel_id = %parcel_id, "status element evicted");
        Some(element)
    }

    /// Number of tracked status elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the matrix tracks no parcels.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    fn focus_holder(&self, episode_id: &EpisodeId, kind: FocusKind) -> Option<ParcelId> {
        self.episode_elements(episode_id).into_iter().find_map(|e| {
            let element = e.read().unwrap();
            let holds = match kind {
                FocusKind::SystemWide => element.has_system_wide_focus,
                FocusKind::Cluster => element.has_cluster_focus,
            };
            holds.then(|| element.parcel_id.clone())
        })
    }

    fn transfer_focus(
        &self,
        episode_id: &EpisodeId,
        parcel_id: &ParcelId,
        kind: FocusKind,
    ) -> MatrixResult<()> {
        // One critical section for the whole revoke-then-grant sequence.
        let _guard = self.focus.lock().unwrap();

        let target = self
            .status_element(parcel_id)
            .ok_or_else(|| MatrixError::ElementNotFound(parcel_id.clone()))?;

        {
            let element = target.read().unwrap();
            let already_holds = match kind {
                FocusKind::SystemWide => element.has_system_wide_focus,
                FocusKind::Cluster => element.has_cluster_focus,
            };
            if already_holds {
                return Ok(());
            }
        }

        for other in self.episode_elements(episode_id) {
            let mut element = other.write().unwrap();
            if element.parcel_id == *parcel_id {
                continue;
            }
            let flag = match kind {
                FocusKind::SystemWide => &mut element.has_system_wide_focus,
                FocusKind::Cluster => &mut element.has_cluster_focus,
            };
            if *flag {
                *flag = false;
                info!(
                    episode_id = %episode_id,
                    parcel_id = %element.parcel_id,
                    "focus revoked"
                );
            }
        }

        {
            let mut element = target.write().unwrap();
            match kind {
                FocusKind::SystemWide => element.has_system_wide_focus = true,
                FocusKind::Cluster => element.has_cluster_focus = true,
            }
        }
        info!(episode_id = %episode_id, parcel_id = %parcel_id, "focus granted");

        Ok(())
    }
}

impl Default for ActivityMatrix {
    fn default() -> Self {
        Self::new()
    }
}

fn chrono_duration(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::max_value())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartage_types::{WupFunctionToken, WupInstanceId};
    use semver::Version;

    fn activity(episode: &EpisodeId) -> ActivityId {
        let mut activity = ActivityId::new(
            WupFunctionToken::new("ingest", Version::new(1, 0, 0)),
            WupInstanceId::generate(),
        );
        activity.assign_present_parcel(ParcelId::generate());
        activity.assign_present_episode(episode.clone());
        activity
    }

    fn backdate(element: &SharedStatusElement, seconds: i64) {
        element.write().unwrap().entered_at = Utc::now() - chrono::Duration::seconds(seconds);
    }

    #[test]
    fn test_add_activity_requires_present_identifiers() {
        let matrix = ActivityMatrix::new();
        let incomplete = ActivityId::new(
            WupFunctionToken::new("ingest", Version::new(1, 0, 0)),
            WupInstanceId::generate(),
        );

        assert!(matches!(
            matrix.add_activity(&incomplete, ParcelProcessingStatus::Registered),
            Err(MatrixError::IncompleteActivity)
        ));
    }

    #[test]
    fn test_identical_activity_updates_in_place() {
        let matrix = ActivityMatrix::new();
        let episode = EpisodeId::generate();
        let activity = activity(&episode);

        let first = matrix
            .add_activity(&activity, ParcelProcessingStatus::Registered)
            .unwrap();
        let second = matrix
            .add_activity(&activity, ParcelProcessingStatus::Active)
            .unwrap();

        // Same element, status updated in place.
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(
            first.read().unwrap().status,
            ParcelProcessingStatus::Active
        );
        assert_eq!(matrix.len(), 1);
    }

    #[test]
    fn test_differing_activity_replaces_element() {
        let matrix = ActivityMatrix::new();
        let episode = EpisodeId::generate();
        let original = activity(&episode);

        let first = matrix
            .add_activity(&original, ParcelProcessingStatus::Registered)
            .unwrap();

        // Same parcel key, different episode: a different registration.
        let mut rekeyed = original.clone();
        rekeyed.present_episode_id = Some(EpisodeId::generate());
        let second = matrix
            .add_activity(&rekeyed, ParcelProcessingStatus::Registered)
            .unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        let parcel_id = original.present_parcel_id.unwrap();
        assert!(Arc::ptr_eq(
            &matrix.status_element(&parcel_id).unwrap(),
            &second
        ));
    }

    #[test]
    fn test_update_activity_registers_when_absent() {
        let matrix = ActivityMatrix::new();
        let episode = EpisodeId::generate();
        let activity = activity(&episode);

        let element = matrix
            .update_activity(&activity, ParcelProcessingStatus::Active)
            .unwrap();
        assert_eq!(
            element.read().unwrap().status,
            ParcelProcessingStatus::Active
        );
        assert_eq!(matrix.episode_elements(&episode).len(), 1);
    }

    #[test]
    fn test_at_most_one_focus_holder() {
        let matrix = ActivityMatrix::new();
        let episode = EpisodeId::generate();

        let first = activity(&episode);
        let second = activity(&episode);
        matrix
            .add_activity(&first, ParcelProcessingStatus::Registered)
            .unwrap();
        matrix
            .add_activity(&second, ParcelProcessingStatus::Registered)
            .unwrap();

        let first_parcel = first.present_parcel_id.clone().unwrap();
        let second_parcel = second.present_parcel_id.clone().unwrap();

        matrix.set_system_wide_focus(&episode, &first_parcel).unwrap();
        assert_eq!(matrix.system_wide_focus(&episode), Some(first_parcel.clone()));

        matrix.set_system_wide_focus(&episode, &second_parcel).unwrap();
        assert_eq!(
            matrix.system_wide_focus(&episode),
            Some(second_parcel.clone())
        );

        let holders: usize = matrix
            .episode_elements(&episode)
            .iter()
            .filter(|e| e.read().unwrap().has_system_wide_focus)
            .count();
        assert_eq!(holders, 1);

        // Cluster focus is arbitrated independently.
        assert_eq!(matrix.cluster_focus(&episode), None);
        matrix.set_cluster_focus(&episode, &first_parcel).unwrap();
        assert_eq!(matrix.cluster_focus(&episode), Some(first_parcel));
        assert_eq!(matrix.system_wide_focus(&episode), Some(second_parcel));
    }

    #[test]
    fn test_focus_grant_is_idempotent() {
        let matrix = ActivityMatrix::new();
        let episode = EpisodeId::generate();
        let activity = activity(&episode);
        matrix
            .add_activity(&activity, ParcelProcessingStatus::Registered)
            .unwrap();
        let parcel = activity.present_parcel_id.unwrap();

        matrix.set_system_wide_focus(&episode, &parcel).unwrap();
        matrix.set_system_wide_focus(&episode, &parcel).unwrap();
        assert_eq!(matrix.system_wide_focus(&episode), Some(parcel));
    }

    #[test]
    fn test_focus_for_untracked_parcel_is_an_error() {
        let matrix = ActivityMatrix::new();
        let episode = EpisodeId::generate();

        assert!(matches!(
            matrix.set_system_wide_focus(&episode, &ParcelId::generate()),
            Err(MatrixError::ElementNotFound(_))
        ));
    }

    #[test]
    fn test_requires_retry_signal() {
        let matrix = ActivityMatrix::new();
        let episode = EpisodeId::generate();
        let activity = activity(&episode);
        let element = matrix
            .add_activity(&activity, ParcelProcessingStatus::Failed)
            .unwrap();
        let parcel = activity.present_parcel_id.unwrap();

        matrix.set_requires_retry(&parcel, true).unwrap();
        assert!(element.read().unwrap().requires_retry);

        assert!(matches!(
            matrix.set_requires_retry(&ParcelId::generate(), true),
            Err(MatrixError::ElementNotFound(_))
        ));
    }

    #[test]
    fn test_sweep_classification() {
        let matrix = ActivityMatrix::new();
        let retention = Duration::from_secs(600);
        let timeout = Duration::from_secs(60);

        let statuses = [
            ParcelProcessingStatus::Registered,
            ParcelProcessingStatus::Initiated,
            ParcelProcessingStatus::Active,
            ParcelProcessingStatus::ActiveElsewhere,
            ParcelProcessingStatus::Finished,
            ParcelProcessingStatus::FinishedElsewhere,
            ParcelProcessingStatus::Finalised,
            ParcelProcessingStatus::FinalisedElsewhere,
            ParcelProcessingStatus::Failed,
        ];

        let episode = EpisodeId::generate();
        let mut by_status = std::collections::HashMap::new();
        for status in statuses {
            let activity = activity(&episode);
            let element = matrix.add_activity(&activity, status).unwrap();
            by_status.insert(status, (activity.present_parcel_id.unwrap(), element));
        }

        // Everything fresh: only failed work and the unrecognised
        // active-elsewhere grouping age out immediately.
        let immediate: HashSet<ParcelId> =
            matrix.sweep_aged(retention, timeout).into_iter().collect();
        assert_eq!(immediate.len(), 2);
        assert!(immediate.contains(&by_status[&ParcelProcessingStatus::Failed].0));
        assert!(immediate.contains(&by_status[&ParcelProcessingStatus::ActiveElsewhere].0));

        // Older than the activity timeout but younger than retention: the
        // in-flight statuses join, the finalised ones do not.
        for (_, element) in by_status.values() {
            backdate(element, 120);
        }
        let after_timeout: HashSet<ParcelId> =
            matrix.sweep_aged(retention, timeout).into_iter().collect();
        assert_eq!(after_timeout.len(), 7);
        assert!(!after_timeout.contains(&by_status[&ParcelProcessingStatus::Finalised].0));
        assert!(
            !after_timeout.contains(&by_status[&ParcelProcessingStatus::FinalisedElsewhere].0)
        );

        // Older than retention: everything is collected.
        for (_, element) in by_status.values() {
            backdate(element, 1200);
        }
        assert_eq!(matrix.sweep_aged(retention, timeout).len(), 9);
    }

    #[test]
    fn test_evict_drops_element_and_index_entry() {
        let matrix = ActivityMatrix::new();
        let episode = EpisodeId::generate();
        let activity = activity(&episode);
        matrix
            .add_activity(&activity, ParcelProcessingStatus::Finalised)
            .unwrap();
        let parcel = activity.present_parcel_id.unwrap();

        assert!(matrix.evict(&parcel).is_some());
        assert!(matrix.status_element(&parcel).is_none());
        assert!(matrix.episode_elements(&episode).is_empty());
        assert!(matrix.evict(&parcel).is_none());
    }
}
