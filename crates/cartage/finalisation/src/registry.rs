//! Downstream-interest tracking.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use cartage_types::{EpisodeId, WupFunctionToken};

/// Whether a downstream function has registered its successor episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownstreamRegistrationStatus {
    /// The function is expected to consume the episode's output but has not
    /// registered a successor episode yet.
    NotRegistered,
    /// The function has registered its successor episode.
    Registered,
}

/// Per downstream-function record of take-over progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownstreamRegistration {
    /// The downstream processor function.
    pub wup_function: WupFunctionToken,

    /// The successor episode the function registered, once known.
    pub downstream_episode_id: Option<EpisodeId>,

    /// Take-over state.
    pub status: DownstreamRegistrationStatus,
}

impl DownstreamRegistration {
    fn interested(wup_function: WupFunctionToken) -> Self {
        Self {
            wup_function,
            downstream_episode_id: None,
            status: DownstreamRegistrationStatus::NotRegistered,
        }
    }
}

/// The registry's two maps, guarded together: they must always be updated
/// as a pair.
#[derive(Default)]
struct RegistryInner {
    /// Registration state per downstream function.
    registrations: HashMap<WupFunctionToken, DownstreamRegistration>,

    /// Downstream functions interested in each upstream episode.
    interests: HashMap<EpisodeId, HashSet<WupFunctionToken>>,
}

/// Tracks which downstream functions still owe an upstream episode a
/// successor registration.
#[derive(Default)]
pub struct EpisodeFinalisationRegistry {
    inner: Mutex<RegistryInner>,
}

impl EpisodeFinalisationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a downstream function is expected to consume the
    /// episode's output. Idempotent.
    pub fn register_downstream_interest(
        &self,
        episode_id: &EpisodeId,
        wup_function: &WupFunctionToken,
    ) {
        let mut inner = self.inner.lock().unwrap();

        inner
            .registrations
            .entry(wup_function.clone())
            .or_insert_with(|| DownstreamRegistration::interested(wup_function.clone()));
        let newly_interested = inner
            .interests
            .entry(episode_id.clone())
            .or_default()
            .insert(wup_function.clone());

        if newly_interested {
            debug!(
                episode_id = %episode_id,
                wup_function = %wup_function,
                "downstream interest registered"
            );
        }
    }

    /// Record that a downstream function has taken over with its own
    /// successor episode. Registers the interest first when missing.
    pub fn register_downstream_episode(
        &self,
        original_episode_id: &EpisodeId,
        wup_function: &WupFunctionToken,
        downstream_episode_id: EpisodeId,
    ) {
        let mut inner = self.inner.lock().unwrap();

        inner
            .interests
            .entry(original_episode_id.clone())
            .or_default()
            .insert(wup_function.clone());

        let registration = inner
            .registrations
            .entry(wup_function.clone())
            .or_insert_with(|| DownstreamRegistration::interested(wup_function.clone()));
        registration.downstream_episode_id = Some(downstream_episode_id.clone());
        registration.status = DownstreamRegistrationStatus::Registered;

        info!(
            episode_id = %original_episode_id,
            wup_function = %wup_function,
            downstream_episode_id = %downstream_episode_id,
            "downstream episode registered"
        );
    }

    /// Whether every downstream function interested in the episode has
    /// registered a successor episode. Vacuously true when no interest was
    /// ever registered.
    pub fn is_finalised(&self, episode_id: &EpisodeId) -> bool {
        let inner = self.inner.lock().unwrap();

        let Some(interested) = inner.interests.get(episode_id) else {
            return true;
        };

        interested.iter().all(|function| {
            inner
                .registrations
                .get(function)
                .map(|r| r.status == DownstreamRegistrationStatus::Registered)
                .unwrap_or(false)
        })
    }

    /// The registration record for a downstream function, if any.
    pub fn registration(
        &self,
        wup_function: &WupFunctionToken,
    ) -> Option<DownstreamRegistration> {
        self.inner
            .lock()
            .unwrap()
            .registrations
            .get(wup_function)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semver::Version;

    fn function(name: &str) -> WupFunctionToken {
        WupFunctionToken::new(name, Version::new(1, 0, 0))
    }

    #[test]
    fn test_untracked_episode_is_vacuously_finalised() {
        let registry = EpisodeFinalisationRegistry::new();
        assert!(registry.is_finalised(&EpisodeId::generate()));
    }

    #[test]
    fn test_finalisation_follows_downstream_takeover() {
        let registry = EpisodeFinalisationRegistry::new();
        let episode = EpisodeId::generate();
        let transform = function("transform");
        let forward = function("forward");

        registry.register_downstream_interest(&episode, &transform);
        registry.register_downstream_interest(&episode, &forward);
        assert!(!registry.is_finalised(&episode));

        registry.register_downstream_episode(&episode, &transform, EpisodeId::generate());
        assert!(!registry.is_finalised(&episode));

        registry.register_downstream_episode(&episode, &forward, EpisodeId::generate());
        assert!(registry.is_finalised(&episode));
    }

    #[test]
    fn test_interest_registration_is_idempotent() {
        let registry = EpisodeFinalisationRegistry::new();
        let episode = EpisodeId::generate();
        let transform = function("transform");

        registry.register_downstream_interest(&episode, &transform);
        registry.register_downstream_interest(&episode, &transform);
        assert!(!registry.is_finalised(&episode));

        registry.register_downstream_episode(&episode, &transform, EpisodeId::generate());
        assert!(registry.is_finalised(&episode));
    }

    #[test]
    fn test_downstream_episode_registers_interest_first() {
        let registry = EpisodeFinalisationRegistry::new();
        let episode = EpisodeId::generate();
        let transform = function("transform");
        let successor = EpisodeId::generate();

        // No prior interest call: the take-over registers it on the way.
        registry.register_downstream_episode(&episode, &transform, successor.clone());

        assert!(registry.is_finalised(&episode));
        let registration = registry.registration(&transform).unwrap();
        assert_eq!(registration.downstream_episode_id, Some(successor));
        assert_eq!(
            registration.status,
            DownstreamRegistrationStatus::Registered
        );
    }
}
