//! Mode strategies.
//!
//! Registration and synchronisation behavior depends on the node's
//! resilience and concurrency modes. Only the standalone/standalone
//! combination has a complete implementation; every other combination is an
//! explicitly unsupported strategy so a deployment gap surfaces as a typed
//! error instead of silently degrading.

use cartage_matrix::{ActivityMatrix, SharedStatusElement};
use cartage_types::{ConcurrencyMode, ParcelProcessingStatus, ResilienceMode, WupJobCard};
use tracing::debug;

use crate::error::{ControlError, ControlResult};

/// Mode-specific registration and synchronisation behavior.
pub trait ResilienceStrategy: Send + Sync {
    /// Register the card's activity in the matrix.
    fn register_activity(
        &self,
        matrix: &ActivityMatrix,
        card: &WupJobCard,
    ) -> ControlResult<SharedStatusElement>;

    /// Decide whether the card's requested status may be granted.
    fn synchronise_job_card(
        &self,
        matrix: &ActivityMatrix,
        card: &mut WupJobCard,
    ) -> ControlResult<()>;
}

/// Select the strategy for a mode combination.
pub fn strategy_for(
    resilience: ResilienceMode,
    concurrency: ConcurrencyMode,
) -> &'static dyn ResilienceStrategy {
    match (resilience, concurrency) {
        (ResilienceMode::Standalone, ConcurrencyMode::Standalone) => &StandaloneStrategy,
        _ => &UnsupportedModeStrategy,
    }
}

/// The sole complete strategy: a single instance, a single worker.
///
/// With only one registrant by construction, focus is granted to it
/// immediately on registration and synchronisation always grants the
/// requested status.
pub struct StandaloneStrategy;

impl StandaloneStrategy {
    fn tracked_identifiers(
        card: &WupJobCard,
    ) -> ControlResult<(cartage_types::EpisodeId, cartage_types::ParcelId)> {
        let activity = &card.activity_id;
        let parcel_id = activity
            .present_parcel_id
            .clone()
            .ok_or(ControlError::Matrix(
                cartage_matrix::MatrixError::IncompleteActivity,
            ))?;
        let episode_id = activity
            .present_episode_id
            .clone()
            .ok_or(ControlError::Matrix(
                cartage_matrix::MatrixError::IncompleteActivity,
            ))?;
        Ok((episode_id, parcel_id))
    }
}

impl ResilienceStrategy for StandaloneStrategy {
    fn register_activity(
        &self,
        matrix: &ActivityMatrix,
        card: &WupJobCard,
    ) -> ControlResult<SharedStatusElement> {
        let element =
            matrix.add_activity(&card.activity_id, ParcelProcessingStatus::Registered)?;

        // The sole registrant is authoritative at both granularities.
        let (episode_id, parcel_id) = Self::tracked_identifiers(card)?;
        matrix.set_cluster_focus(&episode_id, &parcel_id)?;
        matrix.set_system_wide_focus(&episode_id, &parcel_id)?;

        debug!(
            parcel_id = %parcel_id,
            episode_id = %episode_id,
            "standalone activity registered with immediate focus"
        );
        Ok(element)
    }

    fn synchronise_job_card(
        &self,
        matrix: &ActivityMatrix,
        card: &mut WupJobCard,
    ) -> ControlResult<()> {
        let (episode_id, parcel_id) = Self::tracked_identifiers(card)?;

        if matrix.status_element(&parcel_id).is_none() {
            return Err(ControlError::ElementNotFound(parcel_id));
        }
        if matrix.episode_elements(&episode_id).is_empty() {
            // A card under synchronisation always belongs to a registered
            // episode; an empty parcel set means the stores disagree.
            return Err(ControlError::EmptyEpisode(episode_id));
        }

        matrix.set_cluster_focus(&episode_id, &parcel_id)?;
        matrix.set_system_wide_focus(&episode_id, &parcel_id)?;
        card.grant_requested();

        Ok(())
    }
}

/// Placeholder for the multisite and clustered election strategies, and for
/// any other combination without a complete implementation.
pub struct UnsupportedModeStrategy;

impl UnsupportedModeStrategy {
    fn unsupported(card: &WupJobCard) -> ControlError {
        ControlError::UnsupportedMode {
            resilience: card.resilience_mode,
            concurrency: card.concurrency_mode,
        }
    }
}

impl ResilienceStrategy for UnsupportedModeStrategy {
    fn register_activity(
        &self,
        _matrix: &ActivityMatrix,
        card: &WupJobCard,
    ) -> ControlResult<SharedStatusElement> {
        Err(Self::unsupported(card))
    }

    fn synchronise_job_card(
        &self,
        _matrix: &ActivityMatrix,
        card: &mut WupJobCard,
    ) -> ControlResult<()> {
        Err(Self::unsupported(card))
    }
}
