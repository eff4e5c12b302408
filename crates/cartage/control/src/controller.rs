//! Activity services controller.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Notify;
use tracing::{info, warn};

use cartage_finalisation::EpisodeFinalisationRegistry;
use cartage_matrix::{ActivityMatrix, SharedStatusElement};
use cartage_types::{
    EpisodeId, JobCardStatus, NodeId, ParcelId, TopologyLookup, WupFunctionToken, WupJobCard,
};

use crate::config::SyncConfig;
use crate::error::{ControlError, ControlResult};
use crate::strategy::{strategy_for, ResilienceStrategy};

/// Orchestrates activity registration and job-card synchronisation for the
/// local node, dispatching on its resilience and concurrency modes.
pub struct ActivityServicesController {
    node_id: NodeId,
    matrix: Arc<ActivityMatrix>,
    topology: Arc<dyn TopologyLookup>,
    finalisation: Arc<EpisodeFinalisationRegistry>,
    sync_config: SyncConfig,

    /// Wakes cards waiting for an execution grant after each
    /// synchronisation pass.
    grant_wakeup: Notify,
}

impl ActivityServicesController {
    pub fn new(
        node_id: NodeId,
        matrix: Arc<ActivityMatrix>,
        topology: Arc<dyn TopologyLookup>,
        finalisation: Arc<EpisodeFinalisationRegistry>,
        sync_config: SyncConfig,
    ) -> Self {
        Self {
            node_id,
            matrix,
            topology,
            finalisation,
            sync_config,
            grant_wakeup: Notify::new(),
        }
    }

    /// Register a new work-unit activity, behaving per the local node's
    /// deployment modes.
    pub fn register_new_activity(
        &self,
        card: &WupJobCard,
    ) -> ControlResult<SharedStatusElement> {
        let element = self.strategy()?.register_activity(&self.matrix, card)?;
        info!(
            node_id = %self.node_id,
            parcel_id = %element.read().unwrap().parcel_id,
            "work-unit activity registered"
        );
        Ok(element)
    }

    /// Synchronise a job card against the matrix, granting or denying its
    /// requested status, then wake any waiting cards.
    pub fn synchronise_job_card(&self, card: &mut WupJobCard) -> ControlResult<()> {
        let outcome = self.strategy()?.synchronise_job_card(&self.matrix, card);
        self.grant_wakeup.notify_waiters();
        outcome
    }

    /// The status element for a parcel, if tracked.
    pub fn status_element(&self, parcel_id: &ParcelId) -> Option<SharedStatusElement> {
        self.matrix.status_element(parcel_id)
    }

    /// Record that a downstream function is expected to consume an
    /// episode's output.
    pub fn register_downstream_interest(
        &self,
        episode_id: &EpisodeId,
        wup_function: &WupFunctionToken,
    ) {
        self.finalisation
            .register_downstream_interest(episode_id, wup_function);
    }

    /// Wait until the card is granted execution, bounded by the configured
    /// grant timeout.
    ///
    /// Each pass requests execution and synchronises; denied cards park on
    /// the grant wake-up and re-check at the poll interval. On grant the
    /// card's current status moves to executing. On timeout the card is
    /// cancelled and marked for discard. A card already marked for discard
    /// is rejected without waiting.
    pub async fn await_execution_grant(&self, card: &mut WupJobCard) -> ControlResult<()> {
        if card.to_be_discarded {
            return Err(ControlError::Discarded);
        }

        let deadline = tokio::time::Instant::now() + self.sync_config.grant_timeout;
        loop {
            card.request(JobCardStatus::Executing);
            self.synchronise_job_card(card)?;

            if card.execution_granted() {
                card.current_status = JobCardStatus::Executing;
                card.updated_at = Utc::now();
                return Ok(());
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                warn!(
                    node_id = %self.node_id,
                    "execution grant timed out, cancelling job card"
                );
                card.current_status = JobCardStatus::Canceled;
                card.mark_discarded();
                return Err(ControlError::GrantTimedOut(self.sync_config.grant_timeout));
            }

            let poll = std::cmp::min(self.sync_config.poll_interval, deadline - now);
            tokio::select! {
                _ = self.grant_wakeup.notified() => {}
                _ = tokio::time::sleep(poll) => {}
            }
        }
    }

    fn strategy(&self) -> ControlResult<&'static dyn ResilienceStrategy> {
        let resilience = self
            .topology
            .resilience_mode(&self.node_id)
            .ok_or_else(|| ControlError::UnknownNode(self.node_id.clone()))?;
        let concurrency = self
            .topology
            .concurrency_mode(&self.node_id)
            .ok_or_else(|| ControlError::UnknownNode(self.node_id.clone()))?;
        Ok(strategy_for(resilience, concurrency))
    }
}
