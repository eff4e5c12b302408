//! Unified control plane.
//!
//! Owns the stores and service layers and exposes them as one wired
//! facade: parcel lifecycle services, activity orchestration, topic
//! routing, and the background aging sweep.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use cartage_cache::ParcelCache;
use cartage_finalisation::EpisodeFinalisationRegistry;
use cartage_matrix::ActivityMatrix;
use cartage_routing::{SubscriptionIndex, TopicRouter};
use cartage_services::ParcelServicesManager;
use cartage_types::NodeId;

use crate::config::SweepConfig;
use crate::controller::ActivityServicesController;
use crate::sweeper::AgingSweeper;

/// The wired control plane for one node.
pub struct ControlPlane {
    node_id: NodeId,
    cache: Arc<ParcelCache>,
    matrix: Arc<ActivityMatrix>,
    finalisation: Arc<EpisodeFinalisationRegistry>,
    subscriptions: Arc<SubscriptionIndex>,
    parcel_services: ParcelServicesManager,
    controller: ActivityServicesController,
    router: TopicRouter,
    sweep_config: SweepConfig,
}

impl ControlPlane {
    pub(crate) fn new(
        node_id: NodeId,
        cache: Arc<ParcelCache>,
        matrix: Arc<ActivityMatrix>,
        finalisation: Arc<EpisodeFinalisationRegistry>,
        subscriptions: Arc<SubscriptionIndex>,
        parcel_services: ParcelServicesManager,
        controller: ActivityServicesController,
        router: TopicRouter,
        sweep_config: SweepConfig,
    ) -> Self {
        Self {
            node_id,
            cache,
            matrix,
            finalisation,
            subscriptions,
            parcel_services,
            controller,
            router,
            sweep_config,
        }
    }

    /// The node this control plane serves.
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// Parcel lifecycle services.
    pub fn parcel_services(&self) -> &ParcelServicesManager {
        &self.parcel_services
    }

    /// Activity orchestration.
    pub fn controller(&self) -> &ActivityServicesController {
        &self.controller
    }

    /// Topic fan-out routing.
    pub fn router(&self) -> &TopicRouter {
        &self.router
    }

    /// The durable parcel store.
    pub fn cache(&self) -> &Arc<ParcelCache> {
        &self.cache
    }

    /// The live status view.
    pub fn matrix(&self) -> &Arc<ActivityMatrix> {
        &self.matrix
    }

    /// Episode finalisation tracking.
    pub fn finalisation(&self) -> &Arc<EpisodeFinalisationRegistry> {
        &self.finalisation
    }

    /// Topic subscription membership.
    pub fn subscriptions(&self) -> &Arc<SubscriptionIndex> {
        &self.subscriptions
    }

    /// Spawn the background aging sweeper. Returns the task handle and the
    /// shutdown sender; send `true` to stop the sweeper.
    pub fn spawn_sweeper(&self) -> (JoinHandle<()>, watch::Sender<bool>) {
        let sweeper = AgingSweeper::new(
            self.matrix.clone(),
            self.cache.clone(),
            self.sweep_config.clone(),
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        (tokio::spawn(sweeper.run(shutdown_rx)), shutdown_tx)
    }
}
