//! Builder for ControlPlane
//!
//! The builder pattern allows flexible configuration of the control plane
//! with its required collaborators (topology lookup, audit sink, local
//! node) and optional tuning.

use std::sync::Arc;

use cartage_cache::ParcelCache;
use cartage_finalisation::EpisodeFinalisationRegistry;
use cartage_matrix::ActivityMatrix;
use cartage_routing::{SubscriptionIndex, TopicRouter};
use cartage_services::{AuditSink, ParcelServicesManager};
use cartage_types::{NodeId, TopologyLookup};

use crate::config::{SweepConfig, SyncConfig};
use crate::control_plane::ControlPlane;
use crate::controller::ActivityServicesController;
use crate::error::{ControlError, ControlResult};

/// Builder for constructing a [`ControlPlane`] with all dependencies.
#[derive(Default)]
pub struct ControlPlaneBuilder {
    node_id: Option<NodeId>,
    topology: Option<Arc<dyn TopologyLookup>>,
    audit: Option<Arc<dyn AuditSink>>,
    sync_config: Option<SyncConfig>,
    sweep_config: Option<SweepConfig>,
}

impl ControlPlaneBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the local node identity.
    pub fn with_node_id(mut self, node_id: NodeId) -> Self {
        self.node_id = Some(node_id);
        self
    }

    /// Set the topology lookup.
    pub fn with_topology(mut self, topology: Arc<dyn TopologyLookup>) -> Self {
        self.topology = Some(topology);
        self
    }

    /// Set the audit sink.
    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Set the job-card synchronisation configuration.
    pub fn with_sync_config(mut self, config: SyncConfig) -> Self {
        self.sync_config = Some(config);
        self
    }

    /// Set the aging sweep configuration.
    pub fn with_sweep_config(mut self, config: SweepConfig) -> Self {
        self.sweep_config = Some(config);
        self
    }

    /// Build the control plane with all components wired.
    pub fn build(self) -> ControlResult<ControlPlane> {
        let node_id = self
            .node_id
            .ok_or(ControlError::MissingComponent("node_id"))?;
        let topology = self
            .topology
            .ok_or(ControlError::MissingComponent("topology"))?;
        let audit = self
            .audit
            .ok_or(ControlError::MissingComponent("audit_sink"))?;

        let sync_config = self.sync_config.unwrap_or_default();
        let sweep_config = self.sweep_config.unwrap_or_default();

        let cache = Arc::new(ParcelCache::new());
        let matrix = Arc::new(ActivityMatrix::new());
        let finalisation = Arc::new(EpisodeFinalisationRegistry::new());
        let subscriptions = Arc::new(SubscriptionIndex::new());

        let parcel_services = ParcelServicesManager::new(cache.clone(), audit);
        let controller = ActivityServicesController::new(
            node_id.clone(),
            matrix.clone(),
            topology.clone(),
            finalisation.clone(),
            sync_config,
        );
        let router = TopicRouter::new(subscriptions.clone(), topology, finalisation.clone());

        Ok(ControlPlane::new(
            node_id,
            cache,
            matrix,
            finalisation,
            subscriptions,
            parcel_services,
            controller,
            router,
            sweep_config,
        ))
    }
}
