//! Topology lookup.
//!
//! The control plane treats service discovery as an external collaborator:
//! a read-only, fast, local lookup from node identifiers to deployment
//! metadata. [`StaticTopology`] is the in-memory implementation used by
//! tests and standalone deployments.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::ids::{EndpointName, NodeId, WupFunctionToken, WupInstanceId};
use crate::jobcard::{ConcurrencyMode, ResilienceMode};

/// Deployment metadata for one processing node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeElement {
    /// Node identity.
    pub node_id: NodeId,

    /// How redundantly the node is deployed.
    pub resilience_mode: ResilienceMode,

    /// How concurrently the node processes work.
    pub concurrency_mode: ConcurrencyMode,

    /// Processor function the node runs.
    pub wup_function: WupFunctionToken,

    /// Logical route name of the node's ingress stage.
    pub ingress_endpoint: EndpointName,
}

impl NodeElement {
    /// Metadata for a standalone node running the given function, with the
    /// ingress endpoint derived from the function token.
    pub fn standalone(node_id: NodeId, wup_function: WupFunctionToken) -> Self {
        let ingress_endpoint = EndpointName::ingress_for(&wup_function);
        Self {
            node_id,
            resilience_mode: ResilienceMode::Standalone,
            concurrency_mode: ConcurrencyMode::Standalone,
            wup_function,
            ingress_endpoint,
        }
    }
}

/// Read-only metadata queries against the deployment topology.
///
/// Implementations are expected to be fast, local, and side-effect-free.
pub trait TopologyLookup: Send + Sync {
    /// Metadata for a node, if known.
    fn node(&self, node_id: &NodeId) -> Option<NodeElement>;

    /// Function token for a processor instance, if known.
    fn wup_function(&self, instance_id: &WupInstanceId) -> Option<WupFunctionToken>;

    /// Resilience mode of a node.
    fn resilience_mode(&self, node_id: &NodeId) -> Option<ResilienceMode> {
        self.node(node_id).map(|n| n.resilience_mode)
    }

    /// Concurrency mode of a node.
    fn concurrency_mode(&self, node_id: &NodeId) -> Option<ConcurrencyMode> {
        self.node(node_id).map(|n| n.concurrency_mode)
    }

    /// Ingress endpoint of a node.
    fn ingress_endpoint(&self, node_id: &NodeId) -> Option<EndpointName> {
        self.node(node_id).map(|n| n.ingress_endpoint)
    }
}

/// In-memory topology for tests and standalone deployments.
#[derive(Default)]
pub struct StaticTopology {
    nodes: RwLock<HashMap<NodeId, NodeElement>>,
    functions: RwLock<HashMap<WupInstanceId, WupFunctionToken>>,
}

impl StaticTopology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a node's metadata.
    pub fn register_node(&self, element: NodeElement) {
        self.nodes
            .write()
            .expect("topology node map poisoned")
            .insert(element.node_id.clone(), element);
    }

    /// Record which function a processor instance runs.
    pub fn register_wup(&self, instance_id: WupInstanceId, function: WupFunctionToken) {
        self.functions
            .write()
            .expect("topology function map poisoned")
            .insert(instance_id, function);
    }
}

impl TopologyLookup for StaticTopology {
    fn node(&self, node_id: &NodeId) -> Option<NodeElement> {
        self.nodes
            .read()
            .expect("topology node map poisoned")
            .get(node_id)
            .cloned()
    }

    fn wup_function(&self, instance_id: &WupInstanceId) -> Option<WupFunctionToken> {
        self.functions
            .read()
            .expect("topology function map poisoned")
            .get(instance_id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semver::Version;

    #[test]
    fn test_standalone_node_lookup() {
        let topology = StaticTopology::new();
        let node_id = NodeId::new("site-a");
        let function = WupFunctionToken::new("ingest", Version::new(1, 0, 0));

        topology.register_node(NodeElement::standalone(node_id.clone(), function.clone()));

        assert_eq!(
            topology.resilience_mode(&node_id),
            Some(ResilienceMode::Standalone)
        );
        assert_eq!(
            topology.ingress_endpoint(&node_id),
            Some(EndpointName::ingress_for(&function))
        );
        assert!(topology.node(&NodeId::new("site-b")).is_none());
    }

    #[test]
    fn test_instance_function_lookup() {
        let topology = StaticTopology::new();
        let instance = WupInstanceId::generate();
        let function = WupFunctionToken::new("transform", Version::new(1, 2, 0));

        topology.register_wup(instance.clone(), function.clone());
        assert_eq!(topology.wup_function(&instance), Some(function));
    }
}
