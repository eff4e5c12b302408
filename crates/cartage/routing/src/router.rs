//! Fan-out resolution.

use std::sync::Arc;

use tracing::{debug, warn};

use cartage_finalisation::EpisodeFinalisationRegistry;
use cartage_types::{EndpointName, EpisodeId, NodeId, TopicId, TopologyLookup};

use crate::subscriptions::SubscriptionIndex;

/// Resolves a topic to the recipient list the transport delivers to.
pub struct TopicRouter {
    index: Arc<SubscriptionIndex>,
    topology: Arc<dyn TopologyLookup>,
    finalisation: Arc<EpisodeFinalisationRegistry>,
}

impl TopicRouter {
    pub fn new(
        index: Arc<SubscriptionIndex>,
        topology: Arc<dyn TopologyLookup>,
        finalisation: Arc<EpisodeFinalisationRegistry>,
    ) -> Self {
        Self {
            index,
            topology,
            finalisation,
        }
    }

    /// Resolve the ingress endpoints of every subscriber to the topic.
    ///
    /// Every listed endpoint receives a copy of the packet. As a side effect
    /// each resolved downstream function is registered as an interest party
    /// against the current episode, which is how finalisation tracking gets
    /// populated without the downstream processor calling back. Subscriber
    /// nodes the topology cannot resolve are logged and skipped.
    pub fn resolve_subscribers(
        &self,
        topic: &TopicId,
        current_episode: &EpisodeId,
    ) -> Vec<EndpointName> {
        let mut endpoints = Vec::new();
        for node_id in self.index.subscribers(topic) {
            let Some(node) = self.topology.node(&node_id) else {
                warn!(topic = %topic, node_id = %node_id, "subscriber node not in topology, skipped");
                continue;
            };

            self.finalisation
                .register_downstream_interest(current_episode, &node.wup_function);
            endpoints.push(node.ingress_endpoint);
        }

        debug!(
            topic = %topic,
            episode_id = %current_episode,
            recipients = endpoints.len(),
            "fan-out recipient list resolved"
        );
        endpoints
    }

    /// Subscribe a node to a topic. Idempotent.
    pub fn subscribe(&self, topic: &TopicId, node_id: NodeId) {
        self.index.subscribe(topic, node_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartage_types::{NodeElement, StaticTopology, WupFunctionToken};
    use semver::Version;

    struct Fixture {
        router: TopicRouter,
        topology: Arc<StaticTopology>,
        finalisation: Arc<EpisodeFinalisationRegistry>,
    }

    fn fixture() -> Fixture {
        let topology = Arc::new(StaticTopology::new());
        let finalisation = Arc::new(EpisodeFinalisationRegistry::new());
        let router = TopicRouter::new(
            Arc::new(SubscriptionIndex::new()),
            topology.clone(),
            finalisation.clone(),
        );
        Fixture {
            router,
            topology,
            finalisation,
        }
    }

    fn function(name: &str) -> WupFunctionToken {
        WupFunctionToken::new(name, Version::new(1, 0, 0))
    }

    #[test]
    fn test_resolution_registers_downstream_interest() {
        let f = fixture();
        let topic = TopicId::new("patient.created");
        let episode = EpisodeId::generate();

        let transform = NodeId::new("transform-node");
        f.topology.register_node(NodeElement::standalone(
            transform.clone(),
            function("transform"),
        ));
        f.router.subscribe(&topic, transform);

        let endpoints = f.router.resolve_subscribers(&topic, &episode);

        assert_eq!(
            endpoints,
            vec![EndpointName::ingress_for(&function("transform"))]
        );
        // The downstream function now owes the episode a successor.
        assert!(!f.finalisation.is_finalised(&episode));
    }

    #[test]
    fn test_unresolvable_subscriber_is_skipped() {
        let f = fixture();
        let topic = TopicId::new("patient.created");
        let episode = EpisodeId::generate();

        let known = NodeId::new("known");
        f.topology
            .register_node(NodeElement::standalone(known.clone(), function("forward")));
        f.router.subscribe(&topic, known);
        f.router.subscribe(&topic, NodeId::new("ghost"));

        let endpoints = f.router.resolve_subscribers(&topic, &episode);
        assert_eq!(endpoints.len(), 1);
    }

    #[test]
    fn test_topic_without_subscribers_resolves_empty() {
        let f = fixture();
        let endpoints = f
            .router
            .resolve_subscribers(&TopicId::new("silent"), &EpisodeId::generate());
        assert!(endpoints.is_empty());
    }
}
