//! Topic subscription index.

use std::collections::HashSet;

use dashmap::DashMap;
use tracing::debug;

use cartage_types::{NodeId, TopicId};

/// Which nodes subscribe to which topics.
///
/// Populated at startup when each processor declares its subscribed topics;
/// add-to-set semantics, idempotent.
pub struct SubscriptionIndex {
    topics: DashMap<TopicId, HashSet<NodeId>>,
}

impl SubscriptionIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self {
            topics: DashMap::new(),
        }
    }

    /// Subscribe a node to a topic. Idempotent.
    pub fn subscribe(&self, topic: &TopicId, node_id: NodeId) {
        let newly_added = self
            .topics
            .entry(topic.clone())
            .or_default()
            .insert(node_id.clone());
        if newly_added {
            debug!(topic = %topic, node_id = %node_id, "topic subscription added");
        }
    }

    /// Remove a node's subscription to a topic.
    pub fn unsubscribe(&self, topic: &TopicId, node_id: &NodeId) {
        if let Some(mut subscribers) = self.topics.get_mut(topic) {
            subscribers.remove(node_id);
        }
    }

    /// The nodes subscribed to a topic; empty when nobody subscribes.
    pub fn subscribers(&self, topic: &TopicId) -> Vec<NodeId> {
        self.topics
            .get(topic)
            .map(|subscribers| subscribers.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for SubscriptionIndex {
    fn default() -> Self {
        Self::new()
    }
}
