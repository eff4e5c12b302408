//! Units of work.
//!
//! The payload-bearing message moving through the pipeline. Payload bodies
//! are opaque bytes with a type tag; the control plane never interprets
//! them.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::ids::{TopicId, UowId, UowTypeId};

/// How processing of a unit of work ended, if it has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingOutcome {
    /// Business logic has not run yet.
    NotStarted,
    /// Business logic completed successfully.
    Success,
    /// Business logic failed.
    Failed,
    /// Business logic ran but did not complete.
    Incomplete,
}

impl std::fmt::Display for ProcessingOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingOutcome::NotStarted => write!(f, "not-started"),
            ProcessingOutcome::Success => write!(f, "success"),
            ProcessingOutcome::Failed => write!(f, "failed"),
            ProcessingOutcome::Incomplete => write!(f, "incomplete"),
        }
    }
}

/// An opaque payload together with the topic it is published under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Topic this payload belongs to.
    pub topic: TopicId,

    /// Type tag of the body.
    pub type_id: UowTypeId,

    /// Opaque body bytes.
    pub body: Bytes,
}

impl Payload {
    pub fn new(topic: TopicId, type_id: UowTypeId, body: Bytes) -> Self {
        Self {
            topic,
            type_id,
            body,
        }
    }
}

/// A unit of work traversing the pipeline.
///
/// Created by the transport framework at ingress; business logic appends
/// egress payloads and sets the outcome. Each egress payload carries its own
/// topic, so a single unit of work can fan out to several downstream topics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitOfWork {
    /// Unique identity of this unit-of-work instance.
    pub instance_id: UowId,

    /// Type tag of the work.
    pub type_id: UowTypeId,

    /// Topic of the ingress payload.
    pub payload_topic: TopicId,

    /// The payload delivered at ingress.
    pub ingress_payload: Payload,

    /// Payloads produced by business logic, one per downstream topic.
    pub egress_payloads: Vec<Payload>,

    /// Outcome of processing.
    pub outcome: ProcessingOutcome,
}

impl UnitOfWork {
    /// Create a unit of work from an ingress payload.
    pub fn new(type_id: UowTypeId, topic: TopicId, body: Bytes) -> Self {
        Self {
            instance_id: UowId::generate(),
            type_id: type_id.clone(),
            payload_topic: topic.clone(),
            ingress_payload: Payload::new(topic, type_id, body),
            egress_payloads: Vec::new(),
            outcome: ProcessingOutcome::NotStarted,
        }
    }

    /// Append an egress payload.
    pub fn add_egress_payload(&mut self, payload: Payload) {
        self.egress_payloads.push(payload);
    }

    /// Record the processing outcome.
    pub fn set_outcome(&mut self, outcome: ProcessingOutcome) {
        self.outcome = outcome;
    }

    /// Whether two values describe the same unit-of-work instance.
    pub fn is_same_instance(&self, other: &UnitOfWork) -> bool {
        self.instance_id == other.instance_id
    }

    /// Merge another copy's egress payloads and outcome into this one.
    pub fn absorb(&mut self, other: &UnitOfWork) {
        self.egress_payloads = other.egress_payloads.clone();
        self.outcome = other.outcome;
    }
}
