//! Core types for the cartage control plane.
//!
//! Defines the identifier types, the work-unit data model (units of work,
//! parcels, status elements, job cards) and the topology lookup seam shared
//! by every other cartage crate.

pub mod activity;
pub mod ids;
pub mod jobcard;
pub mod parcel;
pub mod status;
pub mod topology;
pub mod uow;

pub use activity::ActivityId;
pub use ids::{
    EndpointName, EpisodeId, IdToken, NodeId, ParcelId, TokenSegment, TopicId, UowId, UowTypeId,
    WupFunctionToken, WupInstanceId,
};
pub use jobcard::{ConcurrencyMode, JobCardStatus, ResilienceMode, WupJobCard};
pub use parcel::{FinalisationStatus, ParcelProcessingStatus, ResilienceParcel};
pub use status::ParcelStatusElement;
pub use topology::{NodeElement, StaticTopology, TopologyLookup};
pub use uow::{Payload, ProcessingOutcome, UnitOfWork};
