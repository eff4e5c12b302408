//! Resilience parcels.
//!
//! A parcel is the durable record of one processor's attempt to process one
//! unit of work. Parcels are owned by the parcel cache for their lifetime
//! and removed only by an explicit purge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{EpisodeId, ParcelId, UowTypeId, WupInstanceId};
use crate::uow::UnitOfWork;

/// Lifecycle state of a parcel.
///
/// The `*Elsewhere` mirror states describe a parcel whose episode is owned
/// by another redundant instance; they are only reachable under multisite or
/// clustered focus election.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParcelProcessingStatus {
    /// Parcel registered, processing not yet started.
    Registered,
    /// Processing is being set up.
    Initiated,
    /// Business logic is running here.
    Active,
    /// Business logic is running on another instance.
    ActiveElsewhere,
    /// Business logic finished here.
    Finished,
    /// Business logic finished on another instance.
    FinishedElsewhere,
    /// Every downstream consumer has taken over; safe to archive.
    Finalised,
    /// Finalised by another instance.
    FinalisedElsewhere,
    /// Processing failed.
    Failed,
}

impl std::fmt::Display for ParcelProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParcelProcessingStatus::Registered => write!(f, "registered"),
            ParcelProcessingStatus::Initiated => write!(f, "initiated"),
            ParcelProcessingStatus::Active => write!(f, "active"),
            ParcelProcessingStatus::ActiveElsewhere => write!(f, "active-elsewhere"),
            ParcelProcessingStatus::Finished => write!(f, "finished"),
            ParcelProcessingStatus::FinishedElsewhere => write!(f, "finished-elsewhere"),
            ParcelProcessingStatus::Finalised => write!(f, "finalised"),
            ParcelProcessingStatus::FinalisedElsewhere => write!(f, "finalised-elsewhere"),
            ParcelProcessingStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Whether every known downstream consumer has registered its own successor
/// unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalisationStatus {
    /// At least one downstream consumer has not taken over yet.
    NotFinalised,
    /// All downstream consumers have taken over.
    Finalised,
}

impl std::fmt::Display for FinalisationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FinalisationStatus::NotFinalised => write!(f, "not-finalised"),
            FinalisationStatus::Finalised => write!(f, "finalised"),
        }
    }
}

/// The durable record of one attempt to process a unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResilienceParcel {
    /// Identity of this parcel.
    pub parcel_id: ParcelId,

    /// Episode this parcel belongs to. Fixed once assigned.
    pub episode_id: EpisodeId,

    /// Episode of the upstream hop that produced this work, if any.
    pub upstream_episode_id: Option<EpisodeId>,

    /// Processor instance this attempt runs on.
    pub wup_instance_id: WupInstanceId,

    /// Type tag of the contained unit of work.
    pub type_id: UowTypeId,

    /// The unit of work itself, owned by the parcel.
    pub uow: UnitOfWork,

    /// When the parcel was registered.
    pub registered_at: DateTime<Utc>,

    /// When business logic started.
    pub started_at: Option<DateTime<Utc>>,

    /// When business logic finished or failed.
    pub finished_at: Option<DateTime<Utc>>,

    /// When the parcel was finalised.
    pub finalised_at: Option<DateTime<Utc>>,

    /// When the parcel was cancelled.
    pub cancelled_at: Option<DateTime<Utc>>,

    /// Lifecycle state.
    pub processing_status: ParcelProcessingStatus,

    /// Downstream take-over state.
    pub finalisation_status: FinalisationStatus,
}

impl ResilienceParcel {
    /// Create a freshly-registered parcel owning the given unit of work.
    pub fn new(
        parcel_id: ParcelId,
        episode_id: EpisodeId,
        upstream_episode_id: Option<EpisodeId>,
        wup_instance_id: WupInstanceId,
        uow: UnitOfWork,
    ) -> Self {
        Self {
            parcel_id,
            episode_id,
            upstream_episode_id,
            wup_instance_id,
            type_id: uow.type_id.clone(),
            uow,
            registered_at: Utc::now(),
            started_at: None,
            finished_at: None,
            finalised_at: None,
            cancelled_at: None,
            processing_status: ParcelProcessingStatus::Registered,
            finalisation_status: FinalisationStatus::NotFinalised,
        }
    }
}
