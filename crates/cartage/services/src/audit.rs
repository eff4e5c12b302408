//! Audit sink seam.
//!
//! Audit persistence is an external collaborator: the manager hands a flat
//! snapshot of the parcel to a sink, synchronously or fire-and-forget.
//! Write failures are best-effort and never abort the governing operation.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use cartage_types::{
    EpisodeId, FinalisationStatus, ParcelId, ParcelProcessingStatus, ProcessingOutcome,
    ResilienceParcel, WupInstanceId,
};

/// A failed audit write.
#[derive(Debug, Error)]
#[error("audit write failed: {0}")]
pub struct AuditError(pub String);

/// Flat snapshot of a parcel at the moment an audited transition happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Parcel the entry describes.
    pub parcel_id: ParcelId,

    /// Episode the parcel belongs to.
    pub episode_id: EpisodeId,

    /// Processor instance handling the parcel.
    pub wup_instance_id: WupInstanceId,

    /// Lifecycle state at the time of the entry.
    pub processing_status: ParcelProcessingStatus,

    /// Downstream take-over state at the time of the entry.
    pub finalisation_status: FinalisationStatus,

    /// Outcome recorded on the contained unit of work.
    pub outcome: ProcessingOutcome,

    /// When the entry was taken.
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Snapshot a parcel.
    pub fn from_parcel(parcel: &ResilienceParcel) -> Self {
        Self {
            parcel_id: parcel.parcel_id.clone(),
            episode_id: parcel.episode_id.clone(),
            wup_instance_id: parcel.wup_instance_id.clone(),
            processing_status: parcel.processing_status,
            finalisation_status: parcel.finalisation_status,
            outcome: parcel.uow.outcome,
            recorded_at: Utc::now(),
        }
    }
}

/// Write sink for audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persist one entry.
    async fn write(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

/// In-memory audit sink for tests and development.
#[derive(Default)]
pub struct InMemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries written so far, in write order.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().unwrap().clone()
    }

    /// Entries written for one parcel.
    pub fn for_parcel(&self, parcel_id: &ParcelId) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.parcel_id == *parcel_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn write(&self, entry: AuditEntry) -> Result<(), AuditError> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }
}

/// Audit sink that drops every entry.
pub struct NullAuditSink;

#[async_trait]
impl AuditSink for NullAuditSink {
    async fn write(&self, _entry: AuditEntry) -> Result<(), AuditError> {
        Ok(())
    }
}
