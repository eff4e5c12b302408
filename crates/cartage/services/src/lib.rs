//! Parcel lifecycle services.
//!
//! Registers parcels for units of work and drives them through
//! start/finish/fail/finalise/cancel/purge, updating the parcel cache and
//! emitting audit entries along the way.

pub mod audit;
pub mod error;
pub mod manager;

pub use audit::{AuditEntry, AuditError, AuditSink, InMemoryAuditSink, NullAuditSink};
pub use error::{ServiceError, ServiceResult};
pub use manager::ParcelServicesManager;
