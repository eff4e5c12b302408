//! Parcel services manager.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use cartage_cache::ParcelCache;
use cartage_types::{
    ActivityId, EpisodeId, FinalisationStatus, ParcelId, ParcelProcessingStatus,
    ProcessingOutcome, ResilienceParcel, UnitOfWork,
};

use crate::audit::{AuditEntry, AuditSink};
use crate::error::{ServiceError, ServiceResult};

/// Registers parcels and drives them through their lifecycle, keeping the
/// parcel cache and the audit sink up to date.
///
/// Registration, finish, failure, finalisation, and cancellation are
/// audited; start is not. This layer never retries anything; retry policy
/// belongs to the surrounding transport.
pub struct ParcelServicesManager {
    cache: Arc<ParcelCache>,
    audit: Arc<dyn AuditSink>,
}

impl ParcelServicesManager {
    pub fn new(cache: Arc<ParcelCache>, audit: Arc<dyn AuditSink>) -> Self {
        Self { cache, audit }
    }

    /// Register a parcel for a unit of work under the given activity.
    ///
    /// When the activity carries no present episode, one is derived
    /// deterministically from the processor function and the unit-of-work
    /// type. Re-registration with the same (instance, type) key returns the
    /// existing parcel instead of duplicating it, so retries are safe. The
    /// activity's present parcel and episode identifiers are assigned as a
    /// side effect.
    pub async fn register_parcel(
        &self,
        activity: &mut ActivityId,
        uow: UnitOfWork,
        synchronous_audit: bool,
    ) -> ServiceResult<ResilienceParcel> {
        let episode_id = match activity.present_episode_id.clone() {
            Some(episode_id) => episode_id,
            None => {
                let derived = EpisodeId::derive(&activity.present_wup_function, &uow.type_id);
                activity.assign_present_episode(derived.clone());
                derived
            }
        };

        if let Some(existing) = self
            .cache
            .find_current_for_wup(&activity.present_wup_instance, &uow.type_id)
        {
            debug!(
                parcel_id = %existing.parcel_id,
                wup_instance_id = %activity.present_wup_instance,
                "re-registration resolved to existing parcel"
            );
            activity.assign_present_parcel(existing.parcel_id.clone());
            return Ok(existing);
        }

        let parcel_id = ParcelId::generate();
        activity.assign_present_parcel(parcel_id.clone());

        let parcel = ResilienceParcel::new(
            parcel_id,
            episode_id,
            activity.previous_episode_id.clone(),
            activity.present_wup_instance.clone(),
            uow,
        );
        self.cache.add(parcel.clone());

        info!(
            parcel_id = %parcel.parcel_id,
            episode_id = %parcel.episode_id,
            uow_type = %parcel.type_id,
            "parcel registered"
        );
        self.write_audit(&parcel, synchronous_audit).await;

        Ok(parcel)
    }

    /// Record that business logic has started. Not audited.
    pub fn notify_start(&self, parcel_id: &ParcelId) -> ServiceResult<ResilienceParcel> {
        let mut parcel = self.fetch(parcel_id)?;
        parcel.started_at = Some(Utc::now());
        parcel.processing_status = ParcelProcessingStatus::Active;
        parcel.finalisation_status = FinalisationStatus::NotFinalised;
        self.cache.update(parcel.clone())?;

        info!(parcel_id = %parcel_id, "parcel active");
        Ok(parcel)
    }

    /// Route an egress outcome to the right terminal notification.
    ///
    /// A successful outcome on an active parcel finishes it; any other
    /// combination is treated as a failure. A success reported for a parcel
    /// that is not active means the stores and the worker disagree, which is
    /// logged and conservatively failed rather than trusted.
    pub async fn notify_outcome(
        &self,
        parcel_id: &ParcelId,
        uow: &UnitOfWork,
    ) -> ServiceResult<ResilienceParcel> {
        let parcel = self.fetch(parcel_id)?;
        match (uow.outcome, parcel.processing_status) {
            (ProcessingOutcome::Success, ParcelProcessingStatus::Active) => {
                self.notify_finish(parcel_id, uow).await
            }
            (ProcessingOutcome::Success, status) => {
                warn!(
                    parcel_id = %parcel_id,
                    status = %status,
                    "parcel in unexpected state at egress, treating as failure"
                );
                self.notify_failure(parcel_id, uow).await
            }
            _ => self.notify_failure(parcel_id, uow).await,
        }
    }

    /// Record a successful finish, absorbing the processed unit of work's
    /// egress payloads and outcome. Audited synchronously.
    pub async fn notify_finish(
        &self,
        parcel_id: &ParcelId,
        uow: &UnitOfWork,
    ) -> ServiceResult<ResilienceParcel> {
        let mut parcel = self.fetch(parcel_id)?;
        parcel.uow.absorb(uow);
        parcel.finished_at = Some(Utc::now());
        parcel.processing_status = ParcelProcessingStatus::Finished;
        parcel.finalisation_status = FinalisationStatus::NotFinalised;
        self.cache.update(parcel.clone())?;

        info!(parcel_id = %parcel_id, outcome = %parcel.uow.outcome, "parcel finished");
        self.write_audit(&parcel, true).await;
        Ok(parcel)
    }

    /// Record a failure, absorbing the unit of work as for a finish.
    /// Audited fire-and-forget.
    pub async fn notify_failure(
        &self,
        parcel_id: &ParcelId,
        uow: &UnitOfWork,
    ) -> ServiceResult<ResilienceParcel> {
        let mut parcel = self.fetch(parcel_id)?;
        parcel.uow.absorb(uow);
        parcel.finished_at = Some(Utc::now());
        parcel.processing_status = ParcelProcessingStatus::Failed;
        parcel.finalisation_status = FinalisationStatus::NotFinalised;
        self.cache.update(parcel.clone())?;

        warn!(parcel_id = %parcel_id, "parcel failed");
        self.write_audit(&parcel, false).await;
        Ok(parcel)
    }

    /// Record that every downstream consumer has taken over. Backfills the
    /// finished timestamp when the finish notification never arrived.
    pub async fn notify_finalisation(
        &self,
        parcel_id: &ParcelId,
    ) -> ServiceResult<ResilienceParcel> {
        let mut parcel = self.fetch(parcel_id)?;
        self.finalise(&mut parcel)?;

        info!(parcel_id = %parcel_id, "parcel finalised");
        self.write_audit(&parcel, false).await;
        Ok(parcel)
    }

    /// Record a cancellation.
    ///
    /// Cancellation currently shares the finalisation bookkeeping and does
    /// not use a distinct terminal status; the cancellation timestamp is the
    /// only difference in the record.
    pub async fn notify_cancellation(
        &self,
        parcel_id: &ParcelId,
    ) -> ServiceResult<ResilienceParcel> {
        let mut parcel = self.fetch(parcel_id)?;
        parcel.cancelled_at = Some(Utc::now());
        self.finalise(&mut parcel)?;

        info!(parcel_id = %parcel_id, "parcel cancelled");
        self.write_audit(&parcel, false).await;
        Ok(parcel)
    }

    /// Drop a parcel's durable record. Idempotent; not audited yet.
    pub fn notify_purge(&self, parcel_id: &ParcelId) {
        if self.cache.remove(parcel_id).is_some() {
            debug!(parcel_id = %parcel_id, "parcel purged");
        }
    }

    fn fetch(&self, parcel_id: &ParcelId) -> ServiceResult<ResilienceParcel> {
        self.cache
            .get(parcel_id)
            .ok_or_else(|| ServiceError::ParcelNotFound(parcel_id.clone()))
    }

    fn finalise(&self, parcel: &mut ResilienceParcel) -> ServiceResult<()> {
        let now = Utc::now();
        if parcel.finished_at.is_none() {
            parcel.finished_at = Some(now);
        }
        parcel.finalised_at = Some(now);
        parcel.processing_status = ParcelProcessingStatus::Finalised;
        parcel.finalisation_status = FinalisationStatus::Finalised;
        self.cache.update(parcel.clone())?;
        Ok(())
    }

    async fn write_audit(&self, parcel: &ResilienceParcel, synchronous: bool) {
        let entry = AuditEntry::from_parcel(parcel);
        if synchronous {
            if let Err(err) = self.audit.write(entry).await {
                warn!(parcel_id = %parcel.parcel_id, error = %err, "audit write failed");
            }
        } else {
            let sink = Arc::clone(&self.audit);
            let parcel_id = parcel.parcel_id.clone();
            tokio::spawn(async move {
                if let Err(err) = sink.write(entry).await {
                    warn!(parcel_id = %parcel_id, error = %err, "audit write failed");
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::InMemoryAuditSink;
    use bytes::Bytes;
    use cartage_types::{TopicId, UowTypeId, WupFunctionToken, WupInstanceId};
    use semver::Version;
    use std::time::Duration;

    struct Fixture {
        manager: ParcelServicesManager,
        audit: Arc<InMemoryAuditSink>,
    }

    fn fixture() -> Fixture {
        let audit = Arc::new(InMemoryAuditSink::new());
        let manager =
            ParcelServicesManager::new(Arc::new(ParcelCache::new()), audit.clone());
        Fixture { manager, audit }
    }

    fn activity() -> ActivityId {
        ActivityId::new(
            WupFunctionToken::new("ingest", Version::new(1, 0, 0)),
            WupInstanceId::generate(),
        )
    }

    fn uow() -> UnitOfWork {
        UnitOfWork::new(
            UowTypeId::new("Patient"),
            TopicId::new("patient.created"),
            Bytes::from_static(b"{}"),
        )
    }

    #[tokio::test]
    async fn test_registration_derives_episode_and_audits() {
        let f = fixture();
        let mut activity = activity();

        let parcel = f
            .manager
            .register_parcel(&mut activity, uow(), true)
            .await
            .unwrap();

        let expected = EpisodeId::derive(
            &activity.present_wup_function,
            &UowTypeId::new("Patient"),
        );
        assert_eq!(parcel.episode_id, expected);
        assert_eq!(activity.present_episode_id, Some(expected));
        assert_eq!(activity.present_parcel_id, Some(parcel.parcel_id.clone()));
        assert_eq!(
            parcel.processing_status,
            ParcelProcessingStatus::Registered
        );
        assert_eq!(f.audit.for_parcel(&parcel.parcel_id).len(), 1);
    }

    #[tokio::test]
    async fn test_re_registration_returns_existing_parcel() {
        let f = fixture();
        let mut first = activity();
        let registered = f
            .manager
            .register_parcel(&mut first, uow(), true)
            .await
            .unwrap();

        // Retry from the same processor instance with the same work type.
        let mut retry = ActivityId::new(
            first.present_wup_function.clone(),
            first.present_wup_instance.clone(),
        );
        let reused = f
            .manager
            .register_parcel(&mut retry, uow(), true)
            .await
            .unwrap();

        assert_eq!(reused.parcel_id, registered.parcel_id);
        assert_eq!(retry.present_parcel_id, Some(registered.parcel_id.clone()));
        // Only the first registration wrote an audit entry.
        assert_eq!(f.audit.for_parcel(&registered.parcel_id).len(), 1);
    }

    #[tokio::test]
    async fn test_start_then_finish_stamps_and_audits() {
        let f = fixture();
        let mut activity = activity();
        let parcel = f
            .manager
            .register_parcel(&mut activity, uow(), true)
            .await
            .unwrap();

        let started = f.manager.notify_start(&parcel.parcel_id).unwrap();
        assert_eq!(started.processing_status, ParcelProcessingStatus::Active);
        assert!(started.started_at.is_some());
        // Start is not audited.
        assert_eq!(f.audit.for_parcel(&parcel.parcel_id).len(), 1);

        let mut processed = started.uow.clone();
        processed.set_outcome(cartage_types::ProcessingOutcome::Success);
        let finished = f
            .manager
            .notify_finish(&parcel.parcel_id, &processed)
            .await
            .unwrap();

        assert_eq!(finished.processing_status, ParcelProcessingStatus::Finished);
        assert!(finished.finished_at.is_some());
        assert_eq!(
            finished.uow.outcome,
            cartage_types::ProcessingOutcome::Success
        );
        assert_eq!(f.audit.for_parcel(&parcel.parcel_id).len(), 2);
    }

    #[tokio::test]
    async fn test_failure_marks_failed_and_audits_async() {
        let f = fixture();
        let mut activity = activity();
        let parcel = f
            .manager
            .register_parcel(&mut activity, uow(), true)
            .await
            .unwrap();

        let failed = f
            .manager
            .notify_failure(&parcel.parcel_id, &parcel.uow.clone())
            .await
            .unwrap();
        assert_eq!(failed.processing_status, ParcelProcessingStatus::Failed);
        assert!(failed.finished_at.is_some());

        // The failure audit is fire-and-forget; give it a moment to land.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(f.audit.for_parcel(&parcel.parcel_id).len(), 2);
    }

    #[tokio::test]
    async fn test_outcome_routing_defaults_to_failure() {
        let f = fixture();

        // Success on an active parcel finishes it.
        let mut first = activity();
        let active = f
            .manager
            .register_parcel(&mut first, uow(), true)
            .await
            .unwrap();
        f.manager.notify_start(&active.parcel_id).unwrap();
        let mut processed = active.uow.clone();
        processed.set_outcome(ProcessingOutcome::Success);
        let finished = f
            .manager
            .notify_outcome(&active.parcel_id, &processed)
            .await
            .unwrap();
        assert_eq!(finished.processing_status, ParcelProcessingStatus::Finished);

        // Success reported for a parcel that never started is not trusted.
        let mut second = ActivityId::new(
            WupFunctionToken::new("ingest", Version::new(1, 0, 0)),
            WupInstanceId::generate(),
        );
        let never_started = f
            .manager
            .register_parcel(&mut second, uow(), true)
            .await
            .unwrap();
        let mut claimed = never_started.uow.clone();
        claimed.set_outcome(ProcessingOutcome::Success);
        let failed = f
            .manager
            .notify_outcome(&never_started.parcel_id, &claimed)
            .await
            .unwrap();
        assert_eq!(failed.processing_status, ParcelProcessingStatus::Failed);
    }

    #[tokio::test]
    async fn test_finalisation_backfills_finished_timestamp() {
        let f = fixture();
        let mut activity = activity();
        let parcel = f
            .manager
            .register_parcel(&mut activity, uow(), true)
            .await
            .unwrap();

        // Finalise without ever finishing.
        let finalised = f
            .manager
            .notify_finalisation(&parcel.parcel_id)
            .await
            .unwrap();

        assert_eq!(
            finalised.processing_status,
            ParcelProcessingStatus::Finalised
        );
        assert_eq!(
            finalised.finalisation_status,
            FinalisationStatus::Finalised
        );
        let finished_at = finalised.finished_at.expect("backfilled");
        let finalised_at = finalised.finalised_at.expect("stamped");
        assert!(finalised_at >= finished_at);
    }

    #[tokio::test]
    async fn test_cancellation_shares_finalisation_bookkeeping() {
        let f = fixture();
        let mut activity = activity();
        let parcel = f
            .manager
            .register_parcel(&mut activity, uow(), true)
            .await
            .unwrap();

        let cancelled = f
            .manager
            .notify_cancellation(&parcel.parcel_id)
            .await
            .unwrap();

        // Same terminal bookkeeping as finalisation, plus the cancellation
        // stamp; there is no distinct cancelled processing status.
        assert_eq!(
            cancelled.processing_status,
            ParcelProcessingStatus::Finalised
        );
        assert_eq!(
            cancelled.finalisation_status,
            FinalisationStatus::Finalised
        );
        assert!(cancelled.cancelled_at.is_some());
        assert!(cancelled.finished_at.is_some());
        assert!(cancelled.finalised_at.is_some());
    }

    #[tokio::test]
    async fn test_purge_removes_record() {
        let f = fixture();
        let mut activity = activity();
        let parcel = f
            .manager
            .register_parcel(&mut activity, uow(), true)
            .await
            .unwrap();

        f.manager.notify_purge(&parcel.parcel_id);
        assert!(matches!(
            f.manager.notify_start(&parcel.parcel_id),
            Err(ServiceError::ParcelNotFound(_))
        ));

        // Purging again is a no-op.
        f.manager.notify_purge(&parcel.parcel_id);
    }

    #[tokio::test]
    async fn test_unknown_parcel_is_an_error() {
        let f = fixture();
        let missing = ParcelId::generate();
        assert!(matches!(
            f.manager.notify_finish(&missing, &uow()).await,
            Err(ServiceError::ParcelNotFound(_))
        ));
    }
}
