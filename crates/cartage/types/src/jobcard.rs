//! Job cards.
//!
//! The execution-permission token circulated with a transport packet. The
//! ingress processor requests a status, the synchronisation path grants it,
//! and the egress conduit records the terminal status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::ActivityId;

/// Status of a job card: requested, granted, or current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobCardStatus {
    /// Waiting for an execution grant.
    Waiting,
    /// Executing business logic.
    Executing,
    /// Business logic finished.
    Finished,
    /// Business logic failed.
    Failed,
    /// The card was cancelled before execution was granted.
    Canceled,
}

impl std::fmt::Display for JobCardStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobCardStatus::Waiting => write!(f, "waiting"),
            JobCardStatus::Executing => write!(f, "executing"),
            JobCardStatus::Finished => write!(f, "finished"),
            JobCardStatus::Failed => write!(f, "failed"),
            JobCardStatus::Canceled => write!(f, "canceled"),
        }
    }
}

/// How redundantly a node is deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResilienceMode {
    /// Redundant instances across sites.
    Multisite,
    /// Redundant instances within one cluster.
    Clustered,
    /// A single instance.
    Standalone,
}

impl std::fmt::Display for ResilienceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResilienceMode::Multisite => write!(f, "multisite"),
            ResilienceMode::Clustered => write!(f, "clustered"),
            ResilienceMode::Standalone => write!(f, "standalone"),
        }
    }
}

/// How concurrently a node processes work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConcurrencyMode {
    /// Many workers process in parallel.
    Concurrent,
    /// Workers are started on demand.
    OnDemand,
    /// A single worker.
    Standalone,
}

impl std::fmt::Display for ConcurrencyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConcurrencyMode::Concurrent => write!(f, "concurrent"),
            ConcurrencyMode::OnDemand => write!(f, "on-demand"),
            ConcurrencyMode::Standalone => write!(f, "standalone"),
        }
    }
}

/// The execution-permission handshake object for one activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WupJobCard {
    /// Activity this card governs.
    pub activity_id: ActivityId,

    /// Status the packet is currently in.
    pub current_status: JobCardStatus,

    /// Status the ingress processor is asking for.
    pub requested_status: JobCardStatus,

    /// Status the synchronisation path has granted.
    pub granted_status: JobCardStatus,

    /// Concurrency mode of the node handling the card.
    pub concurrency_mode: ConcurrencyMode,

    /// Resilience mode of the node handling the card.
    pub resilience_mode: ResilienceMode,

    /// Terminal marker: a discarded packet is never routed forward.
    pub to_be_discarded: bool,

    /// Time of the last mutation.
    pub updated_at: DateTime<Utc>,
}

impl WupJobCard {
    /// Create a card in the waiting state.
    pub fn new(
        activity_id: ActivityId,
        concurrency_mode: ConcurrencyMode,
        resilience_mode: ResilienceMode,
    ) -> Self {
        Self {
            activity_id,
            current_status: JobCardStatus::Waiting,
            requested_status: JobCardStatus::Waiting,
            granted_status: JobCardStatus::Waiting,
            concurrency_mode,
            resilience_mode,
            to_be_discarded: false,
            updated_at: Utc::now(),
        }
    }

    /// Request a status.
    pub fn request(&mut self, status: JobCardStatus) {
        self.requested_status = status;
        self.updated_at = Utc::now();
    }

    /// Grant whatever status is currently requested.
    pub fn grant_requested(&mut self) {
        self.granted_status = self.requested_status;
        self.updated_at = Utc::now();
    }

    /// Mark the packet as never to be routed forward.
    pub fn mark_discarded(&mut self) {
        self.to_be_discarded = true;
        self.updated_at = Utc::now();
    }

    /// Whether execution has been granted as requested.
    pub fn execution_granted(&self) -> bool {
        self.requested_status == JobCardStatus::Executing
            && self.granted_status == JobCardStatus::Executing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{WupFunctionToken, WupInstanceId};
    use semver::Version;

    fn card() -> WupJobCard {
        let activity = ActivityId::new(
            WupFunctionToken::new("ingest", Version::new(1, 0, 0)),
            WupInstanceId::generate(),
        );
        WupJobCard::new(activity, ConcurrencyMode::Standalone, ResilienceMode::Standalone)
    }

    #[test]
    fn test_new_card_is_waiting() {
        let card = card();
        assert_eq!(card.current_status, JobCardStatus::Waiting);
        assert_eq!(card.granted_status, JobCardStatus::Waiting);
        assert!(!card.to_be_discarded);
        assert!(!card.execution_granted());
    }

    #[test]
    fn test_grant_follows_request() {
        let mut card = card();
        card.request(JobCardStatus::Executing);
        assert!(!card.execution_granted());

        card.grant_requested();
        assert!(card.execution_granted());
    }
}
