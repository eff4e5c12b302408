//! Control-plane configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for job-card synchronisation waits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// How often a waiting card re-checks for a grant when no wake-up
    /// arrives.
    pub poll_interval: Duration,

    /// How long a card may wait for an execution grant before it is
    /// cancelled and discarded.
    pub grant_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            grant_timeout: Duration::from_secs(30),
        }
    }
}

/// Configuration for the aging sweep over tracked parcels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// How long finalised parcels are retained before eviction.
    pub retention: Duration,

    /// How long in-flight parcels may sit unchanged before they are
    /// considered stuck and evicted.
    pub activity_timeout: Duration,

    /// How often the background sweeper runs.
    pub sweep_interval: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(3600),
            activity_timeout: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
        }
    }
}
