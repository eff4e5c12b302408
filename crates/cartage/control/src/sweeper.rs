//! Background aging sweep.
//!
//! Periodically collects parcels whose tracking has aged out and purges
//! them from both the activity matrix and the parcel cache.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use cartage_cache::ParcelCache;
use cartage_matrix::ActivityMatrix;

use crate::config::SweepConfig;

/// Periodic driver for [`ActivityMatrix::sweep_aged`].
pub struct AgingSweeper {
    matrix: Arc<ActivityMatrix>,
    cache: Arc<ParcelCache>,
    config: SweepConfig,
}

impl AgingSweeper {
    pub fn new(matrix: Arc<ActivityMatrix>, cache: Arc<ParcelCache>, config: SweepConfig) -> Self {
        Self {
            matrix,
            cache,
            config,
        }
    }

    /// Run one sweep pass, returning how many parcels were purged.
    pub fn sweep_once(&self) -> usize {
        let candidates = self
            .matrix
            .sweep_aged(self.config.retention, self.config.activity_timeout);

        let count = candidates.len();
        for parcel_id in candidates {
            self.matrix.evict(&parcel_id);
            self.cache.remove(&parcel_id);
        }
        count
    }

    /// Run sweep passes at the configured interval until the shutdown
    /// channel flips to true (or its sender is dropped).
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.sweep_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(interval = ?self.config.sweep_interval, "aging sweeper started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let purged = self.sweep_once();
                    if purged > 0 {
                        info!(purged, "aging sweep purged parcels");
                    } else {
                        debug!("aging sweep found nothing to purge");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("aging sweeper stopping");
                        return;
                    }
                }
            }
        }
    }
}
