//! Resolution of long-UNREACHABLE records: superseded vs. genuinely gone.

use crate::registry::ConnectionRegistry;
use crate::store::{staleness_window, HostStatusStore};
use crate::types::{HostRecord, HostStatus, MonitorConfig};
use common::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// Resolves records that have been UNREACHABLE past the threshold.
///
/// A record must first pass through the liveness sweeper before this
/// component sees it, which enforces a strict ordering: nothing inside
/// its grace period can be resolved.
pub struct ReconnectReconciler {
    store: Arc<dyn HostStatusStore>,
    registry: Arc<ConnectionRegistry>,
    config: MonitorConfig,
}

impl ReconnectReconciler {
    pub fn new(
        store: Arc<dyn HostStatusStore>,
        registry: Arc<ConnectionRegistry>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    /// One reconciliation pass.
    ///
    /// Per-record failures are logged and skipped; since resolution is
    /// idempotent, a partially completed batch is picked up next cycle.
    pub async fn reconcile(&self) -> Result<()> {
        let candidates = self.store.find_by_status(HostStatus::Unreachable).await?;
        let now = self.store.now();
        let threshold = staleness_window(self.config.unreachable_threshold);

        let mut resolved = 0usize;
        for record in candidates {
            if now - record.last_updated < threshold {
                continue;
            }
            match self.resolve(&record).await {
                Ok(()) => resolved += 1,
                Err(e) => {
                    warn!(host = %record.id, error = %e, "Failed to resolve unreachable host")
                }
            }
        }

        if resolved > 0 {
            info!(resolved, "Reconciled unreachable hosts");
        }
        Ok(())
    }

    async fn resolve(&self, record: &HostRecord) -> Result<()> {
        match self
            .registry
            .host_superseding(&record.api_key_id, &record.id)
        {
            Some(newer) => {
                // The new connection already represents this logical host;
                // keeping the old row would leave duplicate state.
                info!(
                    stale = %record.id,
                    superseded_by = %newer,
                    api_key = %record.api_key_id,
                    "Deleting host record superseded by a newer connection"
                );
                self.store.delete_by_id(&record.id).await
            }
            None => {
                info!(host = %record.id, "No superseding connection, marking OFFLINE");
                self.store.update_status(&record.id, HostStatus::Offline).await
            }
        }
    }
}
