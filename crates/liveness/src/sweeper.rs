//! Periodic reconciliation of persisted host status against staleness windows.

use crate::registry::ConnectionRegistry;
use crate::store::HostStatusStore;
use crate::types::{HostStatus, MonitorConfig};
use common::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Demotes stale ONLINE records to UNREACHABLE and ages out terminal records.
pub struct LivenessSweeper {
    store: Arc<dyn HostStatusStore>,
    registry: Arc<ConnectionRegistry>,
    config: MonitorConfig,
}

impl LivenessSweeper {
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

    /// One sweep cycle.
    ///
    /// An `Err` means nothing happened this cycle; the task loop logs it
    /// and the next tick retries. Both mutations are conditional bulk
    /// operations against the store clock, so interleaved sweeps commute.
    pub async fn sweep(&self) -> Result<()> {
        let online = self.store.find_by_status(HostStatus::Online).await?.len();
        let unreachable = self
            .store
            .find_by_status(HostStatus::Unreachable)
            .await?
            .len();
        let offline = self.store.find_by_status(HostStatus::Offline).await?.len();
        debug!(
            online,
            unreachable,
            offline,
            live_hosts = self.registry.host_count(),
            live_clients = self.registry.client_count(),
            "Sweep status snapshot"
        );
        // TODO: clients are registered but not persisted, so there is
        // nothing to sweep for them yet; client staleness needs a
        // heartbeat-based check before that changes.

        let demoted = self
            .store
            .transition_older_than(
                HostStatus::Online,
                HostStatus::Unreachable,
                self.config.liveness_timeout,
            )
            .await?;
        if !demoted.is_empty() {
            let ids: Vec<&str> = demoted.iter().map(|r| r.id.as_str()).collect();
            warn!(
                count = demoted.len(),
                hosts = ?ids,
                timeout = ?self.config.liveness_timeout,
                "Hosts missed their liveness window, marked UNREACHABLE"
            );
        }

        let purged = self
            .store
            .delete_older_than(
                &[HostStatus::Unreachable, HostStatus::Offline],
                self.config.retention_window,
            )
            .await?;
        if !purged.is_empty() {
            let ids: Vec<&str> = purged.iter().map(|r| r.id.as_str()).collect();
            info!(
                count = purged.len(),
                hosts = ?ids,
                retention = ?self.config.retention_window,
                "Purged host records past the retention window"
            );
        }

        Ok(())
    }
}
