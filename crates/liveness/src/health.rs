//! Global consistency auditing and last-resort self-restart.

use crate::registry::ConnectionRegistry;
use crate::store::HostStatusStore;
use crate::types::{HostStatus, MonitorConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Escalation hook invoked once the server is judged beyond recovery.
pub trait RestartSignal: Send + Sync {
    fn restart(&self);
}

/// Production escalation: terminate with a non-zero exit code and rely
/// on the external supervisor to relaunch the process.
pub struct ProcessExit;

impl RestartSignal for ProcessExit {
    fn restart(&self) {
        std::process::exit(1);
    }
}

/// Consecutive-failure state for the health state machine.
///
/// Lives for the whole process: the counter persists across failing
/// checks and resets to zero on any success.
#[derive(Debug)]
pub struct HealthCheckState {
    pub consecutive_failures: u32,
    pub healthy: bool,
    /// Debounce memory: whether the previous cycle saw persisted ONLINE
    /// rows with an empty registry.
    pub registry_empty_last_cycle: bool,
    pub last_restart: Option<Instant>,
}

impl Default for HealthCheckState {
    fn default() -> Self {
        Self {
            consecutive_failures: 0,
            healthy: true,
            registry_empty_last_cycle: false,
            last_restart: None,
        }
    }
}

/// Audits registry/store consistency and escalates on sustained failure.
pub struct ServerHealthMonitor {
    store: Arc<dyn HostStatusStore>,
    registry: Arc<ConnectionRegistry>,
    restart: Arc<dyn RestartSignal>,
    config: MonitorConfig,
    state: HealthCheckState,
}

impl ServerHealthMonitor {
    pub fn new(
        store: Arc<dyn HostStatusStore>,
        registry: Arc<ConnectionRegistry>,
        restart: Arc<dyn RestartSignal>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            store,
            registry,
            restart,
            config,
            state: HealthCheckState::default(),
        }
    }

    pub fn state(&self) -> &HealthCheckState {
        &self.state
    }

    /// One audit cycle: probe the store, cross-check persisted ONLINE
    /// records against the live registry, then advance the state machine.
    pub async fn check(&mut self) {
        if self.run_checks().await {
            if self.state.consecutive_failures > 0 {
                info!(
                    after = self.state.consecutive_failures,
                    "Health check recovered"
                );
            }
            self.state.consecutive_failures = 0;
            self.state.healthy = true;
            return;
        }

        self.state.consecutive_failures += 1;
        self.state.healthy = false;
        warn!(
            consecutive = self.state.consecutive_failures,
            threshold = self.config.restart_threshold,
            "Health check failed"
        );

        if self.state.consecutive_failures >= self.config.restart_threshold {
            self.maybe_escalate().await;
        }
    }

    async fn run_checks(&mut self) -> bool {
        // Everything else is meaningless if the store is unreachable.
        if let Err(e) = self.store.probe().await {
            warn!(error = %e, "Status store probe failed");
            return false;
        }

        let online = match self.store.find_by_status(HostStatus::Online).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Failed to load ONLINE records");
                return false;
            }
        };

        // Persisted ONLINE rows with an empty registry can be a transient
        // race right after startup; require two consecutive sightings.
        if !online.is_empty() && self.registry.host_count() == 0 {
            if self.state.registry_empty_last_cycle {
                warn!(
                    online = online.len(),
                    "Registry still empty while hosts are persisted ONLINE"
                );
                return false;
            }
            warn!(
                online = online.len(),
                "Registry empty while hosts are persisted ONLINE, waiting one cycle"
            );
            self.state.registry_empty_last_cycle = true;
        } else {
            self.state.registry_empty_last_cycle = false;
        }

        let missing: Vec<&str> = online
            .iter()
            .filter(|r| !self.registry.contains_host(&r.id))
            .map(|r| r.id.as_str())
            .collect();
        if missing.len() > self.config.missing_host_threshold {
            warn!(
                missing = missing.len(),
                hosts = ?missing,
                threshold = self.config.missing_host_threshold,
                "Too many ONLINE hosts without live connections"
            );
            return false;
        }

        true
    }

    async fn maybe_escalate(&mut self) {
        if let Some(last) = self.state.last_restart {
            let since = last.elapsed();
            if since < self.config.restart_cooldown {
                // Counter keeps climbing; the first cycle after the
                // cooldown expires will escalate.
                warn!(
                    since_restart = ?since,
                    cooldown = ?self.config.restart_cooldown,
                    "Restart threshold reached but still in cooldown"
                );
                return;
            }
        }

        error!(
            consecutive = self.state.consecutive_failures,
            "Sustained health check failure, restarting server"
        );

        // Stale ONLINE rows must not survive a restart this process
        // cannot observe completing; demote them all first, best effort.
        match self
            .store
            .transition_older_than(HostStatus::Online, HostStatus::Unreachable, Duration::ZERO)
            .await
        {
            Ok(demoted) if !demoted.is_empty() => {
                warn!(count = demoted.len(), "Demoted ONLINE hosts ahead of restart")
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to demote ONLINE hosts ahead of restart"),
        }

        self.state.last_restart = Some(Instant::now());

        // Give the observability sink a moment to flush.
        tokio::time::sleep(self.config.escalation_flush_delay).await;
        self.restart.restart();
    }
}
