//! Service wiring: each monitor runs as an independent periodic task.

use crate::health::{ProcessExit, RestartSignal, ServerHealthMonitor};
use crate::ping::PingFailureTracker;
use crate::reconciler::ReconnectReconciler;
use crate::registry::ConnectionRegistry;
use crate::stats::ConnectionStats;
use crate::store::HostStatusStore;
use crate::sweeper::LivenessSweeper;
use crate::types::{ConnectionKind, MonitorConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::interval;
use tracing::{info, warn};

/// Owns the in-memory state and the monitor task lifecycle.
///
/// Constructed once at process boot by the external bootstrapper. Each
/// `start_*` call is idempotent: the first call spawns the task, later
/// calls do nothing. Monitors never block each other; a failed cycle in
/// one never reaches another's timer loop.
pub struct LivenessService {
    store: Arc<dyn HostStatusStore>,
    registry: Arc<ConnectionRegistry>,
    ping_failures: Arc<PingFailureTracker>,
    stats: Arc<ConnectionStats>,
    restart: Arc<dyn RestartSignal>,
    config: MonitorConfig,
    shutdown: Arc<Notify>,
    sweep_started: AtomicBool,
    reconcile_started: AtomicBool,
    health_started: AtomicBool,
    stats_started: AtomicBool,
}

impl LivenessService {
    pub fn new(store: Arc<dyn HostStatusStore>, config: MonitorConfig) -> Self {
        Self {
            store,
            registry: Arc::new(ConnectionRegistry::new()),
            ping_failures: Arc::new(PingFailureTracker::new(config.critical_ping_failures)),
            stats: Arc::new(ConnectionStats::new()),
            restart: Arc::new(ProcessExit),
            config,
            shutdown: Arc::new(Notify::new()),
            sweep_started: AtomicBool::new(false),
            reconcile_started: AtomicBool::new(false),
            health_started: AtomicBool::new(false),
            stats_started: AtomicBool::new(false),
        }
    }

    /// Replace the escalation hook. Tests use this to observe escalation
    /// instead of exiting the process.
    pub fn with_restart_signal(mut self, restart: Arc<dyn RestartSignal>) -> Self {
        self.restart = restart;
        self
    }

    /// The registry the transport layer inserts into and removes from.
    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        self.registry.clone()
    }

    pub fn stats(&self) -> Arc<ConnectionStats> {
        self.stats.clone()
    }

    pub fn ping_failures(&self) -> Arc<PingFailureTracker> {
        self.ping_failures.clone()
    }

    /// Start the periodic liveness sweep.
    pub fn start_liveness_sweep(&self) {
        if self.sweep_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let sweeper = LivenessSweeper::new(
            self.store.clone(),
            self.registry.clone(),
            self.config.clone(),
        );
        let shutdown = self.shutdown.clone();
        let period = self.config.sweep_interval;

        tokio::spawn(async move {
            info!(interval = ?period, "Liveness sweeper started");
            let mut ticker = interval(period);
            ticker.tick().await; // Skip first immediate tick

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = sweeper.sweep().await {
                            warn!(error = %e, "Liveness sweep cycle failed");
                        }
                    }
                    _ = shutdown.notified() => {
                        info!("Liveness sweeper stopping");
                        break;
                    }
                }
            }
        });
    }

    /// Start the periodic reconnect reconciler.
    pub fn start_reconnect_reconciler(&self) {
        if self.reconcile_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let reconciler = ReconnectReconciler::new(
            self.store.clone(),
            self.registry.clone(),
            self.config.clone(),
        );
        let shutdown = self.shutdown.clone();
        let period = self.config.reconcile_interval;

        tokio::spawn(async move {
            info!(interval = ?period, "Reconnect reconciler started");
            let mut ticker = interval(period);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = reconciler.reconcile().await {
                            warn!(error = %e, "Reconcile cycle failed");
                        }
                    }
                    _ = shutdown.notified() => {
                        info!("Reconnect reconciler stopping");
                        break;
                    }
                }
            }
        });
    }

    /// Start the periodic server health audit.
    pub fn start_server_health_monitoring(&self) {
        if self.health_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut monitor = ServerHealthMonitor::new(
            self.store.clone(),
            self.registry.clone(),
            self.restart.clone(),
            self.config.clone(),
        );
        let shutdown = self.shutdown.clone();
        let period = self.config.health_check_interval;

        tokio::spawn(async move {
            info!(interval = ?period, "Server health monitor started");
            let mut ticker = interval(period);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        monitor.check().await;
                    }
                    _ = shutdown.notified() => {
                        info!("Server health monitor stopping");
                        break;
                    }
                }
            }
        });
    }

    /// Start connection statistics reporting and the ping-failure flush.
    pub fn start_connection_stats_monitor(&self) {
        if self.stats_started.swap(true, Ordering::SeqCst) {
            return;
        }

        let stats = self.stats.clone();
        let registry = self.registry.clone();
        let shutdown = self.shutdown.clone();
        let period = self.config.stats_report_interval;

        tokio::spawn(async move {
            info!(interval = ?period, "Connection stats monitor started");
            let mut ticker = interval(period);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let snap = stats.snapshot();
                        info!(
                            hosts_opened = snap.hosts_opened,
                            hosts_closed = snap.hosts_closed,
                            clients_opened = snap.clients_opened,
                            clients_closed = snap.clients_closed,
                            active_hosts = snap.active_hosts(),
                            active_clients = snap.active_clients(),
                            live_hosts = registry.host_count(),
                            live_clients = registry.client_count(),
                            "Connection statistics"
                        );
                    }
                    _ = shutdown.notified() => {
                        info!("Connection stats monitor stopping");
                        break;
                    }
                }
            }
        });

        let ping_failures = self.ping_failures.clone();
        let shutdown = self.shutdown.clone();
        let period = self.config.ping_log_interval;

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        ping_failures.flush();
                    }
                    _ = shutdown.notified() => {
                        info!("Ping failure flush stopping");
                        break;
                    }
                }
            }
        });
    }

    /// Stop all monitor tasks between cycles. In-flight cycles complete.
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }

    // Transport-facing callbacks.

    pub fn on_connection_opened(&self, kind: ConnectionKind) {
        self.stats.connection_opened(kind);
    }

    pub fn on_connection_closed(&self, kind: ConnectionKind) {
        self.stats.connection_closed(kind);
    }

    pub fn record_ping_failure(
        &self,
        id: &str,
        kind: ConnectionKind,
        org_id: Option<String>,
        user_id: Option<String>,
    ) {
        self.ping_failures.record_failure(id, kind, org_id, user_id);
    }

    pub fn clear_ping_failure(&self, id: &str) {
        self.ping_failures.clear_failure(id);
    }

    /// Ping outcome from the transport layer: success clears the failure
    /// entry, failure records one.
    pub fn on_ping_result(
        &self,
        id: &str,
        kind: ConnectionKind,
        org_id: Option<String>,
        user_id: Option<String>,
        success: bool,
    ) {
        if success {
            self.clear_ping_failure(id);
        } else {
            self.record_ping_failure(id, kind, org_id, user_id);
        }
    }
}
