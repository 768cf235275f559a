//! Integration tests for the server health monitor.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Error, Result};
use liveness::{
    ConnectionHandle, ConnectionRegistry, HostRecord, HostStatus, HostStatusStore, ManualClock,
    MemoryStatusStore, MonitorConfig, RestartSignal, ServerHealthMonitor,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Escalation recorder standing in for process termination.
#[derive(Default)]
struct RecordingRestart {
    fired: AtomicUsize,
}

impl RecordingRestart {
    fn count(&self) -> usize {
        self.fired.load(Ordering::SeqCst)
    }
}

impl RestartSignal for RecordingRestart {
    fn restart(&self) {
        self.fired.fetch_add(1, Ordering::SeqCst);
    }
}

/// Store wrapper whose liveness probe can be made to fail.
struct ProbeFailStore {
    inner: MemoryStatusStore,
    fail_probe: AtomicBool,
}

#[async_trait]
impl HostStatusStore for ProbeFailStore {
    async fn find_by_status(&self, status: HostStatus) -> Result<Vec<HostRecord>> {
        self.inner.find_by_status(status).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<HostRecord>> {
        self.inner.find_by_id(id).await
    }

    async fn transition_older_than(
        &self,
        from: HostStatus,
        to: HostStatus,
        older_than: Duration,
    ) -> Result<Vec<HostRecord>> {
        self.inner.transition_older_than(from, to, older_than).await
    }

    async fn delete_older_than(
        &self,
        statuses: &[HostStatus],
        older_than: Duration,
    ) -> Result<Vec<HostRecord>> {
        self.inner.delete_older_than(statuses, older_than).await
    }

    async fn update_status(&self, id: &str, status: HostStatus) -> Result<()> {
        self.inner.update_status(id, status).await
    }

    async fn delete_by_id(&self, id: &str) -> Result<()> {
        self.inner.delete_by_id(id).await
    }

    async fn probe(&self) -> Result<()> {
        if self.fail_probe.load(Ordering::SeqCst) {
            return Err(Error::store("probe refused"));
        }
        self.inner.probe().await
    }

    fn now(&self) -> DateTime<Utc> {
        self.inner.now()
    }
}

fn handle(id: &str, api_key_id: &str) -> ConnectionHandle {
    let (tx, _rx) = mpsc::channel(1);
    ConnectionHandle::new(id, "org-1", api_key_id, tx)
}

fn setup() -> (
    Arc<MemoryStatusStore>,
    Arc<ManualClock>,
    Arc<ConnectionRegistry>,
    Arc<RecordingRestart>,
    ServerHealthMonitor,
) {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let store = Arc::new(MemoryStatusStore::with_clock(clock.clone()));
    let registry = Arc::new(ConnectionRegistry::new());
    let restart = Arc::new(RecordingRestart::default());
    let monitor = ServerHealthMonitor::new(
        store.clone(),
        registry.clone(),
        restart.clone(),
        MonitorConfig::default(),
    );
    (store, clock, registry, restart, monitor)
}

/// Persist more ONLINE hosts than the missing-host threshold allows,
/// with no live connections to match. Every cycle fails until the
/// registry catches up.
fn persist_orphaned_hosts(store: &MemoryStatusStore, clock: &ManualClock, n: usize) {
    for i in 0..n {
        store.upsert(
            format!("h{i}"),
            "org-1",
            format!("key-{i}"),
            HostStatus::Online,
        );
    }
    // Records pre-date the first check cycle.
    clock.advance(Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_restart_fires_after_exactly_three_failures() {
    let (store, clock, _registry, restart, mut monitor) = setup();
    persist_orphaned_hosts(&store, &clock, 4);

    monitor.check().await;
    monitor.check().await;
    assert_eq!(restart.count(), 0);
    assert_eq!(monitor.state().consecutive_failures, 2);
    assert!(!monitor.state().healthy);

    monitor.check().await;
    assert_eq!(restart.count(), 1);
    assert_eq!(monitor.state().consecutive_failures, 3);
}

#[tokio::test(start_paused = true)]
async fn test_single_success_resets_counter() {
    let (store, clock, registry, restart, mut monitor) = setup();
    persist_orphaned_hosts(&store, &clock, 4);

    monitor.check().await;
    monitor.check().await;
    assert_eq!(monitor.state().consecutive_failures, 2);

    // Connections show up: the next cycle passes and resets the counter.
    for i in 0..4 {
        registry.insert_host(handle(&format!("h{i}"), &format!("key-{i}")));
    }
    monitor.check().await;
    assert_eq!(monitor.state().consecutive_failures, 0);
    assert!(monitor.state().healthy);

    // Two fresh failures do not reach the threshold.
    for i in 0..4 {
        registry.remove_host(&format!("h{i}"));
    }
    monitor.check().await;
    monitor.check().await;
    assert_eq!(restart.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_probe_failure_fails_the_cycle() {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let store = Arc::new(ProbeFailStore {
        inner: MemoryStatusStore::with_clock(clock.clone()),
        fail_probe: AtomicBool::new(true),
    });
    let registry = Arc::new(ConnectionRegistry::new());
    let restart = Arc::new(RecordingRestart::default());
    let mut monitor = ServerHealthMonitor::new(
        store.clone(),
        registry,
        restart.clone(),
        MonitorConfig::default(),
    );

    monitor.check().await;
    assert_eq!(monitor.state().consecutive_failures, 1);
    assert!(!monitor.state().healthy);

    store.fail_probe.store(false, Ordering::SeqCst);
    monitor.check().await;
    assert_eq!(monitor.state().consecutive_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_registry_empty_requires_two_consecutive_sightings() {
    let (store, clock, registry, _restart, mut monitor) = setup();
    // Two ONLINE hosts: few enough to stay under the missing-host
    // threshold, so only the empty-registry rule is in play.
    persist_orphaned_hosts(&store, &clock, 2);

    // First sighting arms the debounce but the cycle still passes.
    monitor.check().await;
    assert!(monitor.state().healthy);
    assert_eq!(monitor.state().consecutive_failures, 0);

    // Second consecutive sighting fails.
    monitor.check().await;
    assert!(!monitor.state().healthy);
    assert_eq!(monitor.state().consecutive_failures, 1);

    // A live connection clears the debounce.
    registry.insert_host(handle("h0", "key-0"));
    monitor.check().await;
    assert!(monitor.state().healthy);
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_blocks_second_restart_until_expiry() {
    // Drive failures through the probe so the condition survives the
    // first escalation's ONLINE demotion.
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let store = Arc::new(ProbeFailStore {
        inner: MemoryStatusStore::with_clock(clock.clone()),
        fail_probe: AtomicBool::new(true),
    });
    let registry = Arc::new(ConnectionRegistry::new());
    let restart = Arc::new(RecordingRestart::default());
    let mut monitor = ServerHealthMonitor::new(
        store,
        registry,
        restart.clone(),
        MonitorConfig::default(),
    );

    for _ in 0..3 {
        monitor.check().await;
    }
    assert_eq!(restart.count(), 1);

    // Threshold stays breached, but the cooldown gates escalation.
    monitor.check().await;
    monitor.check().await;
    assert_eq!(restart.count(), 1);
    assert!(monitor.state().consecutive_failures > 3);

    // Once the cooldown expires, the very next failing cycle escalates.
    tokio::time::advance(Duration::from_secs(3601)).await;
    monitor.check().await;
    assert_eq!(restart.count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_escalation_demotes_online_records() {
    let (store, clock, _registry, restart, mut monitor) = setup();
    persist_orphaned_hosts(&store, &clock, 4);

    monitor.check().await;
    monitor.check().await;
    // A record stamped in the same clock instant as the escalation is
    // still caught by the pre-restart demotion.
    store.upsert("h-new", "org-1", "key-new", HostStatus::Online);
    monitor.check().await;
    assert_eq!(restart.count(), 1);

    // No stale ONLINE rows may survive the restart.
    let online = store.find_by_status(HostStatus::Online).await.unwrap();
    assert!(online.is_empty());
    let unreachable = store
        .find_by_status(HostStatus::Unreachable)
        .await
        .unwrap();
    assert_eq!(unreachable.len(), 5);
}
