//! Integration tests for the liveness sweeper.

use chrono::Utc;
use liveness::{
    ConnectionRegistry, HostStatus, HostStatusStore, LivenessSweeper, ManualClock,
    MemoryStatusStore, MonitorConfig,
};
use std::sync::Arc;
use std::time::Duration;

fn setup() -> (Arc<MemoryStatusStore>, Arc<ManualClock>, LivenessSweeper) {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let store = Arc::new(MemoryStatusStore::with_clock(clock.clone()));
    let registry = Arc::new(ConnectionRegistry::new());
    let sweeper = LivenessSweeper::new(store.clone(), registry, MonitorConfig::default());
    (store, clock, sweeper)
}

#[tokio::test]
async fn test_sweep_demotes_only_stale_online_records() {
    let (store, clock, sweeper) = setup();

    store.upsert("stale", "org-1", "key-1", HostStatus::Online);
    clock.advance(Duration::from_secs(120));
    store.upsert("fresh", "org-1", "key-2", HostStatus::Online);

    sweeper.sweep().await.unwrap();

    let stale = store.find_by_id("stale").await.unwrap().unwrap();
    assert_eq!(stale.status, HostStatus::Unreachable);

    let fresh = store.find_by_id("fresh").await.unwrap().unwrap();
    assert_eq!(fresh.status, HostStatus::Online);
}

#[tokio::test]
async fn test_sweep_purges_terminal_records_past_retention() {
    let (store, clock, sweeper) = setup();

    store.upsert("dead-unreachable", "org-1", "key-1", HostStatus::Unreachable);
    store.upsert("dead-offline", "org-1", "key-2", HostStatus::Offline);
    clock.advance(Duration::from_secs(7 * 60 * 60));
    store.upsert("recent-offline", "org-1", "key-3", HostStatus::Offline);

    sweeper.sweep().await.unwrap();

    assert!(store.find_by_id("dead-unreachable").await.unwrap().is_none());
    assert!(store.find_by_id("dead-offline").await.unwrap().is_none());
    // Within the retention window: kept.
    assert!(store.find_by_id("recent-offline").await.unwrap().is_some());
}

#[tokio::test]
async fn test_sweep_never_purges_online_records() {
    let (store, clock, sweeper) = setup();

    store.upsert("h1", "org-1", "key-1", HostStatus::Online);
    clock.advance(Duration::from_secs(24 * 60 * 60));

    sweeper.sweep().await.unwrap();

    // Demoted by the same cycle, but never deleted: the demotion
    // refreshed its timestamp, restarting the retention clock.
    let record = store.find_by_id("h1").await.unwrap().unwrap();
    assert_eq!(record.status, HostStatus::Unreachable);
}

#[tokio::test]
async fn test_repeated_sweeps_are_idempotent() {
    let (store, clock, sweeper) = setup();

    store.upsert("h1", "org-1", "key-1", HostStatus::Online);
    clock.advance(Duration::from_secs(120));

    sweeper.sweep().await.unwrap();
    let first = store.find_by_id("h1").await.unwrap().unwrap();

    sweeper.sweep().await.unwrap();
    let second = store.find_by_id("h1").await.unwrap().unwrap();

    assert_eq!(first.status, second.status);
    assert_eq!(first.last_updated, second.last_updated);
}
