//! Advisory connection open/close counters.

use crate::types::ConnectionKind;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifetime open/close counters, fed by transport callbacks.
///
/// No decisions are made here; the snapshot is reported periodically
/// and that is all.
#[derive(Default)]
pub struct ConnectionStats {
    hosts_opened: AtomicU64,
    hosts_closed: AtomicU64,
    clients_opened: AtomicU64,
    clients_closed: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub hosts_opened: u64,
    pub hosts_closed: u64,
    pub clients_opened: u64,
    pub clients_closed: u64,
}

impl StatsSnapshot {
    pub fn active_hosts(&self) -> u64 {
        self.hosts_opened.saturating_sub(self.hosts_closed)
    }

    pub fn active_clients(&self) -> u64 {
        self.clients_opened.saturating_sub(self.clients_closed)
    }
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self, kind: ConnectionKind) {
        match kind {
            ConnectionKind::Host => self.hosts_opened.fetch_add(1, Ordering::Relaxed),
            ConnectionKind::Client => self.clients_opened.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn connection_closed(&self, kind: ConnectionKind) {
        match kind {
            ConnectionKind::Host => self.hosts_closed.fetch_add(1, Ordering::Relaxed),
            ConnectionKind::Client => self.clients_closed.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hosts_opened: self.hosts_opened.load(Ordering::Relaxed),
            hosts_closed: self.hosts_closed.load(Ordering::Relaxed),
            clients_opened: self.clients_opened.load(Ordering::Relaxed),
            clients_closed: self.clients_closed.load(Ordering::Relaxed),
        }
    }
}
