//! Passive ping-failure bookkeeping.

use crate::types::{ConnectionKind, PingFailureEntry};
use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, info, warn};

/// Tracks consecutive ping failures per connection identifier.
///
/// Pure bookkeeping: nothing here mutates persisted state or tears down
/// connections. Entries are created on the first missed ping and removed
/// the moment the transport layer reports a successful one; the tracker
/// never expires entries on its own.
pub struct PingFailureTracker {
    entries: DashMap<String, PingFailureEntry>,
    critical_threshold: u32,
}

/// Point-in-time view of outstanding ping failures, partitioned by kind.
/// `critical` holds the entries whose failure count exceeds the tracker's
/// threshold, regardless of kind.
#[derive(Debug, Default)]
pub struct PingFailureReport {
    pub hosts: Vec<(String, u32)>,
    pub clients: Vec<(String, u32)>,
    pub critical: Vec<(String, PingFailureEntry)>,
}

impl PingFailureTracker {
    pub fn new(critical_threshold: u32) -> Self {
        Self {
            entries: DashMap::new(),
            critical_threshold,
        }
    }

    /// Record a missed ping, creating the entry on first failure.
    pub fn record_failure(
        &self,
        id: &str,
        kind: ConnectionKind,
        org_id: Option<String>,
        user_id: Option<String>,
    ) {
        let now = Utc::now();
        self.entries
            .entry(id.to_string())
            .and_modify(|entry| {
                entry.failures += 1;
                entry.last_failure = now;
            })
            .or_insert_with(|| PingFailureEntry {
                kind,
                org_id,
                user_id,
                failures: 1,
                first_failure: now,
                last_failure: now,
            });
    }

    /// A ping succeeded; drop the identifier's failure history.
    pub fn clear_failure(&self, id: &str) {
        self.entries.remove(id);
    }

    pub fn get(&self, id: &str) -> Option<PingFailureEntry> {
        self.entries.get(id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build a [`PingFailureReport`] from the current entries in a single
    /// pass, classifying any entry with more failures than the critical
    /// threshold as critical.
    pub fn report(&self) -> PingFailureReport {
        let mut report = PingFailureReport::default();

        for entry in self.entries.iter() {
            let line = (entry.key().clone(), entry.failures);
            match entry.kind {
                ConnectionKind::Host => report.hosts.push(line),
                ConnectionKind::Client => report.clients.push(line),
            }
            if entry.failures > self.critical_threshold {
                report.critical.push((entry.key().clone(), entry.value().clone()));
            }
        }

        report
    }

    /// Log the current report. Entries past the critical threshold get a
    /// separate, louder record.
    pub fn flush(&self) {
        if self.entries.is_empty() {
            debug!("No outstanding ping failures");
            return;
        }

        let report = self.report();

        info!(
            hosts = report.hosts.len(),
            clients = report.clients.len(),
            host_failures = ?report.hosts,
            client_failures = ?report.clients,
            "Outstanding ping failures"
        );

        for (id, entry) in report.critical {
            warn!(
                id = %id,
                kind = %entry.kind,
                failures = entry.failures,
                org = entry.org_id.as_deref().unwrap_or("-"),
                first_failure = %entry.first_failure,
                last_failure = %entry.last_failure,
                "Connection critically missing pings"
            );
        }
    }
}
