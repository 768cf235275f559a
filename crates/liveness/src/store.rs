//! Persisted host status store interface and in-memory reference implementation.

use crate::types::{HostRecord, HostStatus};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use common::Result;
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Convert a staleness window into the store clock's delta type.
pub(crate) fn staleness_window(window: Duration) -> TimeDelta {
    TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX)
}

/// Durable record of each host's last-known status.
///
/// All staleness decisions are made against the store's own clock
/// (`now`), never a monitor's local clock, so clock skew between the
/// process and the database cannot produce false positives. Bulk
/// mutations are single conditional operations: concurrent sweeps
/// commute and there is no read-modify-write window.
#[async_trait]
pub trait HostStatusStore: Send + Sync {
    /// All records currently holding `status`.
    async fn find_by_status(&self, status: HostStatus) -> Result<Vec<HostRecord>>;

    /// Look up a single record.
    async fn find_by_id(&self, id: &str) -> Result<Option<HostRecord>>;

    /// Atomically move every record with status `from` whose last update
    /// is at least `older_than` in the past to status `to`, refreshing
    /// its timestamp. The cutoff is inclusive, so a zero window demotes
    /// every `from` record, even one stamped in the current clock
    /// instant. Returns the affected records.
    async fn transition_older_than(
        &self,
        from: HostStatus,
        to: HostStatus,
        older_than: Duration,
    ) -> Result<Vec<HostRecord>>;

    /// Delete every record whose status is in `statuses` and whose last
    /// update is more than `older_than` in the past. Returns the deleted
    /// records.
    async fn delete_older_than(
        &self,
        statuses: &[HostStatus],
        older_than: Duration,
    ) -> Result<Vec<HostRecord>>;

    /// Set a single record's status, refreshing its timestamp. A missing
    /// id is a no-op, so re-resolving an already-deleted record is safe.
    async fn update_status(&self, id: &str, status: HostStatus) -> Result<()>;

    /// Delete a single record. A missing id is a no-op.
    async fn delete_by_id(&self, id: &str) -> Result<()>;

    /// Trivial round-trip to verify the store is reachable.
    async fn probe(&self) -> Result<()>;

    /// The store's clock.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock used by [`MemoryStatusStore`] to stamp and compare records.
pub trait StoreClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
pub struct SystemClock;

impl StoreClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for deterministic tests.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += staleness_window(by);
    }
}

impl StoreClock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// In-memory [`HostStatusStore`].
///
/// Reference implementation backing the test suite; also usable for
/// local development without a database.
pub struct MemoryStatusStore {
    records: DashMap<String, HostRecord>,
    clock: Arc<dyn StoreClock>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn StoreClock>) -> Self {
        Self {
            records: DashMap::new(),
            clock,
        }
    }

    /// Insert or replace a record, stamping it with the store clock.
    /// This is what a fresh connection event from the transport layer
    /// does to bring a host ONLINE.
    pub fn upsert(
        &self,
        id: impl Into<String>,
        org_id: impl Into<String>,
        api_key_id: impl Into<String>,
        status: HostStatus,
    ) -> HostRecord {
        let record = HostRecord {
            id: id.into(),
            org_id: org_id.into(),
            api_key_id: api_key_id.into(),
            status,
            last_updated: self.clock.now(),
        };
        self.records.insert(record.id.clone(), record.clone());
        record
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for MemoryStatusStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostStatusStore for MemoryStatusStore {
    async fn find_by_status(&self, status: HostStatus) -> Result<Vec<HostRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.status == status)
            .map(|r| r.value().clone())
            .collect())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<HostRecord>> {
        Ok(self.records.get(id).map(|r| r.value().clone()))
    }

    async fn transition_older_than(
        &self,
        from: HostStatus,
        to: HostStatus,
        older_than: Duration,
    ) -> Result<Vec<HostRecord>> {
        let now = self.clock.now();
        let cutoff = now - staleness_window(older_than);
        let mut affected = Vec::new();

        for mut entry in self.records.iter_mut() {
            if entry.status == from && entry.last_updated <= cutoff {
                entry.status = to;
                entry.last_updated = now;
                affected.push(entry.value().clone());
            }
        }

        Ok(affected)
    }

    async fn delete_older_than(
        &self,
        statuses: &[HostStatus],
        older_than: Duration,
    ) -> Result<Vec<HostRecord>> {
        let cutoff = self.clock.now() - staleness_window(older_than);
        let mut deleted = Vec::new();

        self.records.retain(|_, record| {
            if statuses.contains(&record.status) && record.last_updated < cutoff {
                deleted.push(record.clone());
                false
            } else {
                true
            }
        });

        Ok(deleted)
    }

    async fn update_status(&self, id: &str, status: HostStatus) -> Result<()> {
        if let Some(mut record) = self.records.get_mut(id) {
            record.status = status;
            record.last_updated = self.clock.now();
        }
        Ok(())
    }

    async fn delete_by_id(&self, id: &str) -> Result<()> {
        self.records.remove(id);
        Ok(())
    }

    async fn probe(&self) -> Result<()> {
        Ok(())
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
