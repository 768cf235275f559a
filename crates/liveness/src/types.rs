//! Core types for the liveness subsystem.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;

/// Persisted status of a host record.
///
/// Legal transitions inside this subsystem are ONLINE -> UNREACHABLE ->
/// {OFFLINE, deleted} and UNREACHABLE -> deleted. A record only goes back
/// to ONLINE through a fresh connection event from the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HostStatus {
    /// Host has a live connection and a recent heartbeat.
    Online,
    /// Heartbeat missed; still expected to come back.
    Unreachable,
    /// Terminal; preserved for history until the retention window expires.
    Offline,
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostStatus::Online => write!(f, "ONLINE"),
            HostStatus::Unreachable => write!(f, "UNREACHABLE"),
            HostStatus::Offline => write!(f, "OFFLINE"),
        }
    }
}

/// Which side of the wire a connection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    Host,
    Client,
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionKind::Host => write!(f, "host"),
            ConnectionKind::Client => write!(f, "client"),
        }
    }
}

/// Durable record of a host's last-known status.
///
/// `last_updated` is stamped with the store's clock, never a client clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostRecord {
    pub id: String,
    pub org_id: String,
    pub api_key_id: String,
    pub status: HostStatus,
    pub last_updated: DateTime<Utc>,
}

/// In-memory handle for a live connection.
///
/// Created by the transport layer on connect, removed on disconnect.
/// Never persisted; lifetime is bounded by the process.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: String,
    pub org_id: String,
    pub api_key_id: String,
    /// Channel to the transport writer task for this connection.
    pub outbound: mpsc::Sender<Bytes>,
    pub connected_at: DateTime<Utc>,
}

impl ConnectionHandle {
    /// Create a new handle, stamped with the current wall-clock time.
    pub fn new(
        id: impl Into<String>,
        org_id: impl Into<String>,
        api_key_id: impl Into<String>,
        outbound: mpsc::Sender<Bytes>,
    ) -> Self {
        Self {
            id: id.into(),
            org_id: org_id.into(),
            api_key_id: api_key_id.into(),
            outbound,
            connected_at: Utc::now(),
        }
    }
}

/// Per-identifier ping failure bookkeeping.
///
/// An identifier has an entry iff it currently has at least one
/// unacknowledged ping failure since the last success.
#[derive(Debug, Clone)]
pub struct PingFailureEntry {
    pub kind: ConnectionKind,
    pub org_id: Option<String>,
    pub user_id: Option<String>,
    pub failures: u32,
    pub first_failure: DateTime<Utc>,
    pub last_failure: DateTime<Utc>,
}

/// Timing and threshold configuration shared by all monitors.
///
/// Every constant gating a state transition is named here rather than
/// inlined at the call site; see `config` for the YAML surface.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// How often the liveness sweeper runs.
    pub sweep_interval: Duration,

    /// ONLINE records idle longer than this are demoted to UNREACHABLE.
    pub liveness_timeout: Duration,

    /// UNREACHABLE/OFFLINE records idle longer than this are deleted.
    pub retention_window: Duration,

    /// How often the reconnect reconciler runs.
    pub reconcile_interval: Duration,

    /// UNREACHABLE records younger than this are left for the sweeper's
    /// grace period; the reconciler never touches them.
    pub unreachable_threshold: Duration,

    /// How often the server health monitor runs.
    pub health_check_interval: Duration,

    /// Consecutive failing health cycles before escalation.
    pub restart_threshold: u32,

    /// Minimum gap between self-restarts.
    pub restart_cooldown: Duration,

    /// Health check fails when more ONLINE hosts than this have no live
    /// connection. Inherited tunable with no derivation on record.
    pub missing_host_threshold: usize,

    /// Grace given to the observability sink before the process exits.
    pub escalation_flush_delay: Duration,

    /// Minimum gap between ping failure reports.
    pub ping_log_interval: Duration,

    /// Ping failure count above which an entry is reported as critical.
    pub critical_ping_failures: u32,

    /// How often connection statistics are reported.
    pub stats_report_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(30),
            liveness_timeout: Duration::from_secs(60),
            retention_window: Duration::from_secs(6 * 60 * 60),
            reconcile_interval: Duration::from_secs(15 * 60),
            unreachable_threshold: Duration::from_secs(30 * 60),
            health_check_interval: Duration::from_secs(60),
            restart_threshold: 3,
            restart_cooldown: Duration::from_secs(60 * 60),
            missing_host_threshold: 3,
            escalation_flush_delay: Duration::from_secs(2),
            ping_log_interval: Duration::from_secs(5 * 60),
            critical_ping_failures: 3,
            stats_report_interval: Duration::from_secs(60 * 60),
        }
    }
}
