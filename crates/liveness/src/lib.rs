//! Liveness and self-healing subsystem for the Hostlink connection registry.
//!
//! Decides, under uncertainty, whether a remotely connected host or client
//! is still alive, reconciles that belief against the persisted status
//! record, and mutates state when the two diverge for long enough: demotes
//! stale ONLINE records, resolves long-UNREACHABLE records, purges dead
//! ones, and as a last resort restarts the process.
//!
//! # Components
//!
//! - **ConnectionRegistry**: in-memory map of live connections; ground
//!   truth for "is a socket open right now"
//! - **LivenessSweeper**: demotes stale ONLINE records to UNREACHABLE and
//!   ages out terminal records
//! - **ReconnectReconciler**: resolves long-UNREACHABLE records as either
//!   superseded (delete) or genuinely gone (OFFLINE)
//! - **ServerHealthMonitor**: audits registry/store consistency and
//!   escalates to a supervisor-assisted restart on sustained failure
//! - **PingFailureTracker / ConnectionStats**: passive counters fed by the
//!   transport layer, periodically reported
//!
//! The WebSocket transport and the persistence layer live outside this
//! crate: the transport feeds the registry and the ping callbacks, and
//! persistence is consumed through the [`HostStatusStore`] trait. Every
//! monitor is an independent periodic task with its own failure boundary;
//! a failed cycle is logged and retried on the next tick, never propagated
//! into another monitor's loop.

pub mod config;
pub mod health;
pub mod ping;
pub mod reconciler;
pub mod registry;
pub mod service;
pub mod stats;
pub mod store;
pub mod sweeper;
pub mod types;

pub use config::{Config, ConfigError};
pub use health::{HealthCheckState, ProcessExit, RestartSignal, ServerHealthMonitor};
pub use ping::{PingFailureReport, PingFailureTracker};
pub use reconciler::ReconnectReconciler;
pub use registry::ConnectionRegistry;
pub use service::LivenessService;
pub use stats::{ConnectionStats, StatsSnapshot};
pub use store::{HostStatusStore, ManualClock, MemoryStatusStore, StoreClock, SystemClock};
pub use sweeper::LivenessSweeper;
pub use types::{
    ConnectionHandle, ConnectionKind, HostRecord, HostStatus, MonitorConfig, PingFailureEntry,
};
