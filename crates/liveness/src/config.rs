//! Configuration loading and validation for the liveness subsystem.

use crate::types::MonitorConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use validator::{Validate, ValidationError};

// Re-export Validate trait for derive macro
#[allow(unused_imports)]
use validator::Validate as _;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sweeper: SweeperSettings,

    #[serde(default)]
    pub reconciler: ReconcilerSettings,

    #[serde(default)]
    pub health: HealthSettings,

    #[serde(default)]
    pub ping: PingSettings,

    #[serde(default)]
    pub stats: StatsSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Validate for Config {
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        self.sweeper.validate()?;
        self.reconciler.validate()?;
        self.health.validate()?;
        self.ping.validate()?;
        Ok(())
    }
}

/// Liveness sweeper settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SweeperSettings {
    /// Must be short enough that the one-minute liveness window stays
    /// meaningful.
    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_sweep_interval")]
    pub interval: Duration,

    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_liveness_timeout")]
    pub liveness_timeout: Duration,

    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_retention_window")]
    pub retention_window: Duration,
}

/// Reconnect reconciler settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReconcilerSettings {
    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_reconcile_interval")]
    pub interval: Duration,

    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_unreachable_threshold")]
    pub unreachable_threshold: Duration,
}

/// Server health monitor settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct HealthSettings {
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    #[validate(range(min = 1, max = 10))]
    pub restart_threshold: u32,

    #[serde(with = "humantime_serde")]
    pub restart_cooldown: Duration,

    /// Inherited tunable with no derivation on record; kept configurable.
    #[validate(range(min = 0, max = 1000))]
    pub missing_host_threshold: usize,

    #[serde(with = "humantime_serde")]
    pub flush_delay: Duration,
}

/// Ping failure tracking settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PingSettings {
    #[serde(with = "humantime_serde")]
    pub log_interval: Duration,

    #[validate(range(min = 1, max = 100))]
    pub critical_failures: u32,
}

/// Connection statistics settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSettings {
    #[serde(with = "humantime_serde")]
    pub report_interval: Duration,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: Option<String>,
    pub format: Option<String>,
}

// Default implementations

impl Default for SweeperSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            liveness_timeout: Duration::from_secs(60),
            retention_window: Duration::from_secs(6 * 60 * 60),
        }
    }
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15 * 60),
            unreachable_threshold: Duration::from_secs(30 * 60),
        }
    }
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            restart_threshold: 3,
            restart_cooldown: Duration::from_secs(60 * 60),
            missing_host_threshold: 3,
            flush_delay: Duration::from_secs(2),
        }
    }
}

impl Default for PingSettings {
    fn default() -> Self {
        Self {
            log_interval: Duration::from_secs(5 * 60),
            critical_failures: 3,
        }
    }
}

impl Default for StatsSettings {
    fn default() -> Self {
        Self {
            report_interval: Duration::from_secs(60 * 60),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: None,
            format: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sweeper: SweeperSettings::default(),
            reconciler: ReconcilerSettings::default(),
            health: HealthSettings::default(),
            ping: PingSettings::default(),
            stats: StatsSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

// Custom validators

fn validate_sweep_interval(interval: &Duration) -> Result<(), ValidationError> {
    let secs = interval.as_secs();
    if !(1..=60).contains(&secs) {
        return Err(ValidationError::new("sweep_interval_out_of_range"));
    }
    Ok(())
}

fn validate_liveness_timeout(timeout: &Duration) -> Result<(), ValidationError> {
    let secs = timeout.as_secs();
    if !(10..=600).contains(&secs) {
        return Err(ValidationError::new("liveness_timeout_out_of_range"));
    }
    Ok(())
}

fn validate_retention_window(window: &Duration) -> Result<(), ValidationError> {
    let secs = window.as_secs();
    if !(3600..=604_800).contains(&secs) {
        return Err(ValidationError::new("retention_window_out_of_range"));
    }
    Ok(())
}

fn validate_reconcile_interval(interval: &Duration) -> Result<(), ValidationError> {
    let secs = interval.as_secs();
    if !(60..=3600).contains(&secs) {
        return Err(ValidationError::new("reconcile_interval_out_of_range"));
    }
    Ok(())
}

fn validate_unreachable_threshold(threshold: &Duration) -> Result<(), ValidationError> {
    let secs = threshold.as_secs();
    if !(60..=86_400).contains(&secs) {
        return Err(ValidationError::new("unreachable_threshold_out_of_range"));
    }
    Ok(())
}

// Configuration loading implementation

impl Config {
    /// Load configuration from default search paths
    pub fn load() -> Result<Self, ConfigError> {
        match Self::find_config_file() {
            Some(path) => {
                tracing::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(&path)
            }
            None => {
                tracing::info!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/hostlink/liveness.yaml")];

        if let Some(home_path) = Self::home_config_path() {
            paths.push(home_path);
        }

        paths.push(PathBuf::from("./liveness.yaml"));

        paths
            .into_iter()
            .find(|p: &PathBuf| p.exists() && p.is_file())
    }

    /// Get home directory config path
    fn home_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config/hostlink/liveness.yaml"))
    }

    /// Convert to the internal monitor configuration
    pub fn to_monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            sweep_interval: self.sweeper.interval,
            liveness_timeout: self.sweeper.liveness_timeout,
            retention_window: self.sweeper.retention_window,
            reconcile_interval: self.reconciler.interval,
            unreachable_threshold: self.reconciler.unreachable_threshold,
            health_check_interval: self.health.interval,
            restart_threshold: self.health.restart_threshold,
            restart_cooldown: self.health.restart_cooldown,
            missing_host_threshold: self.health.missing_host_threshold,
            escalation_flush_delay: self.health.flush_delay,
            ping_log_interval: self.ping.log_interval,
            critical_ping_failures: self.ping.critical_failures,
            stats_report_interval: self.stats.report_interval,
        }
    }
}
