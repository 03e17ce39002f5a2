//! # Scanner Core Configuration
//!
//! Service configuration for the orchestration core: which liveness backend
//! to use, circuit breaker thresholds, the periodic job schedule and worker
//! selection limits.
//!
//! Every field has a default so an absent file yields a working
//! single-process setup. Values are layered by [`ConfigManager`]: YAML file
//! first, then `SCANNER__<SECTION>__<FIELD>` environment variables.
//!
//! ```rust,no_run
//! use scanner_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let ttl = manager.config().liveness.ttl();
//! # Ok(())
//! # }
//! ```
//!
//! This is not the scan engine configuration. User-editable engine YAML is
//! parsed by [`crate::plan::ScanEngineConfig`].

pub mod error;
pub mod loader;

use crate::constants::{liveness, scheduler};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root service configuration mirroring `config/scanner.yaml`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Worker liveness store
    pub liveness: LivenessConfig,

    /// Circuit breaker guarding the distributed liveness backend
    pub circuit_breaker: CircuitBreakerConfig,

    /// Periodic maintenance jobs
    pub scheduler: SchedulerConfig,

    /// Load limits used when picking a worker
    pub worker_selection: WorkerSelectionConfig,
}

/// Liveness backend kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LivenessBackendKind {
    Redis,
    Memory,
    /// Liveness disabled: no worker is ever online
    None,
}

impl FromStr for LivenessBackendKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "redis" | "dragonfly" => Ok(Self::Redis),
            "memory" | "in-memory" => Ok(Self::Memory),
            "none" | "noop" | "disabled" => Ok(Self::None),
            other => Err(ConfigurationError::invalid_value(
                "liveness.backend",
                other,
                "expected one of: redis, memory, none",
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LivenessConfig {
    pub backend: LivenessBackendKind,
    pub redis_url: Option<String>,
    pub ttl_seconds: u64,
    pub heartbeat_interval_seconds: u64,
    /// Per-attempt Redis connect timeout
    pub connect_timeout_ms: u64,
    /// Timeout applied to every Redis command
    pub response_timeout_ms: u64,
    /// Reconnect attempts after the first failed connect
    pub connect_retries: usize,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            backend: LivenessBackendKind::Memory,
            redis_url: None,
            ttl_seconds: liveness::LOAD_RECORD_TTL.as_secs(),
            heartbeat_interval_seconds: liveness::HEARTBEAT_INTERVAL.as_secs(),
            connect_timeout_ms: liveness::REDIS_CONNECT_TIMEOUT.as_millis() as u64,
            response_timeout_ms: liveness::REDIS_RESPONSE_TIMEOUT.as_millis() as u64,
            connect_retries: liveness::REDIS_CONNECT_RETRIES,
        }
    }
}

impl LivenessConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub enabled: bool,
    pub failure_threshold: u32,
    pub timeout_seconds: u64,
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            timeout_seconds: 30,
            success_threshold: 2,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub due_scans_interval_seconds: u64,
    pub statistics_cron: String,
    pub cleanup_cron: String,
    pub misfire_grace_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            due_scans_interval_seconds: scheduler::DUE_SCANS_INTERVAL.as_secs(),
            statistics_cron: scheduler::STATISTICS_CRON.to_string(),
            cleanup_cron: scheduler::CLEANUP_CRON.to_string(),
            misfire_grace_seconds: scheduler::MISFIRE_GRACE.as_secs(),
        }
    }
}

impl SchedulerConfig {
    pub fn due_scans_interval(&self) -> Duration {
        Duration::from_secs(self.due_scans_interval_seconds)
    }

    pub fn misfire_grace(&self) -> Duration {
        Duration::from_secs(self.misfire_grace_seconds)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerSelectionConfig {
    pub max_cpu_percent: f64,
    pub max_memory_percent: f64,
}

impl Default for WorkerSelectionConfig {
    fn default() -> Self {
        Self {
            max_cpu_percent: liveness::DEFAULT_MAX_CPU_PERCENT,
            max_memory_percent: liveness::DEFAULT_MAX_MEMORY_PERCENT,
        }
    }
}

impl ScannerConfig {
    /// Validate cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.liveness.backend == LivenessBackendKind::Redis
            && self
                .liveness
                .redis_url
                .as_deref()
                .map_or(true, str::is_empty)
        {
            return Err(ConfigurationError::missing_required_field(
                "liveness.redis_url",
                "liveness configuration with backend 'redis'",
            ));
        }

        if self.liveness.heartbeat_interval_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "liveness.heartbeat_interval_seconds",
                0,
                "heartbeat interval must be greater than 0",
            ));
        }

        if self.liveness.connect_timeout_ms == 0 || self.liveness.response_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "liveness",
                format!(
                    "connect_timeout_ms={}, response_timeout_ms={}",
                    self.liveness.connect_timeout_ms, self.liveness.response_timeout_ms
                ),
                "redis timeouts must be greater than 0",
            ));
        }

        if self.liveness.ttl_seconds <= self.liveness.heartbeat_interval_seconds {
            return Err(ConfigurationError::invalid_value(
                "liveness.ttl_seconds",
                self.liveness.ttl_seconds,
                "ttl must be longer than the heartbeat interval",
            ));
        }

        if self.circuit_breaker.failure_threshold == 0 || self.circuit_breaker.success_threshold == 0
        {
            return Err(ConfigurationError::invalid_value(
                "circuit_breaker",
                format!(
                    "failure_threshold={}, success_threshold={}",
                    self.circuit_breaker.failure_threshold,
                    self.circuit_breaker.success_threshold
                ),
                "thresholds must be greater than 0",
            ));
        }

        if self.scheduler.due_scans_interval_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "scheduler.due_scans_interval_seconds",
                0,
                "interval must be greater than 0",
            ));
        }

        for (field, expression) in [
            ("scheduler.statistics_cron", &self.scheduler.statistics_cron),
            ("scheduler.cleanup_cron", &self.scheduler.cleanup_cron),
        ] {
            if let Err(e) = cron::Schedule::from_str(expression) {
                return Err(ConfigurationError::invalid_value(
                    field,
                    expression,
                    format!("invalid cron expression: {e}"),
                ));
            }
        }

        for (field, value) in [
            ("worker_selection.max_cpu_percent", self.worker_selection.max_cpu_percent),
            (
                "worker_selection.max_memory_percent",
                self.worker_selection.max_memory_percent,
            ),
        ] {
            if !(value > 0.0 && value <= 100.0) {
                return Err(ConfigurationError::invalid_value(
                    field,
                    value,
                    "percentage must be in (0, 100]",
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ScannerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.liveness.ttl(), Duration::from_secs(15));
        assert_eq!(config.liveness.heartbeat_interval(), Duration::from_secs(3));
        assert_eq!(config.scheduler.misfire_grace(), Duration::from_secs(300));
    }

    #[test]
    fn test_redis_backend_requires_url() {
        let mut config = ScannerConfig::default();
        config.liveness.backend = LivenessBackendKind::Redis;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::MissingRequiredField { .. })
        ));

        config.liveness.redis_url = Some("redis://localhost:6379".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ttl_must_exceed_heartbeat_interval() {
        let mut config = ScannerConfig::default();
        config.liveness.ttl_seconds = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_redis_timeouts_must_be_positive() {
        let mut config = ScannerConfig::default();
        assert_eq!(config.liveness.connect_timeout(), Duration::from_secs(2));
        assert_eq!(config.liveness.response_timeout(), Duration::from_secs(1));

        config.liveness.response_timeout_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("redis timeouts"));
    }

    #[test]
    fn test_invalid_cron_is_rejected() {
        let mut config = ScannerConfig::default();
        config.scheduler.cleanup_cron = "every day".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("scheduler.cleanup_cron"));
    }

    #[test]
    fn test_backend_aliases() {
        assert_eq!(
            "dragonfly".parse::<LivenessBackendKind>().unwrap(),
            LivenessBackendKind::Redis
        );
        assert_eq!(
            "in-memory".parse::<LivenessBackendKind>().unwrap(),
            LivenessBackendKind::Memory
        );
        assert!("memcached".parse::<LivenessBackendKind>().is_err());
    }
}
