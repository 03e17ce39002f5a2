//! # Error Types
//!
//! Error taxonomy for the orchestration core.
//!
//! - [`ConfigError`]: malformed or under-specified scan engine configuration.
//!   Always fatal to the current build and never retried.
//! - [`DispatchError`]: a planned scan type could not run or its handler
//!   failed. Aborts the rest of the plan.
//! - [`StoreError`]: the liveness store is unreachable or returned garbage.
//!   Contained by [`crate::liveness::WorkerLoadTracker`], never escapes to callers.
//! - [`SchedulerJobError`]: a periodic job callback failed. Logged and
//!   swallowed by the scheduler.
//!
//! `ConfigError` and `DispatchError` propagate to whoever initiated an
//! orchestration run, wrapped in [`OrchestratorError`].

use crate::config::ConfigurationError;
use crate::constants::{ScanType, StageMode};
use crate::orchestration::types::AggregatedResult;
use thiserror::Error;

/// Scan engine configuration errors raised by the execution plan builder
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Scan engine configuration is empty")]
    Empty,

    #[error("Failed to parse scan engine configuration: {0}")]
    Parse(String),

    #[error("Scan engine configuration must be a mapping of scan type to settings, got {found}")]
    NotAMapping { found: String },

    #[error(
        "No enabled scan type found. Supported scan types: [{}]. Keys present: [{}]",
        supported.join(", "),
        present.join(", ")
    )]
    NoEnabledScanTypes {
        supported: Vec<String>,
        present: Vec<String>,
    },

    #[error("Invalid configuration for tool '{tool}' of {scan_type}: {reason}")]
    InvalidToolConfig {
        scan_type: ScanType,
        tool: String,
        reason: String,
    },

    #[error("Invalid '{grouping}' section for {scan_type}: {reason}")]
    InvalidToolGrouping {
        scan_type: ScanType,
        grouping: &'static str,
        reason: String,
    },
}

/// Failure of a single scan type inside a stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTypeFailure {
    pub scan_type: ScanType,
    pub tool: Option<String>,
    pub error: String,
}

impl std::fmt::Display for ScanTypeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.tool {
            Some(tool) => write!(f, "{} ({}): {}", self.scan_type, tool, self.error),
            None => write!(f, "{}: {}", self.scan_type, self.error),
        }
    }
}

/// Errors raised while dispatching an execution plan
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("No handler registered for scan type {scan_type} (stage {stage_index})")]
    MissingHandler {
        scan_type: ScanType,
        stage_index: usize,
    },

    #[error(
        "Stage {stage_index} ({stage_name}, {mode}) failed: {}",
        failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
    )]
    StageFailed {
        stage_index: usize,
        stage_name: &'static str,
        mode: StageMode,
        failures: Vec<ScanTypeFailure>,
        /// Everything that ran before the run aborted, including the failed stage
        partial: Box<AggregatedResult>,
    },
}

impl DispatchError {
    /// Results collected before the run aborted, if any scan type ran
    pub fn partial_result(&self) -> Option<&AggregatedResult> {
        match self {
            Self::StageFailed { partial, .. } => Some(partial),
            Self::MissingHandler { .. } => None,
        }
    }
}

/// Liveness store failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("Liveness store connection error: {0}")]
    Connection(String),

    #[error("Liveness store backend error: {0}")]
    Backend(String),

    #[error("Malformed liveness record for key {key}: {reason}")]
    MalformedRecord { key: String, reason: String },
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            StoreError::Connection(err.to_string())
        } else {
            StoreError::Backend(err.to_string())
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failure inside a periodic job callback
#[derive(Debug, Error)]
#[error("Job '{job_id}' failed: {source}")]
pub struct SchedulerJobError {
    pub job_id: &'static str,
    #[source]
    pub source: anyhow::Error,
}

/// Scheduler construction errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulerError {
    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCron { expression: String, reason: String },

    #[error("Invalid interval for job '{job_id}': interval must be greater than zero")]
    InvalidInterval { job_id: String },

    #[error("Scheduler must be started from within a tokio runtime")]
    NoRuntime,
}

/// Umbrella error for an orchestration run and process bootstrap
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_enabled_scan_types_lists_supported_and_present() {
        let err = ConfigError::NoEnabledScanTypes {
            supported: vec!["port_scan".to_string(), "vuln_scan".to_string()],
            present: vec!["unknown".to_string()],
        };
        let message = err.to_string();
        assert!(message.contains("port_scan, vuln_scan"));
        assert!(message.contains("[unknown]"));
    }

    #[test]
    fn test_scan_type_failure_display_includes_tool() {
        let failure = ScanTypeFailure {
            scan_type: ScanType::PortScan,
            tool: Some("naabu_active".to_string()),
            error: "exit status 1".to_string(),
        };
        assert_eq!(failure.to_string(), "port_scan (naabu_active): exit status 1");
    }

    #[test]
    fn test_missing_handler_has_no_partial_result() {
        let err = DispatchError::MissingHandler {
            scan_type: ScanType::VulnScan,
            stage_index: 2,
        };
        assert!(err.partial_result().is_none());
        assert!(err.to_string().contains("vuln_scan"));
    }
}
