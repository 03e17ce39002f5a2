//! # Orchestration Types
//!
//! Types shared between the stage dispatcher and scan-type handlers: the run
//! context a handler receives, the request it is invoked with, and the
//! aggregated result handed back to whoever started the run.

use crate::constants::{ScanType, StageMode};
use crate::plan::ToolSet;
use crate::registry::ToolInputType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Identifiers and paths of one orchestration run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    pub run_id: Uuid,
    pub scan_id: i64,
    pub target_id: i64,
    pub target_name: String,
    /// Root working directory of the scan; each scan type gets a subdirectory
    pub workspace_dir: PathBuf,
}

impl RunContext {
    pub fn new(
        scan_id: i64,
        target_id: i64,
        target_name: impl Into<String>,
        workspace_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            scan_id,
            target_id,
            target_name: target_name.into(),
            workspace_dir: workspace_dir.into(),
        }
    }

    /// Working directory reserved for one scan type
    pub fn workspace_for(&self, scan_type: ScanType) -> PathBuf {
        self.workspace_dir.join(scan_type.as_str())
    }
}

/// Everything a scan-type handler is invoked with
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanTypeRequest {
    pub run: RunContext,
    pub scan_type: ScanType,
    pub stage_index: usize,
    /// Enabled tools only
    pub tools: ToolSet,
    /// Enabled tool names partitioned by the input they consume
    pub tool_groups: BTreeMap<ToolInputType, Vec<String>>,
}

impl ScanTypeRequest {
    pub fn workspace_dir(&self) -> PathBuf {
        self.run.workspace_for(self.scan_type)
    }

    /// Tools consuming the given input type, in name order
    pub fn tools_with_input(&self, input_type: ToolInputType) -> &[String] {
        self.tool_groups
            .get(&input_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Error returned by a scan-type handler
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    /// Tool that caused the failure, when the handler knows it
    pub tool: Option<String>,
    pub message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            tool: None,
            message: message.into(),
        }
    }

    pub fn for_tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool: Some(tool.into()),
            message: message.into(),
        }
    }
}

/// Outcome of one scan type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanTypeOutcome {
    Succeeded {
        output: serde_json::Value,
    },
    Failed {
        tool: Option<String>,
        error: String,
    },
}

impl ScanTypeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ScanTypeOutcome::Succeeded { .. })
    }
}

/// Result of one scan type within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanTypeResult {
    pub scan_type: ScanType,
    pub stage_index: usize,
    pub mode: StageMode,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
    pub outcome: ScanTypeOutcome,
}

/// Ordered results of a dispatch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub run_id: Uuid,
    /// Execution order; parallel members keep their stage-table order
    pub results: Vec<ScanTypeResult>,
    pub stages_completed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl AggregatedResult {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            results: Vec::new(),
            stages_completed: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn get(&self, scan_type: ScanType) -> Option<&ScanTypeResult> {
        self.results.iter().find(|r| r.scan_type == scan_type)
    }

    pub fn executed_scan_types(&self) -> Vec<ScanType> {
        self.results.iter().map(|r| r.scan_type).collect()
    }

    pub fn failed(&self) -> impl Iterator<Item = &ScanTypeResult> {
        self.results.iter().filter(|r| !r.outcome.is_success())
    }

    pub fn is_success(&self) -> bool {
        self.results.iter().all(|r| r.outcome.is_success())
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_is_namespaced_by_scan_type() {
        let context = RunContext::new(7, 3, "example.com", "/data/scans/7");
        assert_eq!(
            context.workspace_for(ScanType::PortScan),
            PathBuf::from("/data/scans/7/port_scan")
        );
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let outcome = ScanTypeOutcome::Failed {
            tool: Some("nuclei".to_string()),
            error: "timeout".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["tool"], "nuclei");
    }

    #[test]
    fn test_aggregated_result_lookup() {
        let mut aggregated = AggregatedResult::new(Uuid::new_v4());
        aggregated.results.push(ScanTypeResult {
            scan_type: ScanType::SiteScan,
            stage_index: 0,
            mode: StageMode::Sequential,
            duration: Duration::from_millis(12),
            outcome: ScanTypeOutcome::Succeeded {
                output: serde_json::json!({"sites": 4}),
            },
        });

        assert!(aggregated.is_success());
        assert!(aggregated.get(ScanType::SiteScan).is_some());
        assert!(aggregated.get(ScanType::VulnScan).is_none());
        assert_eq!(aggregated.failed().count(), 0);
    }
}
