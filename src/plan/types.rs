//! Execution plan types produced by the builder and consumed by the dispatcher.

use super::engine_config::ToolSet;
use crate::constants::{ScanType, StageMode};
use serde::Serialize;
use std::collections::BTreeMap;

/// A materialized stage: the enabled subset of one stage-table row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedStage {
    /// Position of the row in the global stage table
    pub index: usize,
    pub name: &'static str,
    pub mode: StageMode,
    pub scan_types: Vec<ScanType>,
}

/// Ordered stages plus the resolved tools of every planned scan type
///
/// Built once per orchestration run, consumed by exactly one dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionPlan {
    stages: Vec<PlannedStage>,
    tools: BTreeMap<ScanType, ToolSet>,
    declared_order: Vec<ScanType>,
}

impl ExecutionPlan {
    pub(crate) fn new(
        stages: Vec<PlannedStage>,
        tools: BTreeMap<ScanType, ToolSet>,
        declared_order: Vec<ScanType>,
    ) -> Self {
        Self {
            stages,
            tools,
            declared_order,
        }
    }

    pub fn stages(&self) -> &[PlannedStage] {
        &self.stages
    }

    /// Enabled tools of a planned scan type
    pub fn tools_for(&self, scan_type: ScanType) -> Option<&ToolSet> {
        self.tools.get(&scan_type)
    }

    /// Planned scan types in execution order
    pub fn enabled_scan_types(&self) -> Vec<ScanType> {
        self.stages
            .iter()
            .flat_map(|stage| stage.scan_types.iter().copied())
            .collect()
    }

    /// Enabled scan types in the order the user declared them
    pub fn declared_order(&self) -> &[ScanType] {
        &self.declared_order
    }

    pub fn total_tools(&self) -> usize {
        self.tools.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
