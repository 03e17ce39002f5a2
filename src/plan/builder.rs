//! # Execution Plan Builder
//!
//! Compiles raw engine configuration text into an [`ExecutionPlan`].
//!
//! ```text
//! raw YAML -> ScanEngineConfig -> enabled scan types (declaration order)
//!          -> resolved tool sets -> stage table walk -> ExecutionPlan
//! ```
//!
//! Building is pure: no I/O beyond reading the input string, and identical
//! input always yields an identical plan.

use super::engine_config::ScanEngineConfig;
use super::types::{ExecutionPlan, PlannedStage};
use crate::constants::{ExecutionStage, ScanType, EXECUTION_STAGES};
use crate::error::ConfigError;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Stateless plan builder over a fixed stage table
#[derive(Debug, Clone, Copy)]
pub struct ExecutionPlanBuilder {
    stage_table: &'static [ExecutionStage],
}

impl Default for ExecutionPlanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionPlanBuilder {
    /// Builder over the global stage table
    pub fn new() -> Self {
        Self {
            stage_table: EXECUTION_STAGES,
        }
    }

    /// Builder over a custom stage table
    pub fn with_stage_table(stage_table: &'static [ExecutionStage]) -> Self {
        Self { stage_table }
    }

    /// Build an execution plan from raw engine configuration text
    pub fn build(&self, raw_config: &str) -> Result<ExecutionPlan, ConfigError> {
        let config = ScanEngineConfig::parse(raw_config)?;
        self.build_from_config(&config)
    }

    /// Build an execution plan from an already parsed configuration
    pub fn build_from_config(&self, config: &ScanEngineConfig) -> Result<ExecutionPlan, ConfigError> {
        let declared = config.detect_enabled();
        if declared.is_empty() {
            return Err(ConfigError::NoEnabledScanTypes {
                supported: ScanType::supported_names(),
                present: config.keys().map(str::to_string).collect(),
            });
        }

        info!(
            declared_order = ?declared.iter().map(ScanType::as_str).collect::<Vec<_>>(),
            "Detected enabled scan types"
        );

        // Any resolution failure aborts the whole build
        let mut tools = BTreeMap::new();
        for scan_type in &declared {
            let tool_set = config.resolve_tools(*scan_type)?;
            debug!(
                scan_type = %scan_type,
                tools = ?tool_set.keys().collect::<Vec<_>>(),
                "Resolved enabled tools"
            );
            tools.insert(*scan_type, tool_set);
        }

        let mut stages = Vec::new();
        for (index, stage) in self.stage_table.iter().enumerate() {
            let scan_types: Vec<ScanType> = stage
                .scan_types
                .iter()
                .copied()
                .filter(|scan_type| tools.contains_key(scan_type))
                .collect();

            if scan_types.is_empty() {
                continue;
            }

            stages.push(PlannedStage {
                index,
                name: stage.name,
                mode: stage.mode,
                scan_types,
            });
        }

        // Enabled but absent from the stage table: dropped, see DESIGN.md
        let scheduled: Vec<ScanType> = stages
            .iter()
            .flat_map(|stage| stage.scan_types.iter().copied())
            .collect();
        tools.retain(|scan_type, _| {
            let keep = scheduled.contains(scan_type);
            if !keep {
                warn!(scan_type = %scan_type, "Enabled scan type has no stage, dropping it from the plan");
            }
            keep
        });

        if stages.is_empty() {
            return Err(ConfigError::NoEnabledScanTypes {
                supported: self
                    .stage_table
                    .iter()
                    .flat_map(|stage| stage.scan_types.iter().map(|t| t.as_str().to_string()))
                    .collect(),
                present: config.keys().map(str::to_string).collect(),
            });
        }

        info!(
            stages = ?stages
                .iter()
                .map(|s| format!("{}[{}]: {:?}", s.name, s.mode, s.scan_types))
                .collect::<Vec<_>>(),
            "Execution plan built"
        );

        Ok(ExecutionPlan::new(stages, tools, declared))
    }
}
