//! # Scan Orchestrator
//!
//! Entry point for one orchestration run: builds the execution plan from the
//! raw scan engine configuration and hands it to the stage dispatcher.

use crate::error::{ConfigError, Result};
use crate::orchestration::stage_dispatcher::StageDispatcher;
use crate::orchestration::types::{AggregatedResult, RunContext};
use crate::plan::{ExecutionPlan, ExecutionPlanBuilder};
use crate::registry::HandlerRegistry;
use std::sync::Arc;
use tracing::info;

/// Builder + dispatcher bound to a fixed handler registry
#[derive(Debug, Clone)]
pub struct ScanOrchestrator {
    builder: ExecutionPlanBuilder,
    dispatcher: StageDispatcher,
    registry: Arc<HandlerRegistry>,
}

impl ScanOrchestrator {
    /// Orchestrator using the global stage table and the builtin tool catalog
    pub fn new(registry: HandlerRegistry) -> Self {
        Self::with_components(
            ExecutionPlanBuilder::new(),
            StageDispatcher::default(),
            Arc::new(registry),
        )
    }

    pub fn with_components(
        builder: ExecutionPlanBuilder,
        dispatcher: StageDispatcher,
        registry: Arc<HandlerRegistry>,
    ) -> Self {
        Self {
            builder,
            dispatcher,
            registry,
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Build the plan without executing it
    pub fn plan(&self, raw_config: &str) -> std::result::Result<ExecutionPlan, ConfigError> {
        self.builder.build(raw_config)
    }

    /// Build and execute the plan for one scan
    pub async fn execute(&self, raw_config: &str, context: &RunContext) -> Result<AggregatedResult> {
        let plan = self.plan(raw_config)?;

        info!(
            run_id = %context.run_id,
            scan_id = context.scan_id,
            declared_order = ?plan.declared_order(),
            "Enabled scan types in declaration order"
        );
        for stage in plan.stages() {
            info!(
                run_id = %context.run_id,
                stage_index = stage.index,
                stage = stage.name,
                mode = %stage.mode,
                scan_types = ?stage.scan_types,
                "Planned stage"
            );
        }

        let aggregated = self.dispatcher.run(&plan, &self.registry, context).await?;
        Ok(aggregated)
    }
}
