//! # Stage Dispatcher
//!
//! Executes an [`ExecutionPlan`] stage by stage against a [`HandlerRegistry`].
//!
//! ## Execution Rules
//!
//! - Stages run strictly in plan order; stage N+1 never starts before every
//!   scan type of stage N has finished.
//! - Sequential stages invoke their scan types one at a time and stop at the
//!   first failure.
//! - Parallel stages start every member concurrently and wait for all of
//!   them; a failing member does not cancel its siblings.
//! - Any failure aborts the remaining stages. The caller gets the failures
//!   together with everything that ran before the abort.
//!
//! Every planned scan type must have a registered handler. This is checked
//! before the first stage starts so a misconfigured registry never leaves a
//! half-executed run behind.

use crate::constants::{ScanType, StageMode};
use crate::error::{DispatchError, ScanTypeFailure};
use crate::orchestration::types::{
    AggregatedResult, RunContext, ScanTypeOutcome, ScanTypeRequest, ScanTypeResult,
};
use crate::plan::{ExecutionPlan, PlannedStage};
use crate::registry::{partition_tools, HandlerRegistry, ScanTypeHandler, StaticToolCatalog, ToolCatalog};
use futures::future::join_all;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Runs execution plans stage by stage
#[derive(Clone)]
pub struct StageDispatcher {
    catalog: Arc<dyn ToolCatalog>,
}

impl std::fmt::Debug for StageDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageDispatcher").finish_non_exhaustive()
    }
}

impl Default for StageDispatcher {
    fn default() -> Self {
        Self::new(Arc::new(StaticToolCatalog::builtin()))
    }
}

impl StageDispatcher {
    pub fn new(catalog: Arc<dyn ToolCatalog>) -> Self {
        Self { catalog }
    }

    /// Execute every stage of the plan in order
    pub async fn run(
        &self,
        plan: &ExecutionPlan,
        registry: &HandlerRegistry,
        context: &RunContext,
    ) -> Result<AggregatedResult, DispatchError> {
        self.ensure_handlers(plan, registry)?;

        let mut aggregated = AggregatedResult::new(context.run_id);

        info!(
            run_id = %context.run_id,
            scan_id = context.scan_id,
            target = %context.target_name,
            stages = plan.stages().len(),
            "Dispatching execution plan"
        );

        for stage in plan.stages() {
            let stage_started = Instant::now();
            info!(
                run_id = %context.run_id,
                stage_index = stage.index,
                stage = stage.name,
                mode = %stage.mode,
                scan_types = ?stage.scan_types,
                "Stage started"
            );

            let results = match stage.mode {
                StageMode::Sequential => {
                    self.run_sequential(stage, plan, registry, context).await
                }
                StageMode::Parallel => self.run_parallel(stage, plan, registry, context).await,
            };

            let failures: Vec<ScanTypeFailure> = results
                .iter()
                .filter_map(|result| match &result.outcome {
                    ScanTypeOutcome::Failed { tool, error } => Some(ScanTypeFailure {
                        scan_type: result.scan_type,
                        tool: tool.clone(),
                        error: error.clone(),
                    }),
                    ScanTypeOutcome::Succeeded { .. } => None,
                })
                .collect();

            aggregated.results.extend(results);

            if !failures.is_empty() {
                aggregated.finish();
                error!(
                    run_id = %context.run_id,
                    stage_index = stage.index,
                    stage = stage.name,
                    failed = failures.len(),
                    "Stage failed, aborting remaining stages"
                );
                return Err(DispatchError::StageFailed {
                    stage_index: stage.index,
                    stage_name: stage.name,
                    mode: stage.mode,
                    failures,
                    partial: Box::new(aggregated),
                });
            }

            aggregated.stages_completed += 1;
            info!(
                run_id = %context.run_id,
                stage_index = stage.index,
                stage = stage.name,
                elapsed_ms = stage_started.elapsed().as_millis() as u64,
                "Stage completed"
            );
        }

        aggregated.finish();
        info!(
            run_id = %context.run_id,
            scan_types = aggregated.results.len(),
            stages = aggregated.stages_completed,
            "Execution plan completed"
        );
        Ok(aggregated)
    }

    fn ensure_handlers(
        &self,
        plan: &ExecutionPlan,
        registry: &HandlerRegistry,
    ) -> Result<(), DispatchError> {
        for stage in plan.stages() {
            if let Some(scan_type) = stage
                .scan_types
                .iter()
                .copied()
                .find(|scan_type| !registry.contains(*scan_type))
            {
                warn!(
                    scan_type = %scan_type,
                    stage_index = stage.index,
                    registered = ?registry.registered(),
                    "Planned scan type has no registered handler"
                );
                return Err(DispatchError::MissingHandler {
                    scan_type,
                    stage_index: stage.index,
                });
            }
        }
        Ok(())
    }

    async fn run_sequential(
        &self,
        stage: &PlannedStage,
        plan: &ExecutionPlan,
        registry: &HandlerRegistry,
        context: &RunContext,
    ) -> Vec<ScanTypeResult> {
        let mut results = Vec::with_capacity(stage.scan_types.len());

        for &scan_type in &stage.scan_types {
            let Some(handler) = registry.get(scan_type) else {
                // ensure_handlers ran against the same registry
                continue;
            };
            let result = self
                .invoke(handler, self.request(stage, scan_type, plan, context), stage)
                .await;
            let failed = !result.outcome.is_success();
            results.push(result);
            if failed {
                break;
            }
        }

        results
    }

    async fn run_parallel(
        &self,
        stage: &PlannedStage,
        plan: &ExecutionPlan,
        registry: &HandlerRegistry,
        context: &RunContext,
    ) -> Vec<ScanTypeResult> {
        let invocations = stage.scan_types.iter().filter_map(|&scan_type| {
            registry.get(scan_type).map(|handler| {
                self.invoke(handler, self.request(stage, scan_type, plan, context), stage)
            })
        });

        join_all(invocations).await
    }

    fn request(
        &self,
        stage: &PlannedStage,
        scan_type: ScanType,
        plan: &ExecutionPlan,
        context: &RunContext,
    ) -> ScanTypeRequest {
        let tools = plan.tools_for(scan_type).cloned().unwrap_or_default();
        let tool_groups = partition_tools(
            self.catalog.as_ref(),
            scan_type,
            tools.keys().map(String::as_str),
        );

        ScanTypeRequest {
            run: context.clone(),
            scan_type,
            stage_index: stage.index,
            tools,
            tool_groups,
        }
    }

    async fn invoke(
        &self,
        handler: Arc<dyn ScanTypeHandler>,
        request: ScanTypeRequest,
        stage: &PlannedStage,
    ) -> ScanTypeResult {
        let scan_type = request.scan_type;
        let run_id = request.run.run_id;
        let started = Instant::now();

        debug!(
            run_id = %run_id,
            scan_type = %scan_type,
            stage_index = stage.index,
            tools = request.tools.len(),
            "Invoking scan type handler"
        );

        let outcome = match AssertUnwindSafe(handler.execute(request)).catch_unwind().await {
            Ok(Ok(output)) => ScanTypeOutcome::Succeeded { output },
            Ok(Err(err)) => ScanTypeOutcome::Failed {
                tool: err.tool,
                error: err.message,
            },
            Err(panic) => ScanTypeOutcome::Failed {
                tool: None,
                error: format!("handler panicked: {}", panic_message(panic.as_ref())),
            },
        };
        let duration = started.elapsed();

        match &outcome {
            ScanTypeOutcome::Succeeded { .. } => info!(
                run_id = %run_id,
                scan_type = %scan_type,
                stage_index = stage.index,
                duration_ms = duration.as_millis() as u64,
                "Scan type completed"
            ),
            ScanTypeOutcome::Failed { tool, error } => error!(
                run_id = %run_id,
                scan_type = %scan_type,
                stage_index = stage.index,
                tool = ?tool,
                error = %error,
                "Scan type failed"
            ),
        }

        ScanTypeResult {
            scan_type,
            stage_index: stage.index,
            mode: stage.mode,
            duration,
            outcome,
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
