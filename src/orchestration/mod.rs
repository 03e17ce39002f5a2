//! # Orchestration
//!
//! Runs an execution plan against the registered scan-type handlers.
//!
//! ```text
//! ScanOrchestrator
//! ├── ExecutionPlanBuilder   (raw config -> ExecutionPlan)
//! └── StageDispatcher        (ExecutionPlan -> AggregatedResult)
//!     ├── HandlerRegistry
//!     └── ToolCatalog
//! ```

pub mod scan_orchestrator;
pub mod stage_dispatcher;
pub mod types;

pub use scan_orchestrator::ScanOrchestrator;
pub use stage_dispatcher::StageDispatcher;
pub use types::{
    AggregatedResult, HandlerError, RunContext, ScanTypeOutcome, ScanTypeRequest, ScanTypeResult,
};
