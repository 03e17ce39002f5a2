#![allow(clippy::doc_markdown)] // Allow technical terms like HGETALL, YAML in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Scanner Core Rust
//!
//! Orchestration core of a security-scanning platform: turns a scan engine
//! configuration into an ordered plan of scan stages, runs the plan against
//! registered scan-type handlers, tracks worker liveness and load, and runs
//! periodic maintenance jobs.
//!
//! ## Architecture
//!
//! ```text
//! engine YAML ──▶ ExecutionPlanBuilder ──▶ ExecutionPlan ──▶ StageDispatcher ──▶ AggregatedResult
//!                                                                 │
//!                                                        HandlerRegistry + ToolCatalog
//!
//! HeartbeatPublisher ──▶ WorkerLoadTracker ◀── WorkerSelectionService
//!                              │
//!                      LivenessProvider (Redis | memory | noop)
//!
//! PeriodicJobScheduler ──▶ due scans / statistics / cleanup broadcast
//! ```
//!
//! ## Module Organization
//!
//! - [`plan`] - Engine configuration parsing and execution plan building
//! - [`orchestration`] - Stage dispatcher and run orchestrator
//! - [`registry`] - Scan-type handler registry and tool catalog
//! - [`liveness`] - Worker heartbeats, load records and store backends
//! - [`services`] - Worker selection on top of liveness data
//! - [`scheduler`] - Periodic maintenance job scheduler
//! - [`resilience`] - Circuit breaker for the distributed store
//! - [`config`] - Service configuration loading and validation
//! - [`constants`] - Scan types, the stage table and fixed timings
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use scanner_core::constants::ScanType;
//! use scanner_core::orchestration::{HandlerError, RunContext, ScanOrchestrator, ScanTypeRequest};
//! use scanner_core::registry::{HandlerRegistry, ScanTypeHandler};
//!
//! struct PortScan;
//!
//! #[async_trait]
//! impl ScanTypeHandler for PortScan {
//!     async fn execute(&self, request: ScanTypeRequest) -> Result<serde_json::Value, HandlerError> {
//!         Ok(serde_json::json!({ "tools": request.tools.keys().collect::<Vec<_>>() }))
//!     }
//! }
//!
//! # async fn example() -> scanner_core::Result<()> {
//! let registry = HandlerRegistry::new().with_handler(ScanType::PortScan, PortScan);
//! let orchestrator = ScanOrchestrator::new(registry);
//!
//! let engine = "port_scan:\n  tools:\n    naabu_active:\n      enabled: true\n";
//! let context = RunContext::new(1, 1, "example.com", "/var/scans/1");
//! let result = orchestrator.execute(engine, &context).await?;
//! assert!(result.is_success());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod liveness;
pub mod logging;
pub mod orchestration;
pub mod plan;
pub mod registry;
pub mod resilience;
pub mod scheduler;
pub mod services;

pub use config::{ConfigManager, ScannerConfig};
pub use constants::{ScanType, StageMode, ToolGrouping, EXECUTION_STAGES};
pub use error::{
    ConfigError, DispatchError, OrchestratorError, Result, SchedulerError, SchedulerJobError,
    StoreError,
};
pub use liveness::{LivenessProvider, WorkerLoadRecord, WorkerLoadTracker};
pub use orchestration::{AggregatedResult, RunContext, ScanOrchestrator, StageDispatcher};
pub use plan::{ExecutionPlan, ExecutionPlanBuilder};
pub use registry::{HandlerRegistry, ScanTypeHandler, StaticToolCatalog, ToolCatalog};
pub use scheduler::{MaintenanceServices, PeriodicJobScheduler};
pub use services::WorkerSelectionService;
