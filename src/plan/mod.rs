//! # Execution Planning
//!
//! Turns user-editable scan engine configuration into an ordered execution
//! plan. The global stage table in [`crate::constants`] decides ordering and
//! concurrency; the configuration only decides which scan types and tools
//! take part.

pub mod builder;
pub mod engine_config;
pub mod types;

pub use builder::ExecutionPlanBuilder;
pub use engine_config::{ScanEngineConfig, ToolConfig, ToolSet};
pub use types::{ExecutionPlan, PlannedStage};
