//! # Registry Infrastructure
//!
//! Static lookup tables the dispatcher consults at run time.
//!
//! ```text
//! Registry Infrastructure
//! ├── HandlerRegistry     (scan type -> executable handler)
//! └── ToolCatalog         ((scan type, tool) -> input type)
//! ```

pub mod handler_registry;
pub mod tool_catalog;

pub use handler_registry::{HandlerRegistry, ScanTypeHandler};
pub use tool_catalog::{partition_tools, StaticToolCatalog, ToolCatalog, ToolInputType};
