//! # Scan-Type Handler Registry
//!
//! Static mapping from scan type to the handler that executes it. Populated
//! explicitly at process start and read-only afterwards; no dynamic lookup.
//!
//! ```rust
//! use async_trait::async_trait;
//! use scanner_core::constants::ScanType;
//! use scanner_core::orchestration::types::{HandlerError, ScanTypeRequest};
//! use scanner_core::registry::{HandlerRegistry, ScanTypeHandler};
//!
//! struct PortScanFlow;
//!
//! #[async_trait]
//! impl ScanTypeHandler for PortScanFlow {
//!     async fn execute(&self, request: ScanTypeRequest) -> Result<serde_json::Value, HandlerError> {
//!         Ok(serde_json::json!({ "tools": request.tools.len() }))
//!     }
//! }
//!
//! let registry = HandlerRegistry::new().with_handler(ScanType::PortScan, PortScanFlow);
//! assert!(registry.contains(ScanType::PortScan));
//! ```

use crate::constants::ScanType;
use crate::orchestration::types::{HandlerError, ScanTypeRequest};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Executable entry point of one scan type
///
/// The orchestrator decides when and how concurrently handlers run; what a
/// handler does (deploying tools to workers, collecting output) is its own
/// business, including retries and timeouts.
#[async_trait]
pub trait ScanTypeHandler: Send + Sync {
    async fn execute(&self, request: ScanTypeRequest) -> Result<serde_json::Value, HandlerError>;
}

/// Scan type → handler mapping
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<ScanType, Arc<dyn ScanTypeHandler>>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("scan_types", &self.registered())
            .finish()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one for the scan type
    pub fn register(&mut self, scan_type: ScanType, handler: Arc<dyn ScanTypeHandler>) {
        if self.handlers.insert(scan_type, handler).is_some() {
            warn!(scan_type = %scan_type, "Replacing previously registered handler");
        } else {
            debug!(scan_type = %scan_type, "Handler registered");
        }
    }

    pub fn with_handler<H>(mut self, scan_type: ScanType, handler: H) -> Self
    where
        H: ScanTypeHandler + 'static,
    {
        self.register(scan_type, Arc::new(handler));
        self
    }

    pub fn get(&self, scan_type: ScanType) -> Option<Arc<dyn ScanTypeHandler>> {
        self.handlers.get(&scan_type).cloned()
    }

    pub fn contains(&self, scan_type: ScanType) -> bool {
        self.handlers.contains_key(&scan_type)
    }

    /// Registered scan types in stage-table order
    pub fn registered(&self) -> Vec<ScanType> {
        self.handlers.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
