#![allow(dead_code)]

pub mod handlers;
pub mod services;
pub mod strategies;

pub use handlers::*;
pub use services::*;
pub use strategies::*;

use scanner_core::RunContext;

pub fn test_context() -> RunContext {
    RunContext::new(42, 7, "example.com", "/tmp/scanner-core-tests/42")
}

/// Engine configuration from `config/engines/`
pub fn engine_fixture(name: &str) -> String {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("config")
        .join("engines")
        .join(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()))
}
