//! # Resilience
//!
//! Fault isolation for calls that leave the process. The liveness provider
//! wraps its distributed backend in a [`CircuitBreaker`] so a dead store
//! fails fast instead of stalling every heartbeat and load lookup.
//!
//! ```rust
//! use scanner_core::config::CircuitBreakerConfig;
//! use scanner_core::resilience::{CircuitBreaker, CircuitState};
//!
//! let breaker = CircuitBreaker::new("liveness_store", &CircuitBreakerConfig::default());
//! assert_eq!(breaker.state(), CircuitState::Closed);
//! assert_eq!(breaker.metrics().rejected_count, 0);
//! ```

pub mod circuit_breaker;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerError, CircuitBreakerMetrics, CircuitState};
