//! # Circuit Breaker
//!
//! Classic three-state breaker guarding calls to the distributed liveness
//! store: Closed (normal operation), Open (failing fast) and Half-Open
//! (probing recovery).
//!
//! State lives behind a `parking_lot` mutex that is never held across an
//! await point, so the breaker can be consulted from sync and async code.
//! Time is read from the tokio clock so paused-time tests can drive the
//! open timeout.

use crate::config::CircuitBreakerConfig;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitState {
    /// All calls are allowed through
    Closed,
    /// All calls fail fast without executing
    Open,
    /// A limited number of probe calls test recovery
    HalfOpen,
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    #[error("Circuit breaker is open for {component}")]
    CircuitOpen { component: String },

    #[error("Operation failed: {0}")]
    OperationFailed(E),
}

/// Counters exposed for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CircuitBreakerMetrics {
    pub total_calls: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub rejected_count: u64,
    pub consecutive_failures: u32,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    opened_at: Option<Instant>,
    half_open_successes: u32,
    half_open_in_flight: u32,
    /// Bumped on every Open -> Half-Open transition
    half_open_generation: u64,
    metrics: CircuitBreakerMetrics,
}

/// Half-open admission; released on drop unless an outcome was recorded
struct HalfOpenSlot<'a> {
    breaker: &'a CircuitBreaker,
    generation: Option<u64>,
}

impl HalfOpenSlot<'_> {
    fn settle(mut self) {
        self.generation = None;
    }
}

impl Drop for HalfOpenSlot<'_> {
    fn drop(&mut self) {
        if let Some(generation) = self.generation.take() {
            self.breaker.release_slot(generation);
        }
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    success_threshold: u32,
    timeout: Duration,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: &CircuitBreakerConfig) -> Self {
        let name = name.into();
        info!(
            component = %name,
            failure_threshold = config.failure_threshold,
            timeout_seconds = config.timeout_seconds,
            success_threshold = config.success_threshold,
            "Circuit breaker initialized"
        );

        Self {
            name,
            failure_threshold: config.failure_threshold.max(1),
            success_threshold: config.success_threshold.max(1),
            timeout: config.timeout(),
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                opened_at: None,
                half_open_successes: 0,
                half_open_in_flight: 0,
                half_open_generation: 0,
                metrics: CircuitBreakerMetrics::default(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        self.inner.lock().metrics.clone()
    }

    /// Run an operation under breaker protection
    ///
    /// In Half-Open at most `success_threshold` calls are in flight. A call
    /// whose future is dropped before it completes frees its slot for the
    /// next caller.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some(slot) = self.admit() else {
            return Err(CircuitBreakerError::CircuitOpen {
                component: self.name.clone(),
            });
        };

        let outcome = operation().await;
        slot.settle();
        match outcome {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(CircuitBreakerError::OperationFailed(err))
            }
        }
    }

    /// Admit a call; moves Open to Half-Open once the timeout elapsed
    fn admit(&self) -> Option<HalfOpenSlot<'_>> {
        let mut inner = self.inner.lock();
        let admitted = match inner.state {
            CircuitState::Closed => Some(None),
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map_or(true, |opened| opened.elapsed() >= self.timeout);
                if elapsed {
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_successes = 0;
                    inner.half_open_in_flight = 1;
                    inner.half_open_generation += 1;
                    info!(
                        component = %self.name,
                        success_threshold = self.success_threshold,
                        "Circuit breaker half-open (testing recovery)"
                    );
                    Some(Some(inner.half_open_generation))
                } else {
                    None
                }
            }
            CircuitState::HalfOpen => {
                let pending = inner.half_open_in_flight + inner.half_open_successes;
                if pending < self.success_threshold {
                    inner.half_open_in_flight += 1;
                    Some(Some(inner.half_open_generation))
                } else {
                    None
                }
            }
        };

        if admitted.is_none() {
            inner.metrics.rejected_count += 1;
        }
        admitted.map(|generation| HalfOpenSlot {
            breaker: self,
            generation,
        })
    }

    /// Give back the slot of a half-open call that ended without an outcome
    fn release_slot(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen && inner.half_open_generation == generation {
            inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
            debug!(
                component = %self.name,
                in_flight = inner.half_open_in_flight,
                "Half-open call abandoned, slot released"
            );
        }
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.metrics.total_calls += 1;
        inner.metrics.success_count += 1;
        inner.metrics.consecutive_failures = 0;

        if inner.state == CircuitState::HalfOpen {
            inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
            inner.half_open_successes += 1;
            if inner.half_open_successes >= self.success_threshold {
                inner.state = CircuitState::Closed;
                inner.opened_at = None;
                inner.half_open_successes = 0;
                inner.half_open_in_flight = 0;
                info!(
                    component = %self.name,
                    total_calls = inner.metrics.total_calls,
                    "Circuit breaker closed (recovered)"
                );
            }
        }
    }

    fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.metrics.total_calls += 1;
        inner.metrics.failure_count += 1;
        inner.metrics.consecutive_failures += 1;

        let should_open = match inner.state {
            CircuitState::Closed => inner.metrics.consecutive_failures >= self.failure_threshold,
            // any failure while probing reopens immediately
            CircuitState::HalfOpen => true,
            CircuitState::Open => false,
        };

        if should_open {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
            inner.half_open_successes = 0;
            inner.half_open_in_flight = 0;
            warn!(
                component = %self.name,
                consecutive_failures = inner.metrics.consecutive_failures,
                failure_threshold = self.failure_threshold,
                timeout_seconds = self.timeout.as_secs(),
                "Circuit breaker opened (failing fast)"
            );
        } else {
            debug!(
                component = %self.name,
                consecutive_failures = inner.metrics.consecutive_failures,
                "Circuit breaker recorded failure"
            );
        }
    }
}
