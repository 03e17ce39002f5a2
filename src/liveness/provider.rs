//! Liveness provider with integrated circuit breaker
//!
//! Uses enum dispatch over the concrete backends. Circuit breaker protection
//! is an internal detail: consumers use [`LivenessProvider`] and get
//! fail-fast behavior when the distributed store is unavailable.

use super::providers::{InMemoryLivenessStore, NoOpLivenessStore, RedisLivenessStore};
use super::traits::{FieldMap, LivenessStore};
use crate::config::{CircuitBreakerConfig, LivenessBackendKind, LivenessConfig};
use crate::error::StoreResult;
use crate::resilience::{CircuitBreaker, CircuitBreakerError, CircuitState};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
enum LivenessBackend {
    Redis(Box<RedisLivenessStore>),
    Memory(InMemoryLivenessStore),
    NoOp(NoOpLivenessStore),
}

impl LivenessBackend {
    fn provider_name(&self) -> &'static str {
        match self {
            Self::Redis(s) => s.provider_name(),
            Self::Memory(s) => s.provider_name(),
            Self::NoOp(s) => s.provider_name(),
        }
    }

    fn is_distributed(&self) -> bool {
        match self {
            Self::Redis(s) => s.is_distributed(),
            Self::Memory(s) => s.is_distributed(),
            Self::NoOp(s) => s.is_distributed(),
        }
    }

    fn is_enabled(&self) -> bool {
        !matches!(self, Self::NoOp(_))
    }

    async fn set_fields_with_expiry(
        &self,
        key: &str,
        fields: &[(&str, String)],
        ttl: Duration,
    ) -> StoreResult<()> {
        match self {
            Self::Redis(s) => s.set_fields_with_expiry(key, fields, ttl).await,
            Self::Memory(s) => s.set_fields_with_expiry(key, fields, ttl).await,
            Self::NoOp(s) => s.set_fields_with_expiry(key, fields, ttl).await,
        }
    }

    async fn get_fields(&self, key: &str) -> StoreResult<Option<FieldMap>> {
        match self {
            Self::Redis(s) => s.get_fields(key).await,
            Self::Memory(s) => s.get_fields(key).await,
            Self::NoOp(s) => s.get_fields(key).await,
        }
    }

    async fn get_many(&self, keys: &[String]) -> StoreResult<Vec<Option<FieldMap>>> {
        match self {
            Self::Redis(s) => s.get_many(keys).await,
            Self::Memory(s) => s.get_many(keys).await,
            Self::NoOp(s) => s.get_many(keys).await,
        }
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        match self {
            Self::Redis(s) => s.exists(key).await,
            Self::Memory(s) => s.exists(key).await,
            Self::NoOp(s) => s.exists(key).await,
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        match self {
            Self::Redis(s) => s.delete(key).await,
            Self::Memory(s) => s.delete(key).await,
            Self::NoOp(s) => s.delete(key).await,
        }
    }

    async fn health_check(&self) -> StoreResult<bool> {
        match self {
            Self::Redis(s) => s.health_check().await,
            Self::Memory(s) => s.health_check().await,
            Self::NoOp(s) => s.health_check().await,
        }
    }
}

/// Liveness store handle with circuit breaker protection
///
/// ## Backends
///
/// - **Redis/Dragonfly**: shared store for multi-process deployments
/// - **Memory**: in-process store for single-process deployments and tests
/// - **NoOp**: liveness disabled, every worker reads as offline
///
/// ## Circuit Breaker
///
/// For the distributed backend a circuit breaker prevents repeated timeout
/// penalties while the store is down. When open, reads return "no data"
/// and writes return `Ok(false)` without touching the network.
#[derive(Clone)]
pub struct LivenessProvider {
    backend: LivenessBackend,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
}

impl std::fmt::Debug for LivenessProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LivenessProvider")
            .field("backend", &self.backend.provider_name())
            .field(
                "circuit_breaker",
                &self.circuit_breaker.as_ref().map(|cb| cb.state()),
            )
            .finish()
    }
}

impl LivenessProvider {
    /// Build a provider from configuration with graceful degradation
    ///
    /// If Redis is configured but cannot be reached, logs a warning and
    /// falls back to NoOp. The process never fails to start because of the
    /// liveness store.
    pub async fn from_config_graceful(
        config: &LivenessConfig,
        cb_config: Option<&CircuitBreakerConfig>,
    ) -> Self {
        let backend = Self::create_backend(config).await;

        let circuit_breaker = if backend.is_distributed() && backend.is_enabled() {
            cb_config.filter(|cb| cb.enabled).map(|cb| {
                let breaker = CircuitBreaker::new("liveness_store", cb);
                info!(
                    failure_threshold = cb.failure_threshold,
                    timeout_seconds = cb.timeout_seconds,
                    "Liveness store circuit breaker initialized"
                );
                Arc::new(breaker)
            })
        } else {
            None
        };

        Self {
            backend,
            circuit_breaker,
        }
    }

    async fn create_backend(config: &LivenessConfig) -> LivenessBackend {
        match config.backend {
            LivenessBackendKind::Redis => {
                let Some(url) = config.redis_url.as_deref().filter(|url| !url.is_empty()) else {
                    warn!("Redis liveness backend selected without redis_url, falling back to NoOp");
                    return LivenessBackend::NoOp(NoOpLivenessStore::new());
                };

                match RedisLivenessStore::connect(url, config).await {
                    Ok(store) => {
                        info!(backend = "redis", "Liveness store initialized successfully");
                        LivenessBackend::Redis(Box::new(store))
                    }
                    Err(e) => {
                        warn!(
                            error = %e,
                            "Failed to connect to Redis, falling back to NoOp liveness store (graceful degradation)"
                        );
                        LivenessBackend::NoOp(NoOpLivenessStore::new())
                    }
                }
            }
            LivenessBackendKind::Memory => {
                info!(backend = "memory", "In-process liveness store initialized");
                LivenessBackend::Memory(InMemoryLivenessStore::new())
            }
            LivenessBackendKind::None => {
                info!("Liveness tracking disabled by configuration");
                LivenessBackend::NoOp(NoOpLivenessStore::new())
            }
        }
    }

    /// Distributed backend from an existing connection
    pub fn redis(store: RedisLivenessStore, cb_config: Option<&CircuitBreakerConfig>) -> Self {
        Self {
            backend: LivenessBackend::Redis(Box::new(store)),
            circuit_breaker: cb_config
                .filter(|cb| cb.enabled)
                .map(|cb| Arc::new(CircuitBreaker::new("liveness_store", cb))),
        }
    }

    pub fn memory(store: InMemoryLivenessStore) -> Self {
        Self {
            backend: LivenessBackend::Memory(store),
            circuit_breaker: None,
        }
    }

    pub fn noop() -> Self {
        Self {
            backend: LivenessBackend::NoOp(NoOpLivenessStore::new()),
            circuit_breaker: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_enabled()
    }

    pub fn is_distributed(&self) -> bool {
        self.backend.is_distributed()
    }

    pub fn provider_name(&self) -> &'static str {
        self.backend.provider_name()
    }

    /// `None` when no circuit breaker is configured
    pub fn circuit_state(&self) -> Option<CircuitState> {
        self.circuit_breaker.as_ref().map(|cb| cb.state())
    }

    async fn guarded<T, F, Fut>(&self, operation: &'static str, open_value: T, call: F) -> StoreResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let Some(cb) = self.circuit_breaker.as_ref() else {
            return call().await;
        };

        match cb.call(call).await {
            Ok(value) => Ok(value),
            Err(CircuitBreakerError::CircuitOpen { component }) => {
                debug!(
                    operation = operation,
                    component = %component,
                    "Liveness circuit open, skipping store call"
                );
                Ok(open_value)
            }
            Err(CircuitBreakerError::OperationFailed(e)) => Err(e),
        }
    }

    /// Overwrite fields and reset expiry; `Ok(false)` when nothing was stored
    pub async fn set_fields_with_expiry(
        &self,
        key: &str,
        fields: &[(&str, String)],
        ttl: Duration,
    ) -> StoreResult<bool> {
        if !self.backend.is_enabled() {
            return Ok(false);
        }
        self.guarded("set_fields_with_expiry", false, || async {
            self.backend
                .set_fields_with_expiry(key, fields, ttl)
                .await
                .map(|()| true)
        })
        .await
    }

    pub async fn get_fields(&self, key: &str) -> StoreResult<Option<FieldMap>> {
        self.guarded("get_fields", None, || self.backend.get_fields(key))
            .await
    }

    pub async fn get_many(&self, keys: &[String]) -> StoreResult<Vec<Option<FieldMap>>> {
        self.guarded("get_many", vec![None; keys.len()], || {
            self.backend.get_many(keys)
        })
        .await
    }

    pub async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.guarded("exists", false, || self.backend.exists(key))
            .await
    }

    pub async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.guarded("delete", false, || self.backend.delete(key))
            .await
    }

    /// `Ok(false)` while the circuit is open
    pub async fn health_check(&self) -> StoreResult<bool> {
        self.guarded("health_check", false, || self.backend.health_check())
            .await
    }
}
