//! Redis liveness store
//!
//! Uses `redis::aio::ConnectionManager` for async multiplexed connections
//! with automatic reconnection. Connect attempts, retries and every command
//! are bounded by the timeouts in [`LivenessConfig`]. Writes go through a `MULTI`/`EXEC` pipeline
//! so `HSET` and `EXPIRE` apply as one step; batched reads pipeline one
//! `HGETALL` per key into a single round trip.

use crate::config::LivenessConfig;
use crate::error::{StoreError, StoreResult};
use crate::liveness::traits::{FieldMap, LivenessStore};
use std::time::Duration;
use tracing::debug;

/// Upper bound on the backoff between two reconnect attempts, in milliseconds
const MAX_RECONNECT_DELAY_MS: u64 = 500;

#[derive(Clone)]
pub struct RedisLivenessStore {
    connection_manager: redis::aio::ConnectionManager,
}

impl std::fmt::Debug for RedisLivenessStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisLivenessStore")
            .field("connection_manager", &"ConnectionManager")
            .finish()
    }
}

impl RedisLivenessStore {
    pub async fn connect(url: &str, config: &LivenessConfig) -> StoreResult<Self> {
        let client = redis::Client::open(url).map_err(|e| {
            StoreError::Connection(format!("Failed to create Redis client: {}", e))
        })?;

        let manager_config = redis::aio::ConnectionManagerConfig::new()
            .set_number_of_retries(config.connect_retries)
            .set_max_delay(MAX_RECONNECT_DELAY_MS)
            .set_connection_timeout(config.connect_timeout())
            .set_response_timeout(config.response_timeout());

        // hard ceiling in case the retry loop itself overruns the per-attempt timeouts
        let budget = connect_budget(config);
        let connection_manager = tokio::time::timeout(
            budget,
            redis::aio::ConnectionManager::new_with_config(client, manager_config),
        )
        .await
        .map_err(|_| {
            StoreError::Connection(format!(
                "Timed out connecting to Redis after {}ms",
                budget.as_millis()
            ))
        })?
        .map_err(|e| StoreError::Connection(format!("Failed to connect to Redis: {}", e)))?;

        debug!(
            url = %redact_url(url),
            connect_timeout_ms = config.connect_timeout_ms,
            response_timeout_ms = config.response_timeout_ms,
            "Redis liveness store connected"
        );

        Ok(Self { connection_manager })
    }
}

impl LivenessStore for RedisLivenessStore {
    async fn set_fields_with_expiry(
        &self,
        key: &str,
        fields: &[(&str, String)],
        ttl: Duration,
    ) -> StoreResult<()> {
        let mut conn = self.connection_manager.clone();
        let ttl_seconds = ttl.as_secs().max(1) as i64;

        redis::pipe()
            .atomic()
            .del(key)
            .ignore()
            .hset_multiple(key, fields)
            .ignore()
            .expire(key, ttl_seconds)
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;

        debug!(key = key, ttl_seconds = ttl_seconds, "Liveness record written");
        Ok(())
    }

    async fn get_fields(&self, key: &str) -> StoreResult<Option<FieldMap>> {
        let mut conn = self.connection_manager.clone();
        let fields: FieldMap = redis::cmd("HGETALL")
            .arg(key)
            .query_async(&mut conn)
            .await?;

        // HGETALL on a missing key yields an empty hash
        Ok((!fields.is_empty()).then_some(fields))
    }

    async fn get_many(&self, keys: &[String]) -> StoreResult<Vec<Option<FieldMap>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.connection_manager.clone();
        let mut pipe = redis::pipe();
        for key in keys {
            pipe.hgetall(key);
        }

        let hashes: Vec<FieldMap> = pipe.query_async(&mut conn).await?;
        if hashes.len() != keys.len() {
            return Err(StoreError::Backend(format!(
                "HGETALL pipeline returned {} replies for {} keys",
                hashes.len(),
                keys.len()
            )));
        }

        Ok(hashes
            .into_iter()
            .map(|fields| (!fields.is_empty()).then_some(fields))
            .collect())
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.connection_manager.clone();
        let exists: bool = redis::cmd("EXISTS").arg(key).query_async(&mut conn).await?;
        Ok(exists)
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.connection_manager.clone();
        let removed: u64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(removed > 0)
    }

    async fn health_check(&self) -> StoreResult<bool> {
        let mut conn = self.connection_manager.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong == "PONG")
    }

    fn provider_name(&self) -> &'static str {
        "redis"
    }

    fn is_distributed(&self) -> bool {
        true
    }
}

/// Time allowed for the first connect plus every retry and its backoff
pub(crate) fn connect_budget(config: &LivenessConfig) -> Duration {
    let attempts = config.connect_retries as u32 + 1;
    let per_attempt = config.connect_timeout() + Duration::from_millis(MAX_RECONNECT_DELAY_MS);
    per_attempt * attempts
}

/// Redact credentials from a Redis URL for logging
pub(crate) fn redact_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if colon_pos > url.find("://").map_or(0, |p| p + 2) {
                return format!("{}***{}", &url[..=colon_pos], &url[at_pos..]);
            }
        }
    }
    url.to_string()
}
