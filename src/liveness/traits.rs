//! Liveness store trait definition

use crate::error::StoreResult;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

/// Field name -> value of one stored hash
pub type FieldMap = HashMap<String, String>;

/// Key/value hash store with per-key expiry
///
/// Implemented by concrete backends (Redis, in-memory, NoOp). A key is live
/// until its expiry passes; every write replaces the fields and the expiry
/// in one atomic step, so readers never see new fields with an old expiry.
pub trait LivenessStore: Send + Sync {
    /// Overwrite the hash at `key` and reset its expiry to `ttl`
    fn set_fields_with_expiry(
        &self,
        key: &str,
        fields: &[(&str, String)],
        ttl: Duration,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Fields of a live key, `None` when absent or expired
    fn get_fields(&self, key: &str) -> impl Future<Output = StoreResult<Option<FieldMap>>> + Send;

    /// Batched [`get_fields`](Self::get_fields), one round trip; output is index-aligned with `keys`
    fn get_many(
        &self,
        keys: &[String],
    ) -> impl Future<Output = StoreResult<Vec<Option<FieldMap>>>> + Send;

    fn exists(&self, key: &str) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Remove a key; `true` when something was removed
    fn delete(&self, key: &str) -> impl Future<Output = StoreResult<bool>> + Send;

    fn health_check(&self) -> impl Future<Output = StoreResult<bool>> + Send;

    fn provider_name(&self) -> &'static str;

    /// Whether state is shared across processes (and calls cross the network)
    fn is_distributed(&self) -> bool;
}
