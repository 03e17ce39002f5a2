//! No-op liveness store
//!
//! Never holds anything. Used when liveness tracking is disabled or when the
//! distributed store is unreachable at startup (graceful degradation): every
//! worker reads as offline.

use crate::error::StoreResult;
use crate::liveness::traits::{FieldMap, LivenessStore};
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct NoOpLivenessStore;

impl NoOpLivenessStore {
    pub fn new() -> Self {
        Self
    }
}

impl LivenessStore for NoOpLivenessStore {
    async fn set_fields_with_expiry(
        &self,
        _key: &str,
        _fields: &[(&str, String)],
        _ttl: Duration,
    ) -> StoreResult<()> {
        Ok(())
    }

    async fn get_fields(&self, _key: &str) -> StoreResult<Option<FieldMap>> {
        Ok(None)
    }

    async fn get_many(&self, keys: &[String]) -> StoreResult<Vec<Option<FieldMap>>> {
        Ok(vec![None; keys.len()])
    }

    async fn exists(&self, _key: &str) -> StoreResult<bool> {
        Ok(false)
    }

    async fn delete(&self, _key: &str) -> StoreResult<bool> {
        Ok(false)
    }

    async fn health_check(&self) -> StoreResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "noop"
    }

    fn is_distributed(&self) -> bool {
        false
    }
}
