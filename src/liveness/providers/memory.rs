//! In-process liveness store
//!
//! `DashMap` of hashes with an absolute deadline per key, read against the
//! tokio clock. Suitable for single-process deployments and tests; state is
//! not shared between processes.
//!
//! Expired entries are dropped when read and swept every
//! [`PURGE_EVERY_WRITES`] writes, so keys that are never read again do not
//! accumulate.

use crate::error::StoreResult;
use crate::liveness::traits::{FieldMap, LivenessStore};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
struct Entry {
    fields: FieldMap,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Writes between two sweeps of expired entries
pub const PURGE_EVERY_WRITES: u64 = 64;

#[derive(Debug, Clone, Default)]
pub struct InMemoryLivenessStore {
    entries: Arc<DashMap<String, Entry>>,
    writes: Arc<AtomicU64>,
}

impl InMemoryLivenessStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            debug!(purged = purged, "Purged expired liveness records");
        }
        purged
    }

    /// Number of stored entries, expired ones included until purged
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn live_fields(&self, key: &str, now: Instant) -> Option<FieldMap> {
        let live = self
            .entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.fields.clone());

        if live.is_none() {
            // expired entries are removed lazily on read
            self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        }
        live
    }
}

impl LivenessStore for InMemoryLivenessStore {
    async fn set_fields_with_expiry(
        &self,
        key: &str,
        fields: &[(&str, String)],
        ttl: Duration,
    ) -> StoreResult<()> {
        let entry = Entry {
            fields: fields
                .iter()
                .map(|(name, value)| ((*name).to_string(), value.clone()))
                .collect(),
            expires_at: Instant::now() + ttl,
        };
        self.entries.insert(key.to_string(), entry);

        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % PURGE_EVERY_WRITES == 0 {
            self.purge_expired();
        }
        Ok(())
    }

    async fn get_fields(&self, key: &str) -> StoreResult<Option<FieldMap>> {
        Ok(self.live_fields(key, Instant::now()))
    }

    async fn get_many(&self, keys: &[String]) -> StoreResult<Vec<Option<FieldMap>>> {
        let now = Instant::now();
        Ok(keys.iter().map(|key| self.live_fields(key, now)).collect())
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.live_fields(key, Instant::now()).is_some())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let now = Instant::now();
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|(_, entry)| entry.is_live(now)))
    }

    async fn health_check(&self) -> StoreResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }

    fn is_distributed(&self) -> bool {
        false
    }
}
