//! # Worker Load Tracker
//!
//! Derived liveness for scan workers. Each worker periodically overwrites
//! `worker:load:{id}` with its CPU and memory usage and resets the key's
//! expiry. A worker is online exactly when that key exists; there is no
//! stored online flag, so a crashed worker goes offline on its own once the
//! expiry window passes.
//!
//! Every operation is best-effort: store failures are logged and reported
//! as `false` or "no data", never returned to the caller.

use super::provider::LivenessProvider;
use super::traits::FieldMap;
use crate::constants::liveness::{
    FIELD_CPU, FIELD_MEMORY, FIELD_UPDATED, LOAD_RECORD_TTL, WORKER_LOAD_KEY_PREFIX,
};
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

pub type WorkerId = i64;

/// Last published load of one worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerLoadRecord {
    /// Taken from the record key, not stored as a field
    pub worker_id: WorkerId,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub updated_at: DateTime<Utc>,
}

impl WorkerLoadRecord {
    fn to_fields(&self) -> [(&'static str, String); 3] {
        [
            (FIELD_CPU, self.cpu_percent.to_string()),
            (FIELD_MEMORY, self.memory_percent.to_string()),
            (FIELD_UPDATED, self.updated_at.to_rfc3339()),
        ]
    }

    fn from_fields(worker_id: WorkerId, key: &str, fields: &FieldMap) -> Result<Self, StoreError> {
        let malformed = |reason: String| StoreError::MalformedRecord {
            key: key.to_string(),
            reason,
        };
        let field = |name: &str| {
            fields
                .get(name)
                .ok_or_else(|| malformed(format!("missing field '{}'", name)))
        };
        let percent = |name: &str| -> Result<f64, StoreError> {
            let raw = field(name)?;
            raw.parse::<f64>()
                .map_err(|e| malformed(format!("field '{}' = '{}': {}", name, raw, e)))
        };

        let updated = field(FIELD_UPDATED)?;
        let updated_at = DateTime::parse_from_rfc3339(updated)
            .map_err(|e| malformed(format!("field '{}' = '{}': {}", FIELD_UPDATED, updated, e)))?
            .with_timezone(&Utc);

        Ok(Self {
            worker_id,
            cpu_percent: percent(FIELD_CPU)?,
            memory_percent: percent(FIELD_MEMORY)?,
            updated_at,
        })
    }
}

/// Storage key of a worker's load record
pub fn worker_load_key(worker_id: WorkerId) -> String {
    format!("{}{}", WORKER_LOAD_KEY_PREFIX, worker_id)
}

#[derive(Debug, Clone)]
pub struct WorkerLoadTracker {
    provider: LivenessProvider,
    ttl: Duration,
}

impl WorkerLoadTracker {
    pub fn new(provider: LivenessProvider) -> Self {
        Self::with_ttl(provider, LOAD_RECORD_TTL)
    }

    pub fn with_ttl(provider: LivenessProvider, ttl: Duration) -> Self {
        Self { provider, ttl }
    }

    pub fn provider(&self) -> &LivenessProvider {
        &self.provider
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Overwrite the worker's record and reset its expiry
    pub async fn publish_heartbeat(
        &self,
        worker_id: WorkerId,
        cpu_percent: f64,
        memory_percent: f64,
    ) -> bool {
        let record = WorkerLoadRecord {
            worker_id,
            cpu_percent,
            memory_percent,
            updated_at: Utc::now(),
        };
        let key = worker_load_key(worker_id);

        match self
            .provider
            .set_fields_with_expiry(&key, &record.to_fields(), self.ttl)
            .await
        {
            Ok(stored) => {
                debug!(
                    worker_id = worker_id,
                    cpu = cpu_percent,
                    mem = memory_percent,
                    stored = stored,
                    "Heartbeat published"
                );
                stored
            }
            Err(e) => {
                warn!(worker_id = worker_id, error = %e, "Failed to publish heartbeat");
                false
            }
        }
    }

    pub async fn get_load(&self, worker_id: WorkerId) -> Option<WorkerLoadRecord> {
        let key = worker_load_key(worker_id);
        match self.provider.get_fields(&key).await {
            Ok(Some(fields)) => parse_record(worker_id, &key, &fields),
            Ok(None) => None,
            Err(e) => {
                warn!(worker_id = worker_id, error = %e, "Failed to read worker load");
                None
            }
        }
    }

    /// Loads of every listed worker that has a live record, in one round trip
    pub async fn get_all_loads(&self, worker_ids: &[WorkerId]) -> HashMap<WorkerId, WorkerLoadRecord> {
        self.get_live_records(worker_ids)
            .await
            .into_iter()
            .filter_map(|(worker_id, record)| Some((worker_id, record?)))
            .collect()
    }

    /// Every listed worker with a non-expired record, in one round trip
    ///
    /// A live record that fails to parse still marks its worker online and
    /// maps to `None`, matching [`Self::is_online`].
    pub async fn get_live_records(
        &self,
        worker_ids: &[WorkerId],
    ) -> HashMap<WorkerId, Option<WorkerLoadRecord>> {
        if worker_ids.is_empty() {
            return HashMap::new();
        }

        let keys: Vec<String> = worker_ids.iter().copied().map(worker_load_key).collect();
        let hashes = match self.provider.get_many(&keys).await {
            Ok(hashes) => hashes,
            Err(e) => {
                warn!(workers = worker_ids.len(), error = %e, "Failed to read worker loads");
                return HashMap::new();
            }
        };

        worker_ids
            .iter()
            .zip(keys.iter())
            .zip(hashes)
            .filter_map(|((&worker_id, key), fields)| {
                let fields = fields?;
                Some((worker_id, parse_record(worker_id, key, &fields)))
            })
            .collect()
    }

    /// True iff a non-expired record exists
    pub async fn is_online(&self, worker_id: WorkerId) -> bool {
        match self.provider.exists(&worker_load_key(worker_id)).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(worker_id = worker_id, error = %e, "Failed to check worker liveness");
                false
            }
        }
    }

    pub async fn delete(&self, worker_id: WorkerId) -> bool {
        match self.provider.delete(&worker_load_key(worker_id)).await {
            Ok(removed) => {
                debug!(worker_id = worker_id, removed = removed, "Worker load record deleted");
                removed
            }
            Err(e) => {
                warn!(worker_id = worker_id, error = %e, "Failed to delete worker load record");
                false
            }
        }
    }
}

fn parse_record(worker_id: WorkerId, key: &str, fields: &FieldMap) -> Option<WorkerLoadRecord> {
    match WorkerLoadRecord::from_fields(worker_id, key, fields) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(worker_id = worker_id, error = %e, "Ignoring malformed worker load record");
            None
        }
    }
}
