use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::WorkerSelectionConfig;
use crate::liveness::{WorkerId, WorkerLoadRecord, WorkerLoadTracker};

/// Liveness-aware worker selection
///
/// Reads every candidate's load record in one batched lookup and picks the
/// least loaded online worker that is below the configured thresholds.
/// Liveness comes only from the load records: a worker without a live record
/// is offline.
#[derive(Debug, Clone)]
pub struct WorkerSelectionService {
    tracker: WorkerLoadTracker,
    config: WorkerSelectionConfig,
}

/// Selected worker with the load that won it the slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedWorker {
    pub worker_id: WorkerId,
    pub load: WorkerLoadRecord,
}

/// Status of one worker for list rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerSummary {
    pub worker_id: WorkerId,
    pub is_online: bool,
    pub load: Option<WorkerLoadRecord>,
}

/// Outcome counts of the last selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSelectionStatistics {
    pub candidates: usize,
    pub online: usize,
    pub overloaded: usize,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum WorkerSelectionError {
    #[error("No candidate workers supplied")]
    NoCandidates,

    #[error("No online workers among {candidates} candidates")]
    NoWorkersAvailable { candidates: usize },

    #[error(
        "All {online} online workers exceed load thresholds (cpu > {max_cpu_percent}% or mem > {max_memory_percent}%)"
    )]
    AllWorkersOverloaded {
        online: usize,
        max_cpu_percent: f64,
        max_memory_percent: f64,
    },
}

impl WorkerSelectionService {
    pub fn new(tracker: WorkerLoadTracker, config: WorkerSelectionConfig) -> Self {
        Self { tracker, config }
    }

    pub fn tracker(&self) -> &WorkerLoadTracker {
        &self.tracker
    }

    /// Online flag and load for each listed worker, in input order
    pub async fn describe_workers(&self, worker_ids: &[WorkerId]) -> Vec<WorkerSummary> {
        let mut live = self.tracker.get_live_records(worker_ids).await;
        worker_ids
            .iter()
            .map(|&worker_id| match live.remove(&worker_id) {
                Some(load) => WorkerSummary {
                    worker_id,
                    is_online: true,
                    load,
                },
                None => WorkerSummary {
                    worker_id,
                    is_online: false,
                    load: None,
                },
            })
            .collect()
    }

    /// Least loaded online worker below both thresholds; lowest id wins ties
    pub async fn select_least_loaded(
        &self,
        worker_ids: &[WorkerId],
    ) -> Result<SelectedWorker, WorkerSelectionError> {
        if worker_ids.is_empty() {
            return Err(WorkerSelectionError::NoCandidates);
        }

        let loads = self.tracker.get_all_loads(worker_ids).await;
        let mut statistics = WorkerSelectionStatistics {
            candidates: worker_ids.len(),
            online: loads.len(),
            overloaded: 0,
        };

        if loads.is_empty() {
            warn!(candidates = worker_ids.len(), "No online workers for selection");
            return Err(WorkerSelectionError::NoWorkersAvailable {
                candidates: worker_ids.len(),
            });
        }

        let mut best: Option<(WorkerId, &WorkerLoadRecord)> = None;
        for (&worker_id, load) in &loads {
            if self.is_overloaded(load) {
                statistics.overloaded += 1;
                debug!(
                    worker_id = worker_id,
                    cpu = load.cpu_percent,
                    mem = load.memory_percent,
                    "Skipping overloaded worker"
                );
                continue;
            }

            let better = match best {
                None => true,
                Some((best_id, best_load)) => {
                    let (score, best_score) = (combined_load(load), combined_load(best_load));
                    score < best_score || (score == best_score && worker_id < best_id)
                }
            };
            if better {
                best = Some((worker_id, load));
            }
        }

        match best {
            Some((worker_id, load)) => {
                info!(
                    worker_id = worker_id,
                    cpu = load.cpu_percent,
                    mem = load.memory_percent,
                    candidates = statistics.candidates,
                    online = statistics.online,
                    overloaded = statistics.overloaded,
                    "Selected least loaded worker"
                );
                Ok(SelectedWorker {
                    worker_id,
                    load: load.clone(),
                })
            }
            None => {
                warn!(
                    online = statistics.online,
                    max_cpu_percent = self.config.max_cpu_percent,
                    max_memory_percent = self.config.max_memory_percent,
                    "All online workers are overloaded"
                );
                Err(WorkerSelectionError::AllWorkersOverloaded {
                    online: statistics.online,
                    max_cpu_percent: self.config.max_cpu_percent,
                    max_memory_percent: self.config.max_memory_percent,
                })
            }
        }
    }

    fn is_overloaded(&self, load: &WorkerLoadRecord) -> bool {
        load.cpu_percent > self.config.max_cpu_percent
            || load.memory_percent > self.config.max_memory_percent
    }
}

fn combined_load(load: &WorkerLoadRecord) -> f64 {
    load.cpu_percent + load.memory_percent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liveness::{InMemoryLivenessStore, LivenessProvider};

    fn service() -> WorkerSelectionService {
        let tracker = WorkerLoadTracker::new(LivenessProvider::memory(InMemoryLivenessStore::new()));
        WorkerSelectionService::new(tracker, WorkerSelectionConfig::default())
    }

    #[tokio::test]
    async fn test_selects_lowest_combined_load() {
        let service = service();
        service.tracker().publish_heartbeat(1, 50.0, 50.0).await;
        service.tracker().publish_heartbeat(2, 10.0, 30.0).await;
        service.tracker().publish_heartbeat(3, 20.0, 30.0).await;

        let selected = service.select_least_loaded(&[1, 2, 3, 4]).await.unwrap();
        assert_eq!(selected.worker_id, 2);
    }

    #[tokio::test]
    async fn test_ties_break_on_lowest_id() {
        let service = service();
        service.tracker().publish_heartbeat(8, 10.0, 10.0).await;
        service.tracker().publish_heartbeat(5, 15.0, 5.0).await;

        let selected = service.select_least_loaded(&[8, 5]).await.unwrap();
        assert_eq!(selected.worker_id, 5);
    }

    #[tokio::test]
    async fn test_overloaded_workers_are_skipped() {
        let service = service();
        service.tracker().publish_heartbeat(1, 90.0, 10.0).await;
        service.tracker().publish_heartbeat(2, 10.0, 86.0).await;

        let err = service.select_least_loaded(&[1, 2]).await.unwrap_err();
        assert_eq!(
            err,
            WorkerSelectionError::AllWorkersOverloaded {
                online: 2,
                max_cpu_percent: 85.0,
                max_memory_percent: 85.0,
            }
        );
    }

    #[tokio::test]
    async fn test_offline_candidates() {
        let service = service();
        assert_eq!(
            service.select_least_loaded(&[1, 2]).await.unwrap_err(),
            WorkerSelectionError::NoWorkersAvailable { candidates: 2 }
        );
        assert_eq!(
            service.select_least_loaded(&[]).await.unwrap_err(),
            WorkerSelectionError::NoCandidates
        );
    }

    #[tokio::test]
    async fn test_describe_workers_keeps_input_order() {
        let service = service();
        service.tracker().publish_heartbeat(2, 1.0, 2.0).await;

        let summaries = service.describe_workers(&[3, 2, 1]).await;
        let online: Vec<_> = summaries.iter().map(|s| (s.worker_id, s.is_online)).collect();
        assert_eq!(online, vec![(3, false), (2, true), (1, false)]);
        assert_eq!(summaries[1].load.as_ref().unwrap().cpu_percent, 1.0);
    }

    #[tokio::test]
    async fn test_malformed_live_record_is_online_without_load() {
        use crate::constants::liveness::FIELD_CPU;
        use crate::liveness::{worker_load_key, LivenessStore};
        use std::time::Duration;

        let store = InMemoryLivenessStore::new();
        let tracker = WorkerLoadTracker::new(LivenessProvider::memory(store.clone()));
        let service = WorkerSelectionService::new(tracker, WorkerSelectionConfig::default());
        store
            .set_fields_with_expiry(
                &worker_load_key(4),
                &[(FIELD_CPU, "n/a".to_string())],
                Duration::from_secs(15),
            )
            .await
            .unwrap();

        let summaries = service.describe_workers(&[4]).await;
        assert!(summaries[0].is_online);
        assert!(summaries[0].load.is_none());
        assert_eq!(summaries[0].is_online, service.tracker().is_online(4).await);
    }
}
