//! # Heartbeat Publisher
//!
//! Worker-side loop that samples local CPU and memory usage and publishes it
//! through [`WorkerLoadTracker::publish_heartbeat`] every heartbeat interval
//! until a shutdown signal arrives. Failed publishes are logged by the
//! tracker and the loop carries on; a worker that cannot reach the store
//! simply reads as offline.

use super::tracker::{WorkerId, WorkerLoadTracker};
use crate::constants::liveness::HEARTBEAT_INTERVAL;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::System;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Point-in-time resource usage, both values in percent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadSample {
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

/// Source of load samples
pub trait LoadSampler: Send + Sync {
    fn sample(&self) -> LoadSample;
}

/// Host-wide usage read through `sysinfo`
///
/// CPU usage is computed between consecutive refreshes, so the first sample
/// after construction may read as zero.
pub struct SystemLoadSampler {
    system: Mutex<System>,
}

impl std::fmt::Debug for SystemLoadSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemLoadSampler").finish_non_exhaustive()
    }
}

impl Default for SystemLoadSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemLoadSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        system.refresh_memory();
        Self {
            system: Mutex::new(system),
        }
    }
}

impl LoadSampler for SystemLoadSampler {
    fn sample(&self) -> LoadSample {
        let mut system = self.system.lock();
        system.refresh_cpu_usage();
        system.refresh_memory();

        let total = system.total_memory();
        let memory_percent = if total == 0 {
            0.0
        } else {
            system.used_memory() as f64 / total as f64 * 100.0
        };

        LoadSample {
            cpu_percent: round_percent(f64::from(system.global_cpu_usage())),
            memory_percent: round_percent(memory_percent),
        }
    }
}

fn round_percent(value: f64) -> f64 {
    (value.clamp(0.0, 100.0) * 10.0).round() / 10.0
}

pub struct HeartbeatPublisher<S> {
    worker_id: WorkerId,
    tracker: WorkerLoadTracker,
    sampler: S,
    interval: Duration,
}

impl<S> std::fmt::Debug for HeartbeatPublisher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeartbeatPublisher")
            .field("worker_id", &self.worker_id)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl<S: LoadSampler + 'static> HeartbeatPublisher<S> {
    pub fn new(worker_id: WorkerId, tracker: WorkerLoadTracker, sampler: S) -> Self {
        Self {
            worker_id,
            tracker,
            sampler,
            interval: HEARTBEAT_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    /// Sample and publish one heartbeat
    pub async fn publish_once(&self) -> bool {
        let sample = self.sampler.sample();
        self.tracker
            .publish_heartbeat(self.worker_id, sample.cpu_percent, sample.memory_percent)
            .await
    }

    /// Publish every interval until shutdown; returns the number of successful publishes
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> u64 {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut published = 0u64;
        let mut failed_in_a_row = 0u32;

        info!(
            worker_id = self.worker_id,
            interval_ms = self.interval.as_millis() as u64,
            ttl_seconds = self.tracker.ttl().as_secs(),
            provider = self.tracker.provider().provider_name(),
            "Heartbeat publisher started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.publish_once().await {
                        published += 1;
                        if failed_in_a_row > 0 {
                            info!(worker_id = self.worker_id, "Heartbeat publishing recovered");
                        }
                        failed_in_a_row = 0;
                    } else {
                        failed_in_a_row += 1;
                        if failed_in_a_row == 1 {
                            warn!(worker_id = self.worker_id, "Heartbeat not stored, worker will read as offline");
                        } else {
                            debug!(worker_id = self.worker_id, failed_in_a_row, "Heartbeat not stored");
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!(worker_id = self.worker_id, published, "Heartbeat publisher stopping");
                    break;
                }
            }
        }

        published
    }

    pub fn spawn(self: Arc<Self>, shutdown: broadcast::Receiver<()>) -> JoinHandle<u64> {
        tokio::spawn(async move { self.run(shutdown).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liveness::provider::LivenessProvider;
    use crate::liveness::providers::InMemoryLivenessStore;

    struct FixedSampler(LoadSample);

    impl LoadSampler for FixedSampler {
        fn sample(&self) -> LoadSample {
            self.0
        }
    }

    #[test]
    fn test_round_percent_clamps() {
        assert_eq!(round_percent(101.3), 100.0);
        assert_eq!(round_percent(-1.0), 0.0);
        assert_eq!(round_percent(12.345), 12.3);
    }

    #[test]
    fn test_system_sampler_reports_percentages() {
        let sample = SystemLoadSampler::new().sample();
        assert!((0.0..=100.0).contains(&sample.cpu_percent));
        assert!((0.0..=100.0).contains(&sample.memory_percent));
    }

    #[tokio::test(start_paused = true)]
    async fn test_publisher_keeps_worker_online_until_shutdown() {
        let tracker = WorkerLoadTracker::new(LivenessProvider::memory(InMemoryLivenessStore::new()));
        let publisher = Arc::new(HeartbeatPublisher::new(
            9,
            tracker.clone(),
            FixedSampler(LoadSample {
                cpu_percent: 30.0,
                memory_percent: 60.0,
            }),
        ));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = publisher.spawn(shutdown_rx);

        tokio::time::sleep(Duration::from_secs(40)).await;
        assert!(tracker.is_online(9).await);
        assert_eq!(tracker.get_load(9).await.unwrap().memory_percent, 60.0);

        shutdown_tx.send(()).unwrap();
        let published = handle.await.unwrap();
        assert!(published >= 13);

        tokio::time::sleep(Duration::from_secs(16)).await;
        assert!(!tracker.is_online(9).await);
    }
}
