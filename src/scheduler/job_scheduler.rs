//! # Periodic Job Scheduler
//!
//! Timer-driven runner for the fixed maintenance jobs.
//!
//! ## Lifecycle
//!
//! `stopped -> running -> stopped`. [`start`](PeriodicJobScheduler::start) is
//! a logged no-op while running. [`shutdown`](PeriodicJobScheduler::shutdown)
//! stops future firings immediately without waiting for in-flight callbacks,
//! then drops the running instance so the next `start` builds a fresh one.
//!
//! ## Execution Model
//!
//! One tokio task per job sleeps until the next fire time, asks
//! [`plan_firings`] what to run, and spawns each callback as its own task.
//! A per-job counter enforces `max_instances`: a firing that would exceed it
//! is dropped, not queued. Callback errors and panics are logged and never
//! reach the job loop.

use super::firing::{plan_firings, SchedulerClock};
use super::job::ScheduledJob;
use super::maintenance::{build_maintenance_jobs, MaintenanceServices};
use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

type JobFactory = Arc<dyn Fn() -> Result<Vec<ScheduledJob>, SchedulerError> + Send + Sync>;

/// Registered job as reported by [`PeriodicJobScheduler::registered_jobs`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    pub id: &'static str,
    pub trigger: String,
}

struct RunningScheduler {
    shutdown_tx: broadcast::Sender<()>,
    stop: Arc<AtomicBool>,
    loops: Vec<JoinHandle<()>>,
    jobs: Vec<JobInfo>,
}

pub struct PeriodicJobScheduler {
    config: SchedulerConfig,
    job_factory: JobFactory,
    running: Mutex<Option<RunningScheduler>>,
}

impl std::fmt::Debug for PeriodicJobScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicJobScheduler")
            .field("enabled", &self.config.enabled)
            .field("running", &self.is_running())
            .finish()
    }
}

impl PeriodicJobScheduler {
    /// Scheduler running the built-in maintenance jobs
    pub fn new(config: SchedulerConfig, services: MaintenanceServices) -> Self {
        let job_config = config.clone();
        Self {
            config,
            job_factory: Arc::new(move || build_maintenance_jobs(&job_config, &services)),
            running: Mutex::new(None),
        }
    }

    /// Scheduler running an explicit job list
    pub fn with_jobs(config: SchedulerConfig, jobs: Vec<ScheduledJob>) -> Self {
        Self {
            config,
            job_factory: Arc::new(move || Ok(jobs.clone())),
            running: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Jobs of the running instance; empty while stopped
    pub fn registered_jobs(&self) -> Vec<JobInfo> {
        self.running
            .lock()
            .as_ref()
            .map(|running| running.jobs.clone())
            .unwrap_or_default()
    }

    /// Register the jobs and start their timer loops
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<(), SchedulerError> {
        if !self.config.enabled {
            info!("Periodic job scheduler disabled by configuration");
            return Ok(());
        }

        let mut running = self.running.lock();
        if running.is_some() {
            info!("Periodic job scheduler already running");
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;
        let jobs = (self.job_factory)()?;

        let (shutdown_tx, _) = broadcast::channel(1);
        let stop = Arc::new(AtomicBool::new(false));
        let clock = SchedulerClock::new();

        let mut loops = Vec::with_capacity(jobs.len());
        let mut infos = Vec::with_capacity(jobs.len());
        for job in jobs {
            infos.push(JobInfo {
                id: job.id,
                trigger: job.trigger.describe(),
            });
            let job_loop = JobLoop {
                job: Arc::new(job),
                clock,
                stop: stop.clone(),
                in_flight: Arc::new(AtomicUsize::new(0)),
            };
            loops.push(runtime.spawn(job_loop.run(shutdown_tx.subscribe())));
        }

        info!(
            jobs = ?infos.iter().map(|job| job.id).collect::<Vec<_>>(),
            "Periodic job scheduler started"
        );

        *running = Some(RunningScheduler {
            shutdown_tx,
            stop,
            loops,
            jobs: infos,
        });
        Ok(())
    }

    /// Stop future firings without waiting for in-flight callbacks
    pub fn shutdown(&self) {
        let Some(running) = self.running.lock().take() else {
            debug!("Periodic job scheduler not running, shutdown is a no-op");
            return;
        };

        running.stop.store(true, Ordering::SeqCst);
        // no receivers left is fine: the loops may already have exited
        let _ = running.shutdown_tx.send(());
        for handle in &running.loops {
            handle.abort();
        }

        info!(jobs = running.jobs.len(), "Periodic job scheduler stopped");
    }
}

impl Drop for PeriodicJobScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct JobLoop {
    job: Arc<ScheduledJob>,
    clock: SchedulerClock,
    stop: Arc<AtomicBool>,
    in_flight: Arc<AtomicUsize>,
}

impl JobLoop {
    async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut next_fire = self.job.trigger.next_after(self.clock.now());
        debug!(job_id = self.job.id, next_fire = ?next_fire, "Job loop started");

        while let Some(fire_at) = next_fire {
            tokio::select! {
                _ = self.clock.sleep_until(fire_at) => {}
                _ = shutdown.recv() => break,
            }
            if self.stop.load(Ordering::SeqCst) {
                break;
            }

            let plan = plan_firings(
                &self.job.trigger,
                fire_at,
                self.clock.now(),
                self.job.coalesce,
                self.job.misfire_grace,
            );

            if plan.coalesced > 0 {
                info!(job_id = self.job.id, coalesced = plan.coalesced, "Coalesced missed firings");
            }
            for missed in &plan.misfired {
                warn!(
                    job_id = self.job.id,
                    scheduled = %missed,
                    grace_seconds = self.job.misfire_grace.as_secs(),
                    "Run time missed by more than the grace window, skipping"
                );
            }
            for run_time in plan.run_times {
                self.submit(run_time);
            }

            next_fire = plan.next_fire;
        }

        debug!(job_id = self.job.id, "Job loop exited");
    }

    fn submit(&self, run_time: DateTime<Utc>) {
        if self.stop.load(Ordering::SeqCst) {
            return;
        }

        let Some(guard) = InstanceGuard::acquire(&self.in_flight, self.job.max_instances) else {
            warn!(
                job_id = self.job.id,
                scheduled = %run_time,
                max_instances = self.job.max_instances,
                "Previous run still executing, skipping this firing"
            );
            return;
        };

        let job = self.job.clone();
        tokio::spawn(async move {
            let _guard = guard;
            debug!(job_id = job.id, scheduled = %run_time, "Running job");

            match AssertUnwindSafe((job.callback)()).catch_unwind().await {
                Ok(Ok(())) => debug!(job_id = job.id, "Job completed"),
                Ok(Err(e)) => error!(job_id = job.id, error = %e.source, "Job failed"),
                Err(_) => error!(job_id = job.id, "Job panicked"),
            }
        });
    }
}

/// Running-instance slot released on drop, panics included
struct InstanceGuard {
    in_flight: Arc<AtomicUsize>,
}

impl InstanceGuard {
    fn acquire(in_flight: &Arc<AtomicUsize>, max_instances: usize) -> Option<Self> {
        in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current < max_instances).then_some(current + 1)
            })
            .ok()
            .map(|_| Self {
                in_flight: in_flight.clone(),
            })
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::job::JobTrigger;
    use std::time::Duration;

    #[test]
    fn test_instance_guard_limits_and_releases() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let first = InstanceGuard::acquire(&in_flight, 1);
        assert!(first.is_some());
        assert!(InstanceGuard::acquire(&in_flight, 1).is_none());

        drop(first);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
        assert!(InstanceGuard::acquire(&in_flight, 1).is_some());
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let job = ScheduledJob::new(
            "noop",
            JobTrigger::interval("noop", Duration::from_secs(1)).unwrap(),
            || async { Ok(()) },
        );
        let scheduler = PeriodicJobScheduler::with_jobs(SchedulerConfig::default(), vec![job]);
        assert_eq!(scheduler.start(), Err(SchedulerError::NoRuntime));
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_disabled_scheduler_does_not_start() {
        let config = SchedulerConfig {
            enabled: false,
            ..SchedulerConfig::default()
        };
        let scheduler = PeriodicJobScheduler::with_jobs(config, Vec::new());
        scheduler.start().unwrap();
        assert!(!scheduler.is_running());
        assert!(scheduler.registered_jobs().is_empty());
    }
}
