//! # Maintenance Jobs
//!
//! The fixed job set registered on every scheduler start:
//!
//! | Job id                | Trigger                  | Calls                      |
//! |-----------------------|--------------------------|----------------------------|
//! | `due_scheduled_scans` | every 60 s               | [`DueScanService`]         |
//! | `refresh_statistics`  | top of every hour        | [`StatisticsService`]      |
//! | `worker_cleanup`      | daily at 03:00 UTC       | [`CleanupBroadcastService`] |
//!
//! Each callback logs the outcome of its service call. A failing service is
//! logged here and reported to the scheduler as a job error, which the
//! scheduler logs and drops.

use super::job::{JobTrigger, ScheduledJob};
use crate::config::SchedulerConfig;
use crate::constants::scheduler::{CLEANUP_JOB_ID, DUE_SCANS_JOB_ID, STATISTICS_JOB_ID};
use crate::error::SchedulerError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info};

/// Finds scheduled scans whose next run time has passed and triggers them
#[async_trait]
pub trait DueScanService: Send + Sync {
    /// Number of scans triggered
    async fn trigger_due_scans(&self) -> anyhow::Result<usize>;
}

/// Recomputes aggregate counts shown on dashboards
#[async_trait]
pub trait StatisticsService: Send + Sync {
    /// Refreshed counters by name
    async fn refresh_statistics(&self) -> anyhow::Result<BTreeMap<String, i64>>;
}

/// Sends a cleanup instruction to every known worker
#[async_trait]
pub trait CleanupBroadcastService: Send + Sync {
    async fn broadcast_cleanup(&self) -> anyhow::Result<CleanupBroadcastReport>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupBroadcastReport {
    pub total_workers: usize,
    pub dispatched: usize,
    pub failed: usize,
}

/// External services called by the maintenance jobs
#[derive(Clone)]
pub struct MaintenanceServices {
    pub due_scans: Arc<dyn DueScanService>,
    pub statistics: Arc<dyn StatisticsService>,
    pub cleanup: Arc<dyn CleanupBroadcastService>,
}

impl std::fmt::Debug for MaintenanceServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaintenanceServices").finish_non_exhaustive()
    }
}

/// Build the fixed job set from configuration
pub fn build_maintenance_jobs(
    config: &SchedulerConfig,
    services: &MaintenanceServices,
) -> Result<Vec<ScheduledJob>, SchedulerError> {
    let grace = config.misfire_grace();

    let due_scans = services.due_scans.clone();
    let statistics = services.statistics.clone();
    let cleanup = services.cleanup.clone();

    let jobs = vec![
        ScheduledJob::new(
            DUE_SCANS_JOB_ID,
            JobTrigger::interval(DUE_SCANS_JOB_ID, config.due_scans_interval())?,
            move || run_due_scans(due_scans.clone()),
        ),
        ScheduledJob::new(
            STATISTICS_JOB_ID,
            JobTrigger::cron(&config.statistics_cron)?,
            move || run_statistics_refresh(statistics.clone()),
        ),
        ScheduledJob::new(
            CLEANUP_JOB_ID,
            JobTrigger::cron(&config.cleanup_cron)?,
            move || run_cleanup_broadcast(cleanup.clone()),
        ),
    ];

    Ok(jobs
        .into_iter()
        .map(|job| job.with_misfire_grace(grace))
        .collect())
}

async fn run_due_scans(service: Arc<dyn DueScanService>) -> anyhow::Result<()> {
    let started = Instant::now();
    match service.trigger_due_scans().await {
        Ok(0) => {
            debug!(job_id = DUE_SCANS_JOB_ID, "No scheduled scans due");
            Ok(())
        }
        Ok(triggered) => {
            info!(
                job_id = DUE_SCANS_JOB_ID,
                triggered = triggered,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Triggered due scheduled scans"
            );
            Ok(())
        }
        Err(e) => {
            error!(job_id = DUE_SCANS_JOB_ID, error = %e, "Due scheduled scan check failed");
            Err(e)
        }
    }
}

async fn run_statistics_refresh(service: Arc<dyn StatisticsService>) -> anyhow::Result<()> {
    let started = Instant::now();
    match service.refresh_statistics().await {
        Ok(counts) => {
            info!(
                job_id = STATISTICS_JOB_ID,
                counters = ?counts,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Statistics refreshed"
            );
            Ok(())
        }
        Err(e) => {
            error!(job_id = STATISTICS_JOB_ID, error = %e, "Statistics refresh failed");
            Err(e)
        }
    }
}

async fn run_cleanup_broadcast(service: Arc<dyn CleanupBroadcastService>) -> anyhow::Result<()> {
    match service.broadcast_cleanup().await {
        Ok(report) => {
            info!(
                job_id = CLEANUP_JOB_ID,
                total_workers = report.total_workers,
                dispatched = report.dispatched,
                failed = report.failed,
                "Cleanup broadcast sent"
            );
            Ok(())
        }
        Err(e) => {
            error!(job_id = CLEANUP_JOB_ID, error = %e, "Cleanup broadcast failed");
            Err(e)
        }
    }
}
