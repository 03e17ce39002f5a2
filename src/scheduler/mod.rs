//! # Periodic Job Scheduler
//!
//! Background maintenance jobs driven by the tokio timer.
//!
//! ```text
//! PeriodicJobScheduler
//! ├── job loop: due_scheduled_scans  (interval)  -> DueScanService
//! ├── job loop: refresh_statistics   (cron)      -> StatisticsService
//! └── job loop: worker_cleanup       (cron)      -> CleanupBroadcastService
//! ```

pub mod firing;
pub mod job;
pub mod job_scheduler;
pub mod maintenance;

pub use firing::{plan_firings, FiringPlan, SchedulerClock};
pub use job::{JobCallback, JobTrigger, ScheduledJob};
pub use job_scheduler::{JobInfo, PeriodicJobScheduler};
pub use maintenance::{
    build_maintenance_jobs, CleanupBroadcastReport, CleanupBroadcastService, DueScanService,
    MaintenanceServices, StatisticsService,
};
