//! Job definitions: when a job fires and what it runs.

use crate::constants::scheduler::{MAX_INSTANCES, MISFIRE_GRACE};
use crate::error::{SchedulerError, SchedulerJobError};
use chrono::{DateTime, Utc};
use cron::Schedule;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// When a job fires
#[derive(Debug, Clone)]
pub enum JobTrigger {
    /// Fixed period, first firing one period after the scheduler starts
    Interval(Duration),
    /// Six-field cron expression (seconds first), evaluated in UTC
    Cron {
        expression: String,
        schedule: Box<Schedule>,
    },
}

impl JobTrigger {
    pub fn interval(job_id: &str, period: Duration) -> Result<Self, SchedulerError> {
        if period.is_zero() {
            return Err(SchedulerError::InvalidInterval {
                job_id: job_id.to_string(),
            });
        }
        Ok(Self::Interval(period))
    }

    pub fn cron(expression: &str) -> Result<Self, SchedulerError> {
        let schedule = Schedule::from_str(expression).map_err(|e| SchedulerError::InvalidCron {
            expression: expression.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::Cron {
            expression: expression.to_string(),
            schedule: Box::new(schedule),
        })
    }

    /// First fire time strictly after `after`
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Interval(period) => {
                let period = chrono::Duration::from_std(*period).ok()?;
                after.checked_add_signed(period)
            }
            Self::Cron { schedule, .. } => schedule.after(&after).next(),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Interval(period) => format!("interval[{}s]", period.as_secs()),
            Self::Cron { expression, .. } => format!("cron[{}]", expression),
        }
    }
}

pub type JobCallback =
    Arc<dyn Fn() -> BoxFuture<'static, Result<(), SchedulerJobError>> + Send + Sync>;

/// A job registered with the scheduler
#[derive(Clone)]
pub struct ScheduledJob {
    pub id: &'static str,
    pub trigger: JobTrigger,
    /// Run missed firings once instead of once per missed tick
    pub coalesce: bool,
    /// Concurrent executions allowed; further firings are dropped
    pub max_instances: usize,
    /// How late a firing may start before it is skipped
    pub misfire_grace: Duration,
    pub callback: JobCallback,
}

impl std::fmt::Debug for ScheduledJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledJob")
            .field("id", &self.id)
            .field("trigger", &self.trigger.describe())
            .field("coalesce", &self.coalesce)
            .field("max_instances", &self.max_instances)
            .field("misfire_grace", &self.misfire_grace)
            .finish_non_exhaustive()
    }
}

impl ScheduledJob {
    pub fn new<F, Fut>(id: &'static str, trigger: JobTrigger, callback: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let callback: JobCallback = Arc::new(move || {
            callback()
                .map(move |result| result.map_err(|source| SchedulerJobError { job_id: id, source }))
                .boxed()
        });

        Self {
            id,
            trigger,
            coalesce: true,
            max_instances: MAX_INSTANCES,
            misfire_grace: MISFIRE_GRACE,
            callback,
        }
    }

    pub fn with_coalesce(mut self, coalesce: bool) -> Self {
        self.coalesce = coalesce;
        self
    }

    pub fn with_max_instances(mut self, max_instances: usize) -> Self {
        self.max_instances = max_instances.max(1);
        self
    }

    pub fn with_misfire_grace(mut self, grace: Duration) -> Self {
        self.misfire_grace = grace;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_cron_next_after_is_exclusive() {
        let trigger = JobTrigger::cron("0 0 * * * *").unwrap();
        let top = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        assert_eq!(
            trigger.next_after(top),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_invalid_triggers_rejected() {
        assert!(matches!(
            JobTrigger::cron("every hour"),
            Err(SchedulerError::InvalidCron { .. })
        ));
        assert_eq!(
            JobTrigger::interval("due", Duration::ZERO).unwrap_err(),
            SchedulerError::InvalidInterval {
                job_id: "due".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_callback_error_is_tagged_with_job_id() {
        let job = ScheduledJob::new(
            "failing",
            JobTrigger::interval("failing", Duration::from_secs(1)).unwrap(),
            || async { Err(anyhow::anyhow!("service unavailable")) },
        );

        let err = (job.callback)().await.unwrap_err();
        assert_eq!(err.job_id, "failing");
        assert!(err.to_string().contains("service unavailable"));
        assert_eq!(job.max_instances, 1);
        assert!(job.coalesce);
    }
}
