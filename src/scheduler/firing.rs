//! # Firing Computation
//!
//! Pure functions deciding which scheduled run times of a job execute, which
//! are discarded as misfires, and when the job fires next. Kept free of any
//! clock or runtime so every rule can be tested with fixed timestamps.
//!
//! Given the time a job was scheduled to fire and the current time:
//!
//! 1. Every run time in `[scheduled, now]` is due.
//! 2. With coalescing on, only the latest due time is considered; earlier
//!    ones are dropped silently.
//! 3. A considered time more than `grace` behind `now` is a misfire and is
//!    skipped rather than run late.
//! 4. The next fire time is the first trigger time after the latest due
//!    time, or `scheduled` itself when nothing was due yet.

use super::job::JobTrigger;
use crate::constants::scheduler::MAX_CATCH_UP_FIRINGS;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::Instant;

/// Decision for one wake-up of a job loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiringPlan {
    /// Run times to execute now, oldest first
    pub run_times: Vec<DateTime<Utc>>,
    /// Run times skipped for being older than the grace window
    pub misfired: Vec<DateTime<Utc>>,
    /// Due run times folded into a later one by coalescing
    pub coalesced: usize,
    /// `None` when the trigger has no further fire times
    pub next_fire: Option<DateTime<Utc>>,
}

pub fn plan_firings(
    trigger: &JobTrigger,
    scheduled: DateTime<Utc>,
    now: DateTime<Utc>,
    coalesce: bool,
    grace: Duration,
) -> FiringPlan {
    let mut due = Vec::new();
    let mut cursor = Some(scheduled);
    while let Some(run_time) = cursor {
        if run_time > now || due.len() >= MAX_CATCH_UP_FIRINGS {
            break;
        }
        due.push(run_time);
        cursor = trigger.next_after(run_time);
    }

    let next_fire = match (due.last(), cursor) {
        (None, _) => Some(scheduled),
        // catch-up cap reached; resume from the present
        (Some(_), Some(pending)) if pending <= now => trigger.next_after(now),
        (Some(_), pending) => pending,
    };

    let mut coalesced = 0;
    if coalesce && due.len() > 1 {
        coalesced = due.len() - 1;
        due.drain(..coalesced);
    }

    let grace = to_chrono(grace);
    let (run_times, misfired) = due
        .into_iter()
        .partition(|run_time| now.signed_duration_since(*run_time) <= grace);

    FiringPlan {
        run_times,
        misfired,
        coalesced,
        next_fire,
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    // from_std fails only beyond i64::MAX milliseconds
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::weeks(52 * 100))
}

/// Wall clock anchored to the tokio clock
///
/// Cron schedules are computed in UTC wall time while sleeping happens on the
/// tokio timer. Anchoring both at construction keeps them consistent, and
/// under a paused test runtime wall time advances with virtual time.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerClock {
    anchor_wall: DateTime<Utc>,
    anchor_instant: Instant,
}

impl Default for SchedulerClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(wall: DateTime<Utc>) -> Self {
        Self {
            anchor_wall: wall,
            anchor_instant: Instant::now(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        let elapsed = Instant::now().saturating_duration_since(self.anchor_instant);
        self.anchor_wall + to_chrono(elapsed)
    }

    /// Tokio instant corresponding to a wall time; past times map to now
    pub fn instant_at(&self, wall: DateTime<Utc>) -> Instant {
        let offset = wall
            .signed_duration_since(self.anchor_wall)
            .to_std()
            .unwrap_or(Duration::ZERO);
        (self.anchor_instant + offset).max(Instant::now())
    }

    pub async fn sleep_until(&self, wall: DateTime<Utc>) {
        tokio::time::sleep_until(self.instant_at(wall)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, minute, second).unwrap()
    }

    fn every_minute() -> JobTrigger {
        JobTrigger::interval("test", Duration::from_secs(60)).unwrap()
    }

    #[test]
    fn test_on_time_firing_runs_once() {
        let plan = plan_firings(&every_minute(), at(10, 0, 0), at(10, 0, 0), true, Duration::from_secs(300));
        assert_eq!(plan.run_times, vec![at(10, 0, 0)]);
        assert!(plan.misfired.is_empty());
        assert_eq!(plan.next_fire, Some(at(10, 1, 0)));
    }

    #[test]
    fn test_nothing_due_keeps_schedule() {
        let plan = plan_firings(&every_minute(), at(10, 5, 0), at(10, 4, 59), true, Duration::from_secs(300));
        assert!(plan.run_times.is_empty());
        assert_eq!(plan.next_fire, Some(at(10, 5, 0)));
    }

    #[test]
    fn test_coalesce_collapses_missed_ticks() {
        // process stalled for ten minutes
        let plan = plan_firings(&every_minute(), at(10, 0, 0), at(10, 10, 30), true, Duration::from_secs(300));
        assert_eq!(plan.run_times, vec![at(10, 10, 0)]);
        assert_eq!(plan.coalesced, 10);
        assert!(plan.misfired.is_empty());
        assert_eq!(plan.next_fire, Some(at(10, 11, 0)));
    }

    #[test]
    fn test_without_coalesce_old_ticks_misfire() {
        let plan = plan_firings(&every_minute(), at(10, 0, 0), at(10, 10, 30), false, Duration::from_secs(300));
        assert_eq!(plan.run_times.len(), 5);
        assert_eq!(plan.misfired.len(), 6);
        assert_eq!(plan.run_times[0], at(10, 6, 0));
    }

    #[test]
    fn test_late_beyond_grace_is_skipped() {
        let trigger = JobTrigger::cron("0 0 3 * * *").unwrap();
        let scheduled = at(3, 0, 0);
        let plan = plan_firings(&trigger, scheduled, at(3, 6, 0), true, Duration::from_secs(300));

        assert!(plan.run_times.is_empty());
        assert_eq!(plan.misfired, vec![scheduled]);
        assert_eq!(
            plan.next_fire,
            Some(Utc.with_ymd_and_hms(2024, 5, 2, 3, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_late_within_grace_still_runs() {
        let trigger = JobTrigger::cron("0 0 * * * *").unwrap();
        let plan = plan_firings(&trigger, at(10, 0, 0), at(10, 4, 59), true, Duration::from_secs(300));
        assert_eq!(plan.run_times, vec![at(10, 0, 0)]);
        assert_eq!(plan.next_fire, Some(at(11, 0, 0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_follows_paused_time() {
        let clock = SchedulerClock::starting_at(at(10, 0, 0));
        tokio::time::advance(Duration::from_secs(90)).await;
        assert_eq!(clock.now(), at(10, 1, 30));

        clock.sleep_until(at(10, 2, 0)).await;
        assert_eq!(clock.now(), at(10, 2, 0));
    }
}
