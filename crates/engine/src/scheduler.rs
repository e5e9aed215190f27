use crate::error::EngineError;
use crate::jobs::JobRunner;
use chrono::{Local, NaiveDateTime, NaiveTime};
use configuration::{JobKind, JobSchedule, ScheduleConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Drives every job from the versioned `[schedule]` configuration.
pub struct Scheduler {
    runner: Arc<JobRunner>,
    schedule: ScheduleConfig,
}

impl Scheduler {
    pub fn new(runner: Arc<JobRunner>, schedule: ScheduleConfig) -> Self {
        Self { runner, schedule }
    }

    /// Primes the rate cache and mirrors the sheet once, then spawns one task per job.
    ///
    /// Interval jobs next fire one full period after bootstrap; daily jobs at
    /// their next local time of day. The returned handles run until aborted.
    pub async fn start(self) -> Result<Vec<JoinHandle<()>>, EngineError> {
        tracing::info!("Scheduler bootstrapping: refreshing rate, then syncing.");
        self.runner.run_logged(JobKind::RefreshRate).await;
        self.runner.run_logged(JobKind::Sync).await;

        let mut handles = Vec::with_capacity(JobKind::ALL.len());
        for job in JobKind::ALL {
            let runner = self.runner.clone();
            let handle = match self.schedule.for_job(job) {
                JobSchedule::Every { every_secs } => {
                    let period = Duration::from_secs(*every_secs);
                    tracing::info!(job = job.name(), every_secs, "Scheduled interval job.");
                    tokio::spawn(run_every(runner, job, period))
                }
                schedule @ JobSchedule::Daily { .. } => {
                    let at = schedule
                        .time_of_day()
                        .map_err(|e| EngineError::Configuration(e.to_string()))?
                        .ok_or_else(|| EngineError::Configuration(format!("{} has no time of day", job.name())))?;
                    tracing::info!(job = job.name(), at = %at, "Scheduled daily job.");
                    tokio::spawn(run_daily(runner, job, at))
                }
            };
            handles.push(handle);
        }
        Ok(handles)
    }
}

async fn run_every(runner: Arc<JobRunner>, job: JobKind, period: Duration) {
    let mut timer = interval_at(Instant::now() + period, period);
    // A slow run must not trigger a burst of catch-up runs.
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        timer.tick().await;
        runner.run_logged(job).await;
    }
}

async fn run_daily(runner: Arc<JobRunner>, job: JobKind, at: NaiveTime) {
    loop {
        tokio::time::sleep(until_next(Local::now().naive_local(), at)).await;
        runner.run_logged(job).await;
    }
}

/// Time from `now` until the next occurrence of `at`; a time equal to `now`
/// means tomorrow, so a daily job never fires twice in the same second.
pub fn until_next(now: NaiveDateTime, at: NaiveTime) -> Duration {
    let mut next = now.date().and_time(at);
    if next <= now {
        next += chrono::Duration::days(1);
    }
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 10).unwrap().and_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn later_today() {
        let midday = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
        assert_eq!(until_next(at(9, 30, 0), midday), Duration::from_secs(150 * 60));
    }

    #[test]
    fn already_passed_rolls_to_tomorrow() {
        let midnight = NaiveTime::from_hms_opt(0, 0, 0).unwrap();
        assert_eq!(until_next(at(23, 59, 0), midnight), Duration::from_secs(60));
        assert_eq!(until_next(at(0, 0, 0), midnight), Duration::from_secs(24 * 60 * 60));
    }
}
