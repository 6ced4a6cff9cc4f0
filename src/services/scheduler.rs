//! Wall-clock checkpoints of match days.
//!
//! The scheduler only decides *when*; each checkpoint submits the matching maintenance job to the
//! roster queue like any other command.

use std::time::Duration as StdDuration;

use time::{Duration, OffsetDateTime, Time};
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{debug, info, warn};

use crate::{
    config::AppConfig,
    error::ServiceError,
    services::maintenance_service,
    state::{SharedState, calendar::EventCalendar},
};

/// What a checkpoint runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledJob {
    /// Remind unconfirmed players.
    Reminder,
    /// Last reminder before the approval deadline.
    FinalReminder,
    /// Drop unconfirmed players.
    PruneUnapproved,
    /// Wipe the list.
    DailyCleanup,
}

/// A job bound to a local time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    /// Local time of day.
    pub at: Time,
    /// Job fired at that time.
    pub job: ScheduledJob,
}

/// Checkpoints of one match day, repeated on every match day of the calendar.
#[derive(Debug, Clone)]
pub struct Schedule {
    calendar: EventCalendar,
    checkpoints: Vec<Checkpoint>,
}

impl Schedule {
    /// Checkpoints are kept sorted by time; jobs sharing a time keep the given order.
    pub fn new(calendar: EventCalendar, mut checkpoints: Vec<Checkpoint>) -> Self {
        checkpoints.sort_by_key(|checkpoint| checkpoint.at);
        Self {
            calendar,
            checkpoints,
        }
    }

    /// Reminders, prune passes and the cleanup configured in `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut checkpoints = vec![
            Checkpoint {
                at: config.reminder,
                job: ScheduledJob::Reminder,
            },
            Checkpoint {
                at: config.final_reminder,
                job: ScheduledJob::FinalReminder,
            },
        ];
        checkpoints.extend(config.prune_checks.iter().map(|&at| Checkpoint {
            at,
            job: ScheduledJob::PruneUnapproved,
        }));
        checkpoints.push(Checkpoint {
            at: config.calendar.cleanup(),
            job: ScheduledJob::DailyCleanup,
        });

        Self::new(config.calendar.clone(), checkpoints)
    }

    /// Checkpoints of one match day, in firing order.
    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    /// First instant strictly after `now` with checkpoints, and every job due at that instant
    /// in checkpoint order.
    ///
    /// `None` when the calendar has no match day or no checkpoint is configured.
    pub fn next_after(&self, now: OffsetDateTime) -> Option<(OffsetDateTime, Vec<ScheduledJob>)> {
        let local = self.calendar.local(now);

        (0..=7).find_map(|offset| {
            let date = local.date().checked_add(Duration::days(offset))?;
            if !self.calendar.event_days().contains(&date.weekday()) {
                return None;
            }
            let instant = |checkpoint: &Checkpoint| {
                date.with_time(checkpoint.at)
                    .assume_offset(self.calendar.offset())
            };

            let first = self
                .checkpoints
                .iter()
                .position(|checkpoint| instant(checkpoint) > now)?;
            let at = self.checkpoints[first].at;
            let jobs = self.checkpoints[first..]
                .iter()
                .take_while(|checkpoint| checkpoint.at == at)
                .map(|checkpoint| checkpoint.job)
                .collect();
            Some((instant(&self.checkpoints[first]), jobs))
        })
    }
}

/// Fire checkpoints forever.
pub async fn run(state: SharedState, schedule: Schedule) {
    let mut cursor = state.now();

    loop {
        cursor = cursor.max(state.now());
        let Some((fires_at, jobs)) = schedule.next_after(cursor) else {
            info!("no match-day checkpoints configured; scheduler idle");
            return;
        };

        let wait = StdDuration::try_from(fires_at - state.now()).unwrap_or_default();
        debug!(jobs = ?jobs, fires_at = %fires_at, wait_secs = wait.as_secs(), "next checkpoint");
        sleep(wait).await;

        for job in jobs {
            if let Err(err) = run_job(&state, job).await {
                warn!(job = ?job, error = %err, "scheduled job failed");
            }
        }
        cursor = fires_at;
    }
}

/// Run one checkpoint job now.
pub async fn run_job(state: &SharedState, job: ScheduledJob) -> Result<(), ServiceError> {
    debug!(job = ?job, "running scheduled job");
    match job {
        ScheduledJob::Reminder => maintenance_service::send_reminders(state, false)
            .await
            .map(drop),
        ScheduledJob::FinalReminder => maintenance_service::send_reminders(state, true)
            .await
            .map(drop),
        ScheduledJob::PruneUnapproved => maintenance_service::prune_unapproved(state)
            .await
            .map(drop),
        ScheduledJob::DailyCleanup => maintenance_service::daily_cleanup(state).await,
    }
}

/// Ask for a snapshot write every `period`, whatever the day.
pub async fn run_snapshot_checkpoint(state: SharedState, period: StdDuration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        debug!("periodic snapshot checkpoint");
        state.request_flush();
    }
}

#[cfg(test)]
mod tests {
    use time::macros::{datetime, time};

    use super::*;

    fn schedule() -> Schedule {
        Schedule::from_config(&AppConfig::default())
    }

    #[test]
    fn checkpoints_are_sorted_by_time() {
        let times: Vec<Time> = schedule().checkpoints().iter().map(|c| c.at).collect();
        assert_eq!(
            times,
            vec![
                time!(12:00),
                time!(15:00),
                time!(16:00),
                time!(17:00),
                time!(18:00),
                time!(23:00)
            ]
        );
    }

    #[test]
    fn next_checkpoint_on_a_match_day() {
        // Sunday morning, local time.
        let (at, jobs) = schedule()
            .next_after(datetime!(2026-10-18 09:00 +2))
            .unwrap();
        assert_eq!(at, datetime!(2026-10-18 12:00 +2));
        assert_eq!(jobs, vec![ScheduledJob::Reminder]);

        let (at, jobs) = schedule()
            .next_after(datetime!(2026-10-18 16:00 +2))
            .unwrap();
        assert_eq!(at, datetime!(2026-10-18 17:00 +2));
        assert_eq!(jobs, vec![ScheduledJob::PruneUnapproved]);
    }

    #[test]
    fn skips_to_the_next_match_day() {
        // After Sunday's cleanup the next checkpoint is Wednesday's first reminder.
        let (at, jobs) = schedule()
            .next_after(datetime!(2026-10-18 23:30 +2))
            .unwrap();
        assert_eq!(at, datetime!(2026-10-21 12:00 +2));
        assert_eq!(jobs, vec![ScheduledJob::Reminder]);
    }

    #[test]
    fn utc_input_is_read_in_local_time() {
        // 21:30 UTC Sunday is 23:30 local, past the cleanup.
        let (at, _) = schedule()
            .next_after(datetime!(2026-10-18 21:30 UTC))
            .unwrap();
        assert_eq!(at, datetime!(2026-10-21 12:00 +2));
    }

    #[test]
    fn checkpoints_sharing_a_time_all_fire() {
        let calendar = EventCalendar::default();
        let schedule = Schedule::new(
            calendar,
            vec![
                Checkpoint {
                    at: time!(16:00),
                    job: ScheduledJob::FinalReminder,
                },
                Checkpoint {
                    at: time!(16:00),
                    job: ScheduledJob::PruneUnapproved,
                },
            ],
        );

        // Step through the week the way `run` does.
        let mut cursor = datetime!(2026-10-18 09:00 +2);
        let mut fired = Vec::new();
        for _ in 0..2 {
            let (at, jobs) = schedule.next_after(cursor).unwrap();
            fired.push((at, jobs));
            cursor = at;
        }

        assert_eq!(
            fired,
            vec![
                (
                    datetime!(2026-10-18 16:00 +2),
                    vec![ScheduledJob::FinalReminder, ScheduledJob::PruneUnapproved]
                ),
                (
                    datetime!(2026-10-21 16:00 +2),
                    vec![ScheduledJob::FinalReminder, ScheduledJob::PruneUnapproved]
                ),
            ]
        );
    }

    #[test]
    fn cleanup_sharing_the_last_prune_time_still_runs() {
        let mut config = AppConfig::default();
        config.prune_checks.push(config.calendar.cleanup());
        let schedule = Schedule::from_config(&config);

        let (_, jobs) = schedule
            .next_after(datetime!(2026-10-18 22:00 +2))
            .unwrap();
        assert_eq!(
            jobs,
            vec![ScheduledJob::PruneUnapproved, ScheduledJob::DailyCleanup]
        );
    }

    #[test]
    fn empty_calendar_never_fires() {
        let calendar = EventCalendar::new(Vec::new(), time::UtcOffset::UTC, time!(16:00), time!(23:00));
        let schedule = Schedule::new(
            calendar,
            vec![Checkpoint {
                at: time!(12:00),
                job: ScheduledJob::Reminder,
            }],
        );
        assert_eq!(schedule.next_after(datetime!(2026-10-18 09:00 UTC)), None);
    }
}
