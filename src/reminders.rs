//! Reminder fire-time rules and the scheduler seam.
//!
//! A reminder fires `reminder_minutes_before` ahead of a timed task's due
//! instant. Scheduling is keyed by task id: a new request for the same task
//! replaces the previous one, and cancelling an unknown key is a no-op.
//! Scheduler failures are logged and never fail the operation that asked
//! for the reminder.

use std::time::Duration;

use jiff::{SignedDuration, Timestamp};
use thiserror::Error;
use uuid::Uuid;

use crate::models::task::Task;

/// Reminders closer than this are flagged as urgent
pub const URGENT_WINDOW: SignedDuration = SignedDuration::from_mins(15);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderRequest {
    pub task_id: Uuid,
    pub fire_at: Timestamp,
    /// Time left until `fire_at`, measured when the request was planned
    pub delay: Duration,
    /// Advisory: the reminder fires within [`URGENT_WINDOW`]
    pub urgent: bool,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Notification permission has not been granted")]
    PermissionDenied,

    #[error("No async runtime is available to run reminder timers")]
    NoRuntime,
}

pub trait ReminderScheduler: Send + Sync {
    /// Schedules `request`, replacing any reminder already keyed on its task
    fn schedule(&self, request: ReminderRequest) -> Result<(), SchedulerError>;

    fn cancel(&self, task_id: Uuid) -> Result<(), SchedulerError>;

    fn cancel_all(&self) -> Result<(), SchedulerError>;
}

/// `due_at` minus the task's lead time
pub fn fire_time(task: &Task) -> Option<Timestamp> {
    let lead = SignedDuration::from_mins(i64::from(task.reminder_minutes_before));
    task.due_at.checked_sub(lead).ok()
}

/// Works out the reminder a task needs right now, if any. Completed tasks,
/// date-only tasks and reminders whose fire time is not in the future get
/// none.
pub fn plan_reminder(task: &Task, now: Timestamp) -> Option<ReminderRequest> {
    if task.is_completed || !task.has_time {
        return None;
    }

    let fire_at = fire_time(task)?;
    if fire_at <= now {
        return None;
    }

    let remaining = now.duration_until(fire_at);
    let delay = Duration::try_from(remaining).ok()?;

    Some(ReminderRequest {
        task_id: task.id,
        fire_at,
        delay,
        urgent: remaining < URGENT_WINDOW,
    })
}

/// Brings the scheduler in line with `task`: schedules its reminder when one
/// is due, otherwise cancels whatever was scheduled under its key. Returns
/// the request that was accepted by the scheduler.
pub fn sync_reminder<R>(scheduler: &R, task: &Task, now: Timestamp) -> Option<ReminderRequest>
where
    R: ReminderScheduler + ?Sized,
{
    match plan_reminder(task, now) {
        Some(request) => match scheduler.schedule(request.clone()) {
            Ok(()) => {
                tracing::debug!(
                    task_id = %task.id,
                    fire_at = %request.fire_at,
                    urgent = request.urgent,
                    "reminder scheduled"
                );
                Some(request)
            }
            Err(e) => {
                tracing::warn!(task_id = %task.id, error = %e, "could not schedule reminder");
                None
            }
        },
        None => {
            cancel_reminder(scheduler, task.id);
            None
        }
    }
}

/// Best-effort cancel; failures are only logged
pub fn cancel_reminder<R>(scheduler: &R, task_id: Uuid)
where
    R: ReminderScheduler + ?Sized,
{
    if let Err(e) = scheduler.cancel(task_id) {
        tracing::warn!(task_id = %task_id, error = %e, "could not cancel reminder");
    }
}

/// Scheduler for short-lived processes that exit before any timer could
/// fire. Requests are logged and left for the long-running reminder process,
/// which replays every pending task on its next rescan.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedScheduler;

impl ReminderScheduler for DetachedScheduler {
    fn schedule(&self, request: ReminderRequest) -> Result<(), SchedulerError> {
        tracing::info!(
            task_id = %request.task_id,
            fire_at = %request.fire_at,
            "reminder handed over to the reminder daemon"
        );
        Ok(())
    }

    fn cancel(&self, task_id: Uuid) -> Result<(), SchedulerError> {
        tracing::debug!(task_id = %task_id, "reminder cancel left to the reminder daemon");
        Ok(())
    }

    fn cancel_all(&self) -> Result<(), SchedulerError> {
        Ok(())
    }
}
