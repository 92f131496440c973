//! Rebuilding scheduled reminders after the process (or device) restarts.

use jiff::Timestamp;

use crate::{
    reminders::{ReminderScheduler, sync_reminder},
    repository::Repository,
    storage::{Storage, StorageError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecoveryReport {
    /// Tasks whose reminder was accepted by the scheduler
    pub scheduled: usize,
    /// Tasks with nothing left to remind about, or whose reminder was refused
    pub skipped: usize,
}

/// Schedules a reminder for every pending task from a one-time read of the
/// store
pub fn reschedule_pending<S, R>(
    repository: &Repository<S>,
    scheduler: &R,
    now: Timestamp,
) -> RecoveryReport
where
    S: Storage,
    R: ReminderScheduler + ?Sized,
{
    let mut report = RecoveryReport::default();
    for task in repository.pending_tasks() {
        if sync_reminder(scheduler, &task, now).is_some() {
            report.scheduled += 1;
        } else {
            report.skipped += 1;
        }
    }

    tracing::info!(
        scheduled = report.scheduled,
        skipped = report.skipped,
        "pending reminders rescheduled"
    );
    report
}

/// Picks up changes other processes wrote to storage: reloads the store,
/// drops every timer and schedules the pending tasks again
pub fn rescan<S, R>(
    repository: &Repository<S>,
    scheduler: &R,
    now: Timestamp,
) -> Result<RecoveryReport, StorageError>
where
    S: Storage,
    R: ReminderScheduler + ?Sized,
{
    repository.reload()?;
    if let Err(e) = scheduler.cancel_all() {
        tracing::warn!(error = %e, "could not clear scheduled reminders before rescan");
    }
    Ok(reschedule_pending(repository, scheduler, now))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use jiff::ToSpan;
    use uuid::Uuid;

    use super::*;
    use crate::{
        models::{store::Store, task::Task},
        reminders::{ReminderRequest, SchedulerError},
        storage::memory::MemoryStorage,
    };

    #[derive(Default)]
    struct Recorder {
        scheduled: Mutex<Vec<Uuid>>,
        cleared: Mutex<usize>,
    }

    impl ReminderScheduler for Recorder {
        fn schedule(&self, request: ReminderRequest) -> Result<(), SchedulerError> {
            self.scheduled.lock().unwrap().push(request.task_id);
            Ok(())
        }

        fn cancel(&self, _task_id: Uuid) -> Result<(), SchedulerError> {
            Ok(())
        }

        fn cancel_all(&self) -> Result<(), SchedulerError> {
            *self.cleared.lock().unwrap() += 1;
            self.scheduled.lock().unwrap().clear();
            Ok(())
        }
    }

    fn store_with(tasks: Vec<Task>) -> Store {
        let mut store = Store::seeded(Timestamp::now());
        for task in tasks {
            store.upsert_task(task);
        }
        store
    }

    #[test]
    fn test_only_future_pending_reminders_are_rescheduled() {
        let now = Timestamp::now();
        let future = Task::new("Future", now.checked_add(3.hours()).unwrap());
        let past = Task::new("Past", now.checked_sub(3.hours()).unwrap());
        let done = Task {
            is_completed: true,
            ..Task::new("Done", now.checked_add(3.hours()).unwrap())
        };
        let storage = MemoryStorage::with_store(store_with(vec![future.clone(), past, done]));
        let repository = Repository::open(storage).unwrap();
        let recorder = Recorder::default();

        let report = reschedule_pending(&repository, &recorder, now);

        assert_eq!(report, RecoveryReport { scheduled: 1, skipped: 1 });
        assert_eq!(*recorder.scheduled.lock().unwrap(), vec![future.id]);
    }

    #[test]
    fn test_rescan_sees_tasks_written_elsewhere() {
        let now = Timestamp::now();
        let repository = Repository::open(MemoryStorage::new()).unwrap();
        let recorder = Recorder::default();
        assert_eq!(reschedule_pending(&repository, &recorder, now).scheduled, 0);

        let added = Task::new("Added by another process", now.checked_add(2.hours()).unwrap());
        repository
            .storage()
            .save(&store_with(vec![added.clone()]))
            .unwrap();

        let report = rescan(&repository, &recorder, now).unwrap();

        assert_eq!(report.scheduled, 1);
        assert_eq!(*recorder.cleared.lock().unwrap(), 1);
        assert_eq!(*recorder.scheduled.lock().unwrap(), vec![added.id]);
        assert!(repository.task(added.id).is_some());
    }
}
