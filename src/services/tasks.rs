use std::cmp::Reverse;

use jiff::{Timestamp, civil::Date, tz::TimeZone};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::task::{Task, TaskValidationError},
    recurrence::{self, ToggleOutcome},
    reminders::{ReminderRequest, ReminderScheduler, cancel_reminder, sync_reminder},
    repository::Repository,
    storage::{Storage, StorageError},
};

#[derive(Debug, Error)]
pub enum UpsertTaskError {
    #[error("Invalid task: {0}")]
    Validation(#[from] TaskValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertTaskOutcome {
    pub task: Task,
    /// Reminder accepted by the scheduler, if one was due
    pub reminder: Option<ReminderRequest>,
}

/// Validates and saves `task` (insert or replace by id), then brings its
/// reminder in line with what was saved
pub fn upsert_task<S, R>(
    repository: &Repository<S>,
    scheduler: &R,
    mut task: Task,
) -> Result<UpsertTaskOutcome, UpsertTaskError>
where
    S: Storage,
    R: ReminderScheduler + ?Sized,
{
    task.validate()?;

    let now = Timestamp::now();
    task.touch(now);

    repository.update(|store| {
        store.upsert_task(task.clone());
        Ok::<_, UpsertTaskError>(())
    })?;
    tracing::info!(task_id = %task.id, "task saved");

    let reminder = sync_reminder(scheduler, &task, now);
    Ok(UpsertTaskOutcome { task, reminder })
}

#[derive(Debug, Error)]
pub enum ToggleTaskError {
    #[error("Could not compute the next occurrence: {0}")]
    Recurrence(#[from] jiff::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct ToggleTaskParameters {
    pub task_id: Uuid,
    /// Zone in which day, week and month steps are taken
    pub time_zone: TimeZone,
}

/// Flips a task's completion, rolling recurring tasks forward instead of
/// completing them. An unknown id is a no-op and yields `None`.
pub fn toggle_task_completion<S, R>(
    repository: &Repository<S>,
    scheduler: &R,
    parameters: ToggleTaskParameters,
) -> Result<Option<ToggleOutcome>, ToggleTaskError>
where
    S: Storage,
    R: ReminderScheduler + ?Sized,
{
    if repository.task(parameters.task_id).is_none() {
        return Ok(None);
    }

    let now = Timestamp::now();
    let outcome = repository.update(|store| {
        let Some(task) = store.get_task(parameters.task_id) else {
            return Ok(None);
        };
        let outcome = recurrence::toggle(task, now, &parameters.time_zone)?;
        store.upsert_task(outcome.task().clone());
        Ok::<_, ToggleTaskError>(Some(outcome))
    })?;

    let Some(outcome) = outcome else {
        return Ok(None);
    };

    match &outcome {
        ToggleOutcome::Completed(task) | ToggleOutcome::RecurrenceEnded(task) => {
            tracing::info!(task_id = %task.id, "task completed");
            cancel_reminder(scheduler, task.id);
        }
        ToggleOutcome::Reopened(task) => {
            tracing::info!(task_id = %task.id, "task reopened");
            sync_reminder(scheduler, task, now);
        }
        ToggleOutcome::Advanced {
            task,
            previous_due_at,
        } => {
            tracing::info!(
                task_id = %task.id,
                from = %previous_due_at,
                to = %task.due_at,
                "recurring task moved to its next occurrence"
            );
            sync_reminder(scheduler, task, now);
        }
    }

    Ok(Some(outcome))
}

#[derive(Debug, Error)]
pub enum DeleteTaskError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Removes the task and cancels its reminder. An unknown id yields `None`.
pub fn delete_task<S, R>(
    repository: &Repository<S>,
    scheduler: &R,
    task_id: Uuid,
) -> Result<Option<Task>, DeleteTaskError>
where
    S: Storage,
    R: ReminderScheduler + ?Sized,
{
    let removed = if repository.task(task_id).is_some() {
        repository.update(|store| Ok::<_, DeleteTaskError>(store.remove_task(task_id)))?
    } else {
        None
    };

    cancel_reminder(scheduler, task_id);
    if let Some(task) = &removed {
        tracing::info!(task_id = %task.id, "task deleted");
    }
    Ok(removed)
}

/// Removes every completed task, returning what was removed
pub fn delete_completed_tasks<S, R>(
    repository: &Repository<S>,
    scheduler: &R,
) -> Result<Vec<Task>, DeleteTaskError>
where
    S: Storage,
    R: ReminderScheduler + ?Sized,
{
    let removed = repository.update(|store| {
        let ids: Vec<Uuid> = store.completed_tasks().map(|t| t.id).collect();
        let removed: Vec<Task> = ids.into_iter().filter_map(|id| store.remove_task(id)).collect();
        Ok::<_, DeleteTaskError>(removed)
    })?;

    for task in &removed {
        cancel_reminder(scheduler, task.id);
    }
    tracing::info!(count = removed.len(), "completed tasks cleared");
    Ok(removed)
}

#[derive(Debug, Error)]
pub enum AddFocusTimeError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Adds `seconds` to the task's focus total. An unknown id yields `None`.
pub fn add_focus_time<S: Storage>(
    repository: &Repository<S>,
    task_id: Uuid,
    seconds: u64,
) -> Result<Option<Task>, AddFocusTimeError> {
    if seconds == 0 || repository.task(task_id).is_none() {
        return Ok(repository.task(task_id));
    }

    let now = Timestamp::now();
    let updated = repository.update(|store| {
        let Some(task) = store.get_task_mut(task_id) else {
            return Ok(None);
        };
        task.focus_time_seconds = task.focus_time_seconds.saturating_add(seconds);
        task.touch(now);
        Ok::<_, AddFocusTimeError>(Some(task.clone()))
    })?;

    if let Some(task) = &updated {
        tracing::info!(task_id = %task.id, total = task.focus_time_seconds, "focus time recorded");
    }
    Ok(updated)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FindTaskError {
    #[error("Task '{0}' not found")]
    TaskNotFound(String),

    #[error("Task name is ambiguous. Multiple tasks found: {}", .0.join(", "))]
    AmbiguousTaskName(Vec<String>),
}

/// Looks a task up by id, id prefix, or a case-insensitive piece of its title
pub fn find_task<S: Storage>(
    repository: &Repository<S>,
    id_or_fuzzy_title: &str,
) -> Result<Task, FindTaskError> {
    let query = id_or_fuzzy_title.trim();
    if query.is_empty() {
        return Err(FindTaskError::TaskNotFound(id_or_fuzzy_title.to_string()));
    }

    if let Ok(id) = Uuid::parse_str(query) {
        return repository
            .task(id)
            .ok_or_else(|| FindTaskError::TaskNotFound(query.to_string()));
    }

    let tasks = repository.tasks();
    let lowered = query.to_lowercase();

    let mut by_id_prefix: Vec<&Task> = if query.len() >= 4 {
        tasks
            .iter()
            .filter(|t| t.id.to_string().starts_with(&lowered))
            .collect()
    } else {
        Vec::new()
    };
    if by_id_prefix.len() == 1 {
        return Ok(by_id_prefix.remove(0).clone());
    }

    let matching_tasks: Vec<&Task> = tasks
        .iter()
        .filter(|t| t.title.to_lowercase().contains(&lowered))
        .collect();

    match matching_tasks.len() {
        0 => Err(FindTaskError::TaskNotFound(query.to_string())),
        1 => Ok(matching_tasks[0].clone()),
        _ => {
            // A single pending match wins over completed namesakes
            let pending: Vec<&&Task> = matching_tasks.iter().filter(|t| !t.is_completed).collect();
            if pending.len() == 1 {
                return Ok((*pending[0]).clone());
            }
            let titles: Vec<String> = matching_tasks.iter().map(|t| t.title.clone()).collect();
            Err(FindTaskError::AmbiguousTaskName(titles))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskFilter {
    #[default]
    All,
    Pending,
    Completed,
}

#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
    pub filter: TaskFilter,
    pub category_id: Option<String>,
}

/// Tasks matching `query`, highest priority first, then soonest due
pub fn list_tasks<S: Storage>(repository: &Repository<S>, query: &TaskQuery) -> Vec<Task> {
    let mut tasks: Vec<Task> = repository
        .tasks()
        .into_iter()
        .filter(|t| match query.filter {
            TaskFilter::All => true,
            TaskFilter::Pending => !t.is_completed,
            TaskFilter::Completed => t.is_completed,
        })
        .filter(|t| match &query.category_id {
            Some(category_id) => t.category_id.as_ref() == Some(category_id),
            None => true,
        })
        .collect();

    tasks.sort_by_key(|t| (Reverse(t.priority), t.due_at, t.id));
    tasks
}

/// Pending tasks split around the day `today`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskGroups {
    /// Due before today, most recent first
    pub previous: Vec<Task>,
    pub today: Vec<Task>,
    /// Due after today, soonest first
    pub future: Vec<Task>,
}

impl TaskGroups {
    pub fn len(&self) -> usize {
        self.previous.len() + self.today.len() + self.future.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn group_pending<S: Storage>(
    repository: &Repository<S>,
    today: Date,
    time_zone: &TimeZone,
) -> TaskGroups {
    let mut groups = TaskGroups::default();
    for task in repository.pending_tasks() {
        let due_date = time_zone.to_datetime(task.due_at).date();
        if due_date < today {
            groups.previous.push(task);
        } else if due_date == today {
            groups.today.push(task);
        } else {
            groups.future.push(task);
        }
    }

    groups.previous.sort_by_key(|t| Reverse(t.due_at));
    groups
}

/// Tasks marked done during `today`
pub fn completed_today<S: Storage>(
    repository: &Repository<S>,
    today: Date,
    time_zone: &TimeZone,
) -> Vec<Task> {
    let mut tasks: Vec<Task> = repository.read(|store| {
        store
            .completed_tasks()
            .filter(|t| time_zone.to_datetime(t.updated_at).date() == today)
            .cloned()
            .collect()
    });
    tasks.sort_by_key(|t| Reverse(t.updated_at));
    tasks
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use jiff::{ToSpan, civil::date};

    use super::*;
    use crate::{
        models::task::{Priority, PriorityIcon, RecurrencePeriod},
        reminders::SchedulerError,
        storage::memory::MemoryStorage,
    };

    #[derive(Default)]
    struct Recorder {
        scheduled: Mutex<Vec<ReminderRequest>>,
        cancelled: Mutex<Vec<Uuid>>,
    }

    impl ReminderScheduler for Recorder {
        fn schedule(&self, request: ReminderRequest) -> Result<(), SchedulerError> {
            self.scheduled.lock().unwrap().push(request);
            Ok(())
        }

        fn cancel(&self, task_id: Uuid) -> Result<(), SchedulerError> {
            self.cancelled.lock().unwrap().push(task_id);
            Ok(())
        }

        fn cancel_all(&self) -> Result<(), SchedulerError> {
            Ok(())
        }
    }

    struct Denied;

    impl ReminderScheduler for Denied {
        fn schedule(&self, _: ReminderRequest) -> Result<(), SchedulerError> {
            Err(SchedulerError::PermissionDenied)
        }

        fn cancel(&self, _: Uuid) -> Result<(), SchedulerError> {
            Err(SchedulerError::PermissionDenied)
        }

        fn cancel_all(&self) -> Result<(), SchedulerError> {
            Err(SchedulerError::PermissionDenied)
        }
    }

    fn repository() -> Repository<MemoryStorage> {
        Repository::open(MemoryStorage::new()).unwrap()
    }

    fn in_hours(hours: i64) -> Timestamp {
        Timestamp::now().checked_add(hours.hours()).unwrap()
    }

    #[test]
    fn test_upsert_schedules_reminder_for_future_task() {
        let repository = repository();
        let recorder = Recorder::default();
        let task = Task::new("Submit timesheet", in_hours(3));

        let outcome = upsert_task(&repository, &recorder, task.clone()).unwrap();

        let reminder = outcome.reminder.unwrap();
        assert_eq!(reminder.task_id, task.id);
        assert_eq!(
            task.due_at.as_millisecond() - reminder.fire_at.as_millisecond(),
            1_800_000
        );
        assert_eq!(recorder.scheduled.lock().unwrap().len(), 1);
        assert!(repository.task(task.id).is_some());
    }

    #[test]
    fn test_blank_title_is_neither_saved_nor_scheduled() {
        let repository = repository();
        let recorder = Recorder::default();

        let result = upsert_task(&repository, &recorder, Task::new("  ", in_hours(3)));

        assert!(matches!(
            result,
            Err(UpsertTaskError::Validation(TaskValidationError::BlankTitle))
        ));
        assert_eq!(repository.storage().save_count(), 0);
        assert!(recorder.scheduled.lock().unwrap().is_empty());
    }

    #[test]
    fn test_upsert_with_past_fire_time_cancels_old_reminder() {
        let repository = repository();
        let recorder = Recorder::default();
        let task = Task::new("Already late", in_hours(-1));

        let outcome = upsert_task(&repository, &recorder, task.clone()).unwrap();

        assert!(outcome.reminder.is_none());
        assert_eq!(*recorder.cancelled.lock().unwrap(), vec![task.id]);
    }

    #[test]
    fn test_denied_notifications_still_save_the_task() {
        let repository = repository();
        let task = Task::new("Call the bank", in_hours(3));

        let outcome = upsert_task(&repository, &Denied, task.clone()).unwrap();

        assert!(outcome.reminder.is_none());
        assert_eq!(outcome.task.id, task.id);
        assert_eq!(repository.task(task.id).unwrap().title, "Call the bank");
        assert_eq!(repository.storage().save_count(), 1);
    }

    #[test]
    fn test_storage_failure_is_reported() {
        let repository = repository();
        let recorder = Recorder::default();
        repository.storage().set_fail_saves(true);

        let result = upsert_task(&repository, &recorder, Task::new("Lost", in_hours(3)));

        assert!(matches!(result, Err(UpsertTaskError::Storage(_))));
        assert!(recorder.scheduled.lock().unwrap().is_empty());
    }

    #[test]
    fn test_toggle_unknown_task_is_noop() {
        let repository = repository();
        let recorder = Recorder::default();

        let outcome = toggle_task_completion(
            &repository,
            &recorder,
            ToggleTaskParameters {
                task_id: Uuid::new_v4(),
                time_zone: TimeZone::UTC,
            },
        )
        .unwrap();

        assert!(outcome.is_none());
        assert_eq!(repository.storage().save_count(), 0);
    }

    #[test]
    fn test_toggle_completion_cancels_and_reopen_reschedules() {
        let repository = repository();
        let recorder = Recorder::default();
        let task = Task::new("Book flights", in_hours(5));
        upsert_task(&repository, &recorder, task.clone()).unwrap();
        let parameters = || ToggleTaskParameters {
            task_id: task.id,
            time_zone: TimeZone::UTC,
        };

        let done = toggle_task_completion(&repository, &recorder, parameters())
            .unwrap()
            .unwrap();
        assert!(matches!(done, ToggleOutcome::Completed(_)));
        assert!(repository.task(task.id).unwrap().is_completed);
        assert_eq!(recorder.cancelled.lock().unwrap().last(), Some(&task.id));

        let reopened = toggle_task_completion(&repository, &recorder, parameters())
            .unwrap()
            .unwrap();
        assert!(matches!(reopened, ToggleOutcome::Reopened(_)));
        assert_eq!(recorder.scheduled.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_toggle_daily_task_advances_and_reschedules() {
        let repository = repository();
        let recorder = Recorder::default();
        let due = in_hours(2);
        let task = Task {
            is_recurring: true,
            recurrence_period: RecurrencePeriod::Daily,
            ..Task::new("Stretch", due)
        };
        upsert_task(&repository, &recorder, task.clone()).unwrap();

        let outcome = toggle_task_completion(
            &repository,
            &recorder,
            ToggleTaskParameters {
                task_id: task.id,
                time_zone: TimeZone::UTC,
            },
        )
        .unwrap()
        .unwrap();

        let stored = repository.task(task.id).unwrap();
        assert!(matches!(outcome, ToggleOutcome::Advanced { .. }));
        assert!(!stored.is_completed);
        assert_eq!(stored.due_at, due.checked_add(24.hours()).unwrap());
        let scheduled = recorder.scheduled.lock().unwrap();
        assert_eq!(scheduled.last().unwrap().task_id, task.id);
        assert!(scheduled.last().unwrap().fire_at > due);
    }

    #[test]
    fn test_delete_task_removes_and_cancels() {
        let repository = repository();
        let recorder = Recorder::default();
        let task = Task::new("Old errand", in_hours(4));
        upsert_task(&repository, &recorder, task.clone()).unwrap();

        let removed = delete_task(&repository, &recorder, task.id).unwrap();

        assert_eq!(removed.map(|t| t.id), Some(task.id));
        assert!(repository.task(task.id).is_none());
        assert_eq!(recorder.cancelled.lock().unwrap().last(), Some(&task.id));
        assert!(delete_task(&repository, &recorder, task.id).unwrap().is_none());
    }

    #[test]
    fn test_delete_completed_keeps_pending() {
        let repository = repository();
        let recorder = Recorder::default();
        let pending = Task::new("Still to do", in_hours(4));
        let done = Task {
            is_completed: true,
            ..Task::new("Done already", in_hours(4))
        };
        upsert_task(&repository, &recorder, pending.clone()).unwrap();
        upsert_task(&repository, &recorder, done.clone()).unwrap();

        let removed = delete_completed_tasks(&repository, &recorder).unwrap();

        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, done.id);
        assert!(repository.task(pending.id).is_some());
    }

    #[test]
    fn test_focus_time_accumulates() {
        let repository = repository();
        let recorder = Recorder::default();
        let task = Task::new("Deep work", in_hours(4));
        upsert_task(&repository, &recorder, task.clone()).unwrap();

        add_focus_time(&repository, task.id, 1500).unwrap();
        let updated = add_focus_time(&repository, task.id, 300).unwrap().unwrap();

        assert_eq!(updated.focus_time_seconds, 1800);
        assert!(add_focus_time(&repository, Uuid::new_v4(), 60).unwrap().is_none());
    }

    #[test]
    fn test_find_task_by_prefix_and_title() {
        let repository = repository();
        let recorder = Recorder::default();
        let rent = Task::new("Pay rent", in_hours(4));
        let water = Task::new("Pay water bill", in_hours(4));
        upsert_task(&repository, &recorder, rent.clone()).unwrap();
        upsert_task(&repository, &recorder, water.clone()).unwrap();

        assert_eq!(find_task(&repository, "RENT").unwrap().id, rent.id);
        assert_eq!(
            find_task(&repository, &rent.id.to_string()[..8]).unwrap().id,
            rent.id
        );
        assert!(matches!(
            find_task(&repository, "pay"),
            Err(FindTaskError::AmbiguousTaskName(_))
        ));
        assert!(matches!(
            find_task(&repository, "groceries"),
            Err(FindTaskError::TaskNotFound(_))
        ));
    }

    #[test]
    fn test_list_orders_by_priority_then_due() {
        let repository = repository();
        let recorder = Recorder::default();
        let low_soon = Task {
            priority: Priority::Low,
            priority_icon: PriorityIcon::Standard(Priority::Low),
            ..Task::new("Low soon", in_hours(1))
        };
        let high_late = Task {
            priority: Priority::High,
            ..Task::new("High late", in_hours(10))
        };
        let high_soon = Task {
            priority: Priority::High,
            category_id: Some(String::from("work")),
            ..Task::new("High soon", in_hours(2))
        };
        for task in [&low_soon, &high_late, &high_soon] {
            upsert_task(&repository, &recorder, task.clone()).unwrap();
        }

        let all = list_tasks(&repository, &TaskQuery::default());
        let titles: Vec<&str> = all.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["High soon", "High late", "Low soon"]);

        let work = list_tasks(
            &repository,
            &TaskQuery {
                filter: TaskFilter::Pending,
                category_id: Some(String::from("work")),
            },
        );
        assert_eq!(work.len(), 1);
        assert_eq!(work[0].id, high_soon.id);
    }

    #[test]
    fn test_grouping_around_today() {
        let repository = repository();
        let at = |d: Date, h: i8| d.at(h, 0, 0, 0).to_zoned(TimeZone::UTC).unwrap().timestamp();
        let today = date(2025, 9, 10);

        let tasks = [
            Task::new("Two days ago", at(date(2025, 9, 8), 9)),
            Task::new("Yesterday", at(date(2025, 9, 9), 9)),
            Task::new("This morning", at(today, 8)),
            Task::new("Tonight", at(today, 21)),
            Task::new("Next week", at(date(2025, 9, 17), 9)),
            Task {
                is_completed: true,
                ..Task::new("Done today", at(today, 7))
            },
        ];
        repository
            .update(|store| {
                for task in tasks {
                    store.upsert_task(task);
                }
                Ok::<_, StorageError>(())
            })
            .unwrap();

        let groups = group_pending(&repository, today, &TimeZone::UTC);
        let titles = |tasks: &[Task]| tasks.iter().map(|t| t.title.clone()).collect::<Vec<_>>();

        assert_eq!(titles(&groups.previous), vec!["Yesterday", "Two days ago"]);
        assert_eq!(titles(&groups.today), vec!["This morning", "Tonight"]);
        assert_eq!(titles(&groups.future), vec!["Next week"]);
        assert_eq!(groups.len(), 5);
    }
}
