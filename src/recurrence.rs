//! Completion toggling and recurrence roll-forward.

use jiff::{Timestamp, ToSpan, tz::TimeZone};

use crate::models::task::{RecurrencePeriod, Task};

/// What toggling a task's completion did to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// A one-off task (or a recurring one with no period) is now done
    Completed(Task),
    /// A completed task went back to pending
    Reopened(Task),
    /// A recurring task moved to its next occurrence and stays pending
    Advanced { task: Task, previous_due_at: Timestamp },
    /// The next occurrence would fall after the recurrence end date
    RecurrenceEnded(Task),
}

impl ToggleOutcome {
    pub fn task(&self) -> &Task {
        match self {
            ToggleOutcome::Completed(task)
            | ToggleOutcome::Reopened(task)
            | ToggleOutcome::RecurrenceEnded(task)
            | ToggleOutcome::Advanced { task, .. } => task,
        }
    }
}

/// Advances `due_at` by one period in `time_zone`. Months are calendar months
/// and clamp to the last day of a shorter month (Jan 31 → Feb 28/29).
pub fn next_occurrence(
    due_at: Timestamp,
    period: RecurrencePeriod,
    time_zone: &TimeZone,
) -> Result<Option<Timestamp>, jiff::Error> {
    let step = match period {
        RecurrencePeriod::None => return Ok(None),
        RecurrencePeriod::Daily => 1.day(),
        RecurrencePeriod::Weekly => 1.week(),
        RecurrencePeriod::Monthly => 1.month(),
    };

    let next = due_at.to_zoned(time_zone.clone()).checked_add(step)?;
    Ok(Some(next.timestamp()))
}

/// Computes the toggled version of `task` without touching any store
pub fn toggle(
    task: &Task,
    now: Timestamp,
    time_zone: &TimeZone,
) -> Result<ToggleOutcome, jiff::Error> {
    let mut toggled = task.clone();
    toggled.touch(now);

    if !task.is_completed && task.recurs() {
        if let Some(next_due) = next_occurrence(task.due_at, task.recurrence_period, time_zone)? {
            let past_end = task.recurrence_end.is_some_and(|end| next_due > end);
            if past_end {
                toggled.is_completed = true;
                return Ok(ToggleOutcome::RecurrenceEnded(toggled));
            }

            toggled.due_at = next_due;
            return Ok(ToggleOutcome::Advanced {
                task: toggled,
                previous_due_at: task.due_at,
            });
        }
    }

    toggled.is_completed = !task.is_completed;
    if toggled.is_completed {
        Ok(ToggleOutcome::Completed(toggled))
    } else {
        Ok(ToggleOutcome::Reopened(toggled))
    }
}
