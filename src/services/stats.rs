use jiff::{SignedDuration, Span, Timestamp, ToSpan, civil::Date, tz::TimeZone};

use crate::{models::task::Task, repository::Repository, storage::Storage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskCounts {
    pub completed: usize,
    pub pending: usize,
}

impl TaskCounts {
    pub fn total(&self) -> usize {
        self.completed + self.pending
    }
}

pub fn task_counts<S: Storage>(repository: &Repository<S>) -> TaskCounts {
    repository.read(|store| TaskCounts {
        completed: store.completed_tasks().count(),
        pending: store.pending_tasks().count(),
    })
}

/// Pending tasks due between `now` and `days` days from it
pub fn upcoming_tasks<S: Storage>(
    repository: &Repository<S>,
    now: Timestamp,
    days: i64,
) -> Vec<Task> {
    let Some(horizon) = days
        .checked_mul(24)
        .and_then(SignedDuration::try_from_hours)
        .and_then(|window| now.checked_add(window).ok())
    else {
        return Vec::new();
    };

    repository
        .pending_tasks()
        .into_iter()
        .filter(|t| t.due_at >= now && t.due_at <= horizon)
        .collect()
}

/// Completed tasks whose last change falls on `day`
pub fn completed_on<S: Storage>(repository: &Repository<S>, day: Date, time_zone: &TimeZone) -> usize {
    repository.read(|store| {
        store
            .completed_tasks()
            .filter(|t| time_zone.to_datetime(t.updated_at).date() == day)
            .count()
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayCompletion {
    pub date: Date,
    pub completed: usize,
}

/// Completions per day over one Sunday-to-Saturday week
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklyCompletion {
    /// `MM/dd-MM/dd`
    pub label: String,
    pub days: Vec<DayCompletion>,
}

impl WeeklyCompletion {
    pub fn total(&self) -> usize {
        self.days.iter().map(|d| d.completed).sum()
    }

    pub fn busiest(&self) -> usize {
        self.days.iter().map(|d| d.completed).max().unwrap_or(0)
    }
}

/// Histogram for the week containing `today`, shifted by `week_offset`
/// weeks (negative looks back)
pub fn weekly_completion<S: Storage>(
    repository: &Repository<S>,
    today: Date,
    week_offset: i64,
    time_zone: &TimeZone,
) -> Result<WeeklyCompletion, jiff::Error> {
    let since_sunday = i64::from(today.weekday().to_sunday_zero_offset());
    let start = today
        .checked_sub(since_sunday.days())?
        .checked_add(Span::new().try_days(week_offset.saturating_mul(7))?)?;
    let end = start.checked_add(6.days())?;

    let completed_dates: Vec<Date> = repository.read(|store| {
        store
            .completed_tasks()
            .map(|t| time_zone.to_datetime(t.updated_at).date())
            .filter(|d| *d >= start && *d <= end)
            .collect()
    });

    let mut days = Vec::with_capacity(7);
    let mut date = start;
    for _ in 0..7 {
        days.push(DayCompletion {
            date,
            completed: completed_dates.iter().filter(|d| **d == date).count(),
        });
        date = date.tomorrow()?;
    }

    Ok(WeeklyCompletion {
        label: format!("{}-{}", start.strftime("%m/%d"), end.strftime("%m/%d")),
        days,
    })
}
