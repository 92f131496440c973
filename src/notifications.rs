//! In-process reminder timers and notification delivery.
//!
//! Timers only carry the task id. When one fires, the notification content
//! is rebuilt from the repository so that edits made after scheduling show
//! up, and tasks that were completed or deleted in the meantime stay silent.

use std::{
    collections::HashMap,
    fmt,
    str::FromStr,
    sync::{Mutex, MutexGuard, PoisonError},
};

use jiff::tz::TimeZone;
use thiserror::Error;
use tokio::{runtime::Handle, sync::mpsc, task::JoinHandle};
use uuid::Uuid;

use crate::{
    reminders::{ReminderRequest, ReminderScheduler, SchedulerError},
    repository::Repository,
    storage::Storage,
};

pub const LINK_SCHEME: &str = "todolist";

/// Payload emitted when a reminder timer elapses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderFired {
    pub task_id: Uuid,
}

/// Reminder timers as tokio tasks, one per task id
pub struct TokioReminderScheduler {
    handle: Handle,
    timers: Mutex<HashMap<Uuid, JoinHandle<()>>>,
    fired_tx: mpsc::UnboundedSender<ReminderFired>,
    permission_granted: bool,
}

impl TokioReminderScheduler {
    /// Must be called from inside a tokio runtime. Fired reminders arrive on
    /// the returned receiver.
    pub fn new(
        permission_granted: bool,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ReminderFired>), SchedulerError> {
        let handle = Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            handle,
            timers: Mutex::new(HashMap::new()),
            fired_tx,
            permission_granted,
        };
        Ok((scheduler, fired_rx))
    }

    /// Number of timers that have not fired or been cancelled yet
    pub fn pending_count(&self) -> usize {
        self.lock()
            .values()
            .filter(|timer| !timer.is_finished())
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, JoinHandle<()>>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ReminderScheduler for TokioReminderScheduler {
    fn schedule(&self, request: ReminderRequest) -> Result<(), SchedulerError> {
        if !self.permission_granted {
            return Err(SchedulerError::PermissionDenied);
        }

        let fired_tx = self.fired_tx.clone();
        let task_id = request.task_id;
        let timer = self.handle.spawn(async move {
            tokio::time::sleep(request.delay).await;
            if fired_tx.send(ReminderFired { task_id }).is_err() {
                tracing::debug!(task_id = %task_id, "reminder fired with nobody listening");
            }
        });

        let mut timers = self.lock();
        timers.retain(|_, timer| !timer.is_finished());
        if let Some(previous) = timers.insert(task_id, timer) {
            previous.abort();
        }
        Ok(())
    }

    fn cancel(&self, task_id: Uuid) -> Result<(), SchedulerError> {
        if let Some(timer) = self.lock().remove(&task_id) {
            timer.abort();
        }
        Ok(())
    }

    fn cancel_all(&self) -> Result<(), SchedulerError> {
        for (_, timer) in self.lock().drain() {
            timer.abort();
        }
        Ok(())
    }
}

impl Drop for TokioReminderScheduler {
    fn drop(&mut self) {
        for (_, timer) in self.lock().drain() {
            timer.abort();
        }
    }
}

/// Route a notification tap opens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeepLink {
    EditTask(Uuid),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeepLinkError {
    #[error("Link '{0}' does not use the {LINK_SCHEME}:// scheme")]
    UnknownScheme(String),

    #[error("Link '{0}' does not point at anything")]
    UnknownRoute(String),

    #[error("Invalid task id '{0}' in link")]
    InvalidTaskId(String),
}

impl fmt::Display for DeepLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeepLink::EditTask(id) => write!(f, "{LINK_SCHEME}://tasks/{id}/edit"),
        }
    }
}

impl FromStr for DeepLink {
    type Err = DeepLinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let route = s
            .strip_prefix(LINK_SCHEME)
            .and_then(|rest| rest.strip_prefix("://"))
            .ok_or_else(|| DeepLinkError::UnknownScheme(s.to_string()))?;

        let segments: Vec<&str> = route.trim_end_matches('/').split('/').collect();
        match segments.as_slice() {
            ["tasks", id, "edit"] => Uuid::parse_str(id)
                .map(DeepLink::EditTask)
                .map_err(|_| DeepLinkError::InvalidTaskId(id.to_string())),
            _ => Err(DeepLinkError::UnknownRoute(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub task_id: Uuid,
    pub title: String,
    pub body: String,
    pub link: DeepLink,
}

/// Builds the notification for a fired reminder from the task's current
/// state. Missing and completed tasks produce nothing.
pub fn compose<S: Storage>(
    repository: &Repository<S>,
    task_id: Uuid,
    time_zone: &TimeZone,
) -> Option<Notification> {
    let task = repository.task(task_id)?;
    if task.is_completed {
        return None;
    }

    let due = task.due_at.to_zoned(time_zone.clone());
    let mut body = format!("Due {}", due.strftime("%a %b %d, %H:%M"));
    if let Some(description) = task.description.as_deref().filter(|d| !d.trim().is_empty()) {
        body.push('\n');
        body.push_str(description);
    }

    Some(Notification {
        task_id,
        title: task.title,
        body,
        link: DeepLink::EditTask(task_id),
    })
}

/// Turns fired reminders into notifications until the sending side closes
pub async fn deliver<S: Storage>(
    repository: &Repository<S>,
    fired_rx: &mut mpsc::UnboundedReceiver<ReminderFired>,
    time_zone: &TimeZone,
    mut present: impl FnMut(Notification),
) {
    while let Some(fired) = fired_rx.recv().await {
        match compose(repository, fired.task_id, time_zone) {
            Some(notification) => {
                tracing::info!(task_id = %fired.task_id, "delivering reminder");
                present(notification);
            }
            None => {
                tracing::debug!(task_id = %fired.task_id, "reminder skipped, task gone or completed");
            }
        }
    }
}
