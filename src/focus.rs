//! Focus mode countdown.
//!
//! The timer counts whole seconds towards a target while running. Progress
//! is published on a watch channel; subscribers get the current snapshot
//! first and every change after it. The ticking task exists only while the
//! timer runs, and pausing, stopping, resetting or dropping the timer ends
//! it. Nothing survives the process.

use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tokio::{
    runtime::Handle,
    sync::watch,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tokio_stream::wrappers::WatchStream;
use uuid::Uuid;

use crate::{
    models::task::Task,
    repository::Repository,
    services::tasks::{AddFocusTimeError, add_focus_time},
    storage::Storage,
};

/// Session length when none is picked, 25 minutes
pub const DEFAULT_FOCUS_SECONDS: u64 = 25 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusState {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusSnapshot {
    pub state: FocusState,
    pub elapsed_seconds: u64,
    pub target_seconds: u64,
}

impl FocusSnapshot {
    pub fn remaining_seconds(&self) -> u64 {
        self.target_seconds.saturating_sub(self.elapsed_seconds)
    }

    /// Share of the target already done, in `0.0..=1.0`
    pub fn progress(&self) -> f64 {
        if self.target_seconds == 0 {
            return 1.0;
        }
        (self.elapsed_seconds as f64 / self.target_seconds as f64).min(1.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FocusTimerError {
    #[error("No async runtime is available to run the focus timer")]
    NoRuntime,
}

pub struct FocusTimer {
    snapshot_tx: Arc<watch::Sender<FocusSnapshot>>,
    tick: Option<JoinHandle<()>>,
}

impl FocusTimer {
    pub fn new(target: Duration) -> Self {
        let (snapshot_tx, _) = watch::channel(FocusSnapshot {
            state: FocusState::Idle,
            elapsed_seconds: 0,
            target_seconds: target.as_secs(),
        });
        Self {
            snapshot_tx: Arc::new(snapshot_tx),
            tick: None,
        }
    }

    pub fn snapshot(&self) -> FocusSnapshot {
        *self.snapshot_tx.borrow()
    }

    pub fn subscribe(&self) -> WatchStream<FocusSnapshot> {
        WatchStream::new(self.snapshot_tx.subscribe())
    }

    /// Starts from idle or resumes from paused. Running and completed
    /// timers are left alone.
    pub fn start(&mut self) -> Result<(), FocusTimerError> {
        let snapshot = self.snapshot();
        if !matches!(snapshot.state, FocusState::Idle | FocusState::Paused) {
            return Ok(());
        }
        if snapshot.remaining_seconds() == 0 {
            self.snapshot_tx
                .send_modify(|s| s.state = FocusState::Completed);
            return Ok(());
        }

        let handle = Handle::try_current().map_err(|_| FocusTimerError::NoRuntime)?;
        self.snapshot_tx.send_modify(|s| s.state = FocusState::Running);

        let snapshot_tx = Arc::clone(&self.snapshot_tx);
        self.tick = Some(handle.spawn(async move {
            let period = Duration::from_secs(1);
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let mut finished = false;
                snapshot_tx.send_modify(|s| {
                    s.elapsed_seconds += 1;
                    if s.elapsed_seconds >= s.target_seconds {
                        s.state = FocusState::Completed;
                        finished = true;
                    }
                });
                if finished {
                    tracing::debug!("focus session reached its target");
                    break;
                }
            }
        }));
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), FocusTimerError> {
        self.start()
    }

    pub fn pause(&mut self) {
        self.abort_tick();
        if self.snapshot().state == FocusState::Running {
            self.snapshot_tx.send_modify(|s| s.state = FocusState::Paused);
        }
    }

    /// Back to idle with nothing elapsed
    pub fn reset(&mut self) {
        self.abort_tick();
        self.snapshot_tx.send_modify(|s| {
            s.state = FocusState::Idle;
            s.elapsed_seconds = 0;
        });
    }

    /// Ends the session and returns how many seconds were focused
    pub fn stop(&mut self) -> u64 {
        let elapsed = self.snapshot().elapsed_seconds;
        self.reset();
        elapsed
    }

    /// Ends the session and credits the focused seconds to `task_id`
    pub fn stop_and_save<S: Storage>(
        &mut self,
        repository: &Repository<S>,
        task_id: Uuid,
    ) -> Result<Option<Task>, AddFocusTimeError> {
        let elapsed = self.stop();
        add_focus_time(repository, task_id, elapsed)
    }

    fn abort_tick(&mut self) {
        if let Some(tick) = self.tick.take() {
            tick.abort();
        }
    }
}

impl Default for FocusTimer {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_FOCUS_SECONDS))
    }
}

impl Drop for FocusTimer {
    fn drop(&mut self) {
        self.abort_tick();
    }
}
