//! Session-wide handle on the task store.
//!
//! A [`Repository`] is built once at start-up from a [`Storage`] and handed to
//! every consumer. Each mutation is applied to a copy of the store, persisted,
//! and only then made visible, so a failed save changes nothing. Consumers
//! that want live data subscribe to a watch channel: the stream yields the
//! current state first and every later state after it, and dropping the
//! stream unsubscribes.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio_stream::{Stream, StreamExt, wrappers::WatchStream};
use uuid::Uuid;

use crate::{
    models::{category::CategorySummary, store::Store, task::Task},
    storage::{Storage, StorageError},
};

pub struct Repository<S> {
    storage: S,
    store: Mutex<Store>,
    tasks_tx: watch::Sender<Vec<Task>>,
    categories_tx: watch::Sender<Vec<CategorySummary>>,
}

impl<S: Storage> Repository<S> {
    /// Loads the store from `storage`
    pub fn open(storage: S) -> Result<Self, StorageError> {
        let store = storage.load()?;
        Ok(Self::with_store(storage, store))
    }

    pub fn with_store(storage: S, store: Store) -> Self {
        let (tasks_tx, _) = watch::channel(task_list(&store));
        let (categories_tx, _) = watch::channel(store.category_summaries());
        Self {
            storage,
            store: Mutex::new(store),
            tasks_tx,
            categories_tx,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` against the current store
    pub fn read<R>(&self, f: impl FnOnce(&Store) -> R) -> R {
        f(&self.lock())
    }

    /// Applies `f` to a copy of the store and persists it. The copy replaces
    /// the live store and is published only when both `f` and the save
    /// succeed.
    pub fn update<R, E>(&self, f: impl FnOnce(&mut Store) -> Result<R, E>) -> Result<R, E>
    where
        E: From<StorageError>,
    {
        let mut guard = self.lock();
        let mut draft = guard.clone();
        let result = f(&mut draft)?;

        self.storage.save(&draft)?;
        *guard = draft;
        self.publish(&guard);

        Ok(result)
    }

    /// Re-reads the store from storage, replacing the in-memory copy
    pub fn reload(&self) -> Result<(), StorageError> {
        let fresh = self.storage.load()?;
        let mut guard = self.lock();
        *guard = fresh;
        self.publish(&guard);
        Ok(())
    }

    fn publish(&self, store: &Store) {
        self.tasks_tx.send_replace(task_list(store));
        self.categories_tx.send_replace(store.category_summaries());
    }

    pub fn task(&self, id: Uuid) -> Option<Task> {
        self.read(|store| store.get_task(id).cloned())
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.read(task_list)
    }

    /// One-time read of every task that isn't completed
    pub fn pending_tasks(&self) -> Vec<Task> {
        self.read(|store| {
            let mut pending: Vec<Task> = store.pending_tasks().cloned().collect();
            pending.sort_by_key(|t| (t.due_at, t.id));
            pending
        })
    }

    pub fn category_summaries(&self) -> Vec<CategorySummary> {
        self.read(Store::category_summaries)
    }

    /// Every task, ordered by due time
    pub fn subscribe_tasks(&self) -> WatchStream<Vec<Task>> {
        WatchStream::new(self.tasks_tx.subscribe())
    }

    pub fn subscribe_categories(&self) -> WatchStream<Vec<CategorySummary>> {
        WatchStream::new(self.categories_tx.subscribe())
    }

    /// Follows a single task; yields `None` once it is gone
    pub fn subscribe_task(&self, id: Uuid) -> impl Stream<Item = Option<Task>> + use<S> {
        self.subscribe_tasks()
            .map(move |tasks| tasks.into_iter().find(|t| t.id == id))
    }
}

fn task_list(store: &Store) -> Vec<Task> {
    let mut tasks: Vec<Task> = store.tasks.values().cloned().collect();
    tasks.sort_by_key(|t| (t.due_at, t.id));
    tasks
}
