use std::sync::{
    Mutex, PoisonError,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use jiff::Timestamp;

use crate::{
    models::store::Store,
    storage::{Storage, StorageError},
};

/// Keeps the store in process memory. Used for ephemeral sessions and tests;
/// saves can be made to fail to exercise persistence error paths.
#[derive(Default)]
pub struct MemoryStorage {
    saved: Mutex<Option<Store>>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(store: Store) -> Self {
        Self {
            saved: Mutex::new(Some(store)),
            ..Self::default()
        }
    }

    /// Number of successful saves so far
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Last saved snapshot
    pub fn saved(&self) -> Option<Store> {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> Result<Store, StorageError> {
        Ok(self
            .saved()
            .unwrap_or_else(|| Store::seeded(Timestamp::now())))
    }

    fn save(&self, store: &Store) -> Result<(), StorageError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(String::from(
                "memory storage is set to fail",
            )));
        }

        *self.saved.lock().unwrap_or_else(PoisonError::into_inner) = Some(store.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
