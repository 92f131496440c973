use std::collections::HashMap;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    category::{Category, CategorySummary, seed_categories},
    task::Task,
};

/// Current schema version
pub const CURRENT_VERSION: u32 = 3;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Store {
    pub version: u32,
    pub tasks: HashMap<Uuid, Task>,
    pub categories: HashMap<String, Category>,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            tasks: HashMap::new(),
            categories: HashMap::new(),
        }
    }
}

impl Store {
    /// A brand new store holding only the default categories
    pub fn seeded(now: Timestamp) -> Self {
        let mut store = Store::default();
        store.seed_missing_categories(now);
        store
    }

    /// Inserts any default category that is absent, never overwriting one
    /// that exists. Returns how many were added.
    pub fn seed_missing_categories(&mut self, now: Timestamp) -> usize {
        let mut added = 0;
        for category in seed_categories(now) {
            if !self.categories.contains_key(&category.id) {
                self.categories.insert(category.id.clone(), category);
                added += 1;
            }
        }
        added
    }

    pub fn get_task(&self, id: Uuid) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub fn get_task_mut(&mut self, id: Uuid) -> Option<&mut Task> {
        self.tasks.get_mut(&id)
    }

    /// Insert-or-replace keyed by the task id
    pub fn upsert_task(&mut self, task: Task) {
        self.tasks.insert(task.id, task);
    }

    pub fn remove_task(&mut self, id: Uuid) -> Option<Task> {
        self.tasks.remove(&id)
    }

    pub fn pending_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values().filter(|t| !t.is_completed)
    }

    pub fn completed_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values().filter(|t| t.is_completed)
    }

    pub fn tasks_in_category<'a>(&'a self, category_id: &'a str) -> impl Iterator<Item = &'a Task> {
        self.tasks
            .values()
            .filter(move |t| t.category_id.as_deref() == Some(category_id))
    }

    pub fn get_category(&self, id: &str) -> Option<&Category> {
        self.categories.get(id)
    }

    pub fn upsert_category(&mut self, category: Category) {
        self.categories.insert(category.id.clone(), category);
    }

    /// Detaches every task from `category_id`. Returns how many changed.
    pub fn clear_category(&mut self, category_id: &str) -> usize {
        let mut cleared = 0;
        for task in self.tasks.values_mut() {
            if task.category_id.as_deref() == Some(category_id) {
                task.category_id = None;
                cleared += 1;
            }
        }
        cleared
    }

    /// Categories with their task counts, defaults first then by name
    pub fn category_summaries(&self) -> Vec<CategorySummary> {
        let mut summaries: Vec<CategorySummary> = self
            .categories
            .values()
            .map(|category| CategorySummary {
                task_count: self.tasks_in_category(&category.id).count(),
                category: category.clone(),
            })
            .collect();

        summaries.sort_by(|a, b| {
            b.category
                .is_default
                .cmp(&a.category.is_default)
                .then_with(|| a.category.name.cmp(&b.category.name))
        });
        summaries
    }
}
