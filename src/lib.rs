//! Personal task manager engine: tasks, categories, recurrence, reminders
//! and focus sessions over a local JSON store.

pub mod config;
pub mod focus;
pub mod models;
pub mod notifications;
pub mod recurrence;
pub mod reminders;
pub mod repository;
pub mod services;
pub mod storage;
