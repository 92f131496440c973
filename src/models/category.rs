use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Stable ids of the categories every store starts with
pub const WORK_ID: &str = "work";
pub const PERSONAL_ID: &str = "personal";
pub const SHOPPING_ID: &str = "shopping";
pub const HEALTH_ID: &str = "health";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Category {
    /// Seed categories use a fixed slug, user categories a UUID string
    pub id: String,
    pub name: String,
    /// ARGB colour
    pub color: u32,
    /// Icon identifier understood by the front-end
    pub icon_name: String,
    /// Default categories can't be deleted
    pub is_default: bool,
    pub created_at: Timestamp,
}

impl Category {
    pub fn new(name: impl Into<String>, color: u32, icon_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            color,
            icon_name: icon_name.into(),
            is_default: false,
            created_at: Timestamp::now(),
        }
    }

    pub fn validate(&self) -> Result<(), CategoryValidationError> {
        if self.name.trim().is_empty() {
            return Err(CategoryValidationError::BlankName);
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CategoryValidationError {
    #[error("Category name cannot be empty")]
    BlankName,
}

/// A category together with the number of tasks filed under it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySummary {
    pub category: Category,
    pub task_count: usize,
}

/// The four default categories, stamped with `created_at`
pub fn seed_categories(created_at: Timestamp) -> Vec<Category> {
    [
        (WORK_ID, "Work", 0xFF3B82F6, "Work"),
        (PERSONAL_ID, "Personal", 0xFF22C55E, "Person"),
        (SHOPPING_ID, "Shopping", 0xFFF59E0B, "ShoppingCart"),
        (HEALTH_ID, "Health", 0xFFEF4444, "FavoriteBorder"),
    ]
    .into_iter()
    .map(|(id, name, color, icon_name)| Category {
        id: id.to_string(),
        name: name.to_string(),
        color,
        icon_name: icon_name.to_string(),
        is_default: true,
        created_at,
    })
    .collect()
}
