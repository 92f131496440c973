use thiserror::Error;

use crate::{
    models::category::{Category, CategorySummary, CategoryValidationError},
    repository::Repository,
    storage::{Storage, StorageError},
};

#[derive(Debug, Error)]
pub enum CreateCategoryError {
    #[error("Invalid category: {0}")]
    Validation(#[from] CategoryValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct CreateCategoryParameters {
    pub name: String,
    pub color: u32,
    pub icon_name: String,
}

pub fn create_category<S: Storage>(
    repository: &Repository<S>,
    parameters: CreateCategoryParameters,
) -> Result<Category, CreateCategoryError> {
    let category = Category::new(
        parameters.name.trim(),
        parameters.color,
        parameters.icon_name,
    );
    category.validate()?;

    repository.update(|store| {
        store.upsert_category(category.clone());
        Ok::<_, CreateCategoryError>(())
    })?;
    tracing::info!(category_id = %category.id, "category created");

    Ok(category)
}

#[derive(Debug, Error)]
pub enum UpdateCategoryError {
    #[error("Invalid category: {0}")]
    Validation(#[from] CategoryValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Fields left as `None` keep their current value
pub struct UpdateCategoryParameters {
    pub category_id: String,
    pub name: Option<String>,
    pub color: Option<u32>,
    pub icon_name: Option<String>,
}

/// Renames or restyles a category. Whether it is a default one and when it
/// was created never change. An unknown id yields `None`.
pub fn update_category<S: Storage>(
    repository: &Repository<S>,
    parameters: UpdateCategoryParameters,
) -> Result<Option<Category>, UpdateCategoryError> {
    let Some(current) = repository.read(|store| store.get_category(&parameters.category_id).cloned())
    else {
        return Ok(None);
    };

    let updated = Category {
        name: parameters
            .name
            .map(|name| name.trim().to_string())
            .unwrap_or(current.name),
        color: parameters.color.unwrap_or(current.color),
        icon_name: parameters.icon_name.unwrap_or(current.icon_name),
        ..current
    };
    updated.validate()?;

    repository.update(|store| {
        store.upsert_category(updated.clone());
        Ok::<_, UpdateCategoryError>(())
    })?;
    tracing::info!(category_id = %updated.id, "category updated");

    Ok(Some(updated))
}

#[derive(Debug, Error)]
pub enum DeleteCategoryError {
    #[error("Category '{0}' is a default category and cannot be deleted")]
    DefaultCategory(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteCategoryResult {
    pub category: Category,
    /// Tasks that were detached from the category
    pub cleared_tasks: usize,
}

/// Detaches every task from the category and removes it, in one write.
/// Tasks themselves are kept. An unknown id yields `None`.
pub fn delete_category<S: Storage>(
    repository: &Repository<S>,
    category_id: &str,
) -> Result<Option<DeleteCategoryResult>, DeleteCategoryError> {
    let Some(category) = repository.read(|store| store.get_category(category_id).cloned()) else {
        return Ok(None);
    };
    if category.is_default {
        return Err(DeleteCategoryError::DefaultCategory(category.name));
    }

    let result = repository.update(|store| {
        let cleared_tasks = store.clear_category(category_id);
        let Some(category) = store.categories.remove(category_id) else {
            return Ok(None);
        };
        Ok::<_, DeleteCategoryError>(Some(DeleteCategoryResult {
            category,
            cleared_tasks,
        }))
    })?;

    if let Some(result) = &result {
        tracing::info!(
            category_id = %result.category.id,
            cleared_tasks = result.cleared_tasks,
            "category deleted"
        );
    }
    Ok(result)
}

pub fn list_categories<S: Storage>(repository: &Repository<S>) -> Vec<CategorySummary> {
    repository.category_summaries()
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FindCategoryError {
    #[error("Category '{0}' not found")]
    CategoryNotFound(String),

    #[error("Category name is ambiguous. Multiple categories found: {}", .0.join(", "))]
    AmbiguousCategoryName(Vec<String>),
}

/// Looks a category up by id, exact name, or a case-insensitive piece of its
/// name
pub fn find_category<S: Storage>(
    repository: &Repository<S>,
    id_or_fuzzy_name: &str,
) -> Result<Category, FindCategoryError> {
    let query = id_or_fuzzy_name.trim();
    let lowered = query.to_lowercase();

    repository.read(|store| {
        if let Some(category) = store.get_category(query) {
            return Ok(category.clone());
        }

        if let Some(category) = store
            .categories
            .values()
            .find(|c| c.name.to_lowercase() == lowered)
        {
            return Ok(category.clone());
        }

        let mut matching_categories: Vec<&Category> = store
            .categories
            .values()
            .filter(|c| !lowered.is_empty() && c.name.to_lowercase().contains(&lowered))
            .collect();

        match matching_categories.len() {
            0 => Err(FindCategoryError::CategoryNotFound(query.to_string())),
            1 => Ok(matching_categories.remove(0).clone()),
            _ => {
                let mut names: Vec<String> =
                    matching_categories.iter().map(|c| c.name.clone()).collect();
                names.sort();
                Err(FindCategoryError::AmbiguousCategoryName(names))
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;

    use super::*;
    use crate::{
        models::{
            category::{PERSONAL_ID, WORK_ID},
            task::Task,
        },
        storage::memory::MemoryStorage,
    };

    fn repository() -> Repository<MemoryStorage> {
        Repository::open(MemoryStorage::new()).unwrap()
    }

    fn garden(repository: &Repository<MemoryStorage>) -> Category {
        create_category(
            repository,
            CreateCategoryParameters {
                name: String::from("Garden"),
                color: 0xFF10B981,
                icon_name: String::from("Yard"),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_create_category_generates_id() {
        let repository = repository();
        let category = garden(&repository);

        assert!(uuid::Uuid::parse_str(&category.id).is_ok());
        assert!(!category.is_default);
        assert_eq!(repository.category_summaries().len(), 5);
    }

    #[test]
    fn test_blank_category_name_is_rejected() {
        let repository = repository();
        let result = create_category(
            &repository,
            CreateCategoryParameters {
                name: String::from("   "),
                color: 0,
                icon_name: String::from("Label"),
            },
        );

        assert!(matches!(
            result,
            Err(CreateCategoryError::Validation(CategoryValidationError::BlankName))
        ));
        assert_eq!(repository.storage().save_count(), 0);
    }

    #[test]
    fn test_update_keeps_default_flag_and_creation_time() {
        let repository = repository();
        let before = repository.read(|store| store.get_category(WORK_ID).cloned()).unwrap();

        let updated = update_category(
            &repository,
            UpdateCategoryParameters {
                category_id: WORK_ID.to_string(),
                name: Some(String::from("Office")),
                color: None,
                icon_name: None,
            },
        )
        .unwrap()
        .unwrap();

        assert_eq!(updated.name, "Office");
        assert_eq!(updated.color, before.color);
        assert!(updated.is_default);
        assert_eq!(updated.created_at, before.created_at);
    }

    #[test]
    fn test_deleting_category_clears_tasks_but_keeps_them() {
        let repository = repository();
        let category = garden(&repository);
        let mut first = Task::new("Mow lawn", Timestamp::now());
        let mut second = Task::new("Prune roses", Timestamp::now());
        first.category_id = Some(category.id.clone());
        second.category_id = Some(category.id.clone());
        let unrelated = Task {
            category_id: Some(PERSONAL_ID.to_string()),
            ..Task::new("Call mum", Timestamp::now())
        };
        repository
            .update(|store| {
                store.upsert_task(first.clone());
                store.upsert_task(second.clone());
                store.upsert_task(unrelated.clone());
                Ok::<_, StorageError>(())
            })
            .unwrap();

        let result = delete_category(&repository, &category.id).unwrap().unwrap();

        assert_eq!(result.cleared_tasks, 2);
        assert_eq!(repository.task(first.id).unwrap().category_id, None);
        assert_eq!(repository.task(second.id).unwrap().category_id, None);
        assert_eq!(
            repository.task(unrelated.id).unwrap().category_id.as_deref(),
            Some(PERSONAL_ID)
        );
        assert!(repository.read(|store| store.get_category(&category.id).is_none()));
    }

    #[test]
    fn test_default_category_cannot_be_deleted() {
        let repository = repository();
        let task = Task {
            category_id: Some(WORK_ID.to_string()),
            ..Task::new("Quarterly review", Timestamp::now())
        };
        repository
            .update(|store| {
                store.upsert_task(task.clone());
                Ok::<_, StorageError>(())
            })
            .unwrap();
        let saves_before = repository.storage().save_count();

        let result = delete_category(&repository, WORK_ID);

        assert!(matches!(result, Err(DeleteCategoryError::DefaultCategory(_))));
        assert_eq!(repository.storage().save_count(), saves_before);
        assert_eq!(
            repository.task(task.id).unwrap().category_id.as_deref(),
            Some(WORK_ID)
        );
        assert!(repository.read(|store| store.get_category(WORK_ID).is_some()));
    }

    #[test]
    fn test_deleting_unknown_category_is_noop() {
        let repository = repository();
        assert!(delete_category(&repository, "nope").unwrap().is_none());
        assert_eq!(repository.storage().save_count(), 0);
    }

    #[test]
    fn test_find_category() {
        let repository = repository();
        garden(&repository);

        assert_eq!(find_category(&repository, "work").unwrap().id, WORK_ID);
        assert_eq!(find_category(&repository, "gard").unwrap().name, "Garden");
        assert!(matches!(
            find_category(&repository, "zzz"),
            Err(FindCategoryError::CategoryNotFound(_))
        ));
    }
}
