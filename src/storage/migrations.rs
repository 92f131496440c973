use jiff::Timestamp;
use serde_json::{Map, Value, json};

use crate::{models::category::seed_categories, storage::StorageError};

type MigrationFn = fn(Value) -> Result<Value, StorageError>;

fn get_migrations() -> Vec<MigrationFn> {
    vec![migrate_v1_to_v2, migrate_v2_to_v3]
}

/// Returns 1 if version field is missing (v1 files predate the field)
pub fn detect_version(value: &Value) -> Result<u32, StorageError> {
    match value.get("version") {
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| StorageError::InvalidVersion(v.to_string())),
        None => Ok(1),
    }
}

/// Migrations are applied sequentially: v1→v2→v3→...→target
pub fn apply_migrations(
    mut data: Value,
    from_version: u32,
    to_version: u32,
) -> Result<Value, StorageError> {
    if from_version == to_version {
        return Ok(data);
    }

    if from_version > to_version {
        return Err(StorageError::FutureVersion(from_version));
    }

    if from_version == 0 {
        return Err(StorageError::UnsupportedVersion(from_version));
    }

    let migrations = get_migrations();

    for version in from_version..to_version {
        let migration_idx = (version - 1) as usize; // v1→v2 is at index 0

        let Some(migration) = migrations.get(migration_idx) else {
            return Err(StorageError::UnsupportedVersion(version));
        };

        data = migration(data)?;
        tracing::info!(from = version, to = version + 1, "migrated store schema");
    }

    Ok(data)
}

fn tasks_mut(value: &mut Value) -> impl Iterator<Item = &mut Map<String, Value>> {
    value
        .get_mut("tasks")
        .and_then(|t| t.as_object_mut())
        .into_iter()
        .flat_map(|tasks| tasks.values_mut())
        .filter_map(|task| task.as_object_mut())
}

/// v2 adds recurring tasks
fn migrate_v1_to_v2(mut value: Value) -> Result<Value, StorageError> {
    for task in tasks_mut(&mut value) {
        task.entry("is_recurring").or_insert(Value::from(false));
        task.entry("recurrence_period").or_insert(Value::from("none"));
        task.entry("recurrence_end").or_insert(Value::Null);
    }

    if let Some(obj) = value.as_object_mut() {
        obj.insert("version".to_string(), Value::from(2));
    }

    Ok(value)
}

/// v3 adds categories, date-only tasks, priority icons and focus tracking
fn migrate_v2_to_v3(mut value: Value) -> Result<Value, StorageError> {
    for task in tasks_mut(&mut value) {
        let priority_value = match task.get("priority").and_then(Value::as_str) {
            Some("low") => 0,
            Some("high") => 2,
            _ => 1,
        };
        task.entry("has_time").or_insert(Value::from(true));
        task.entry("priority_icon")
            .or_insert(Value::from(format!("STANDARD:{priority_value}")));
        task.entry("category_id").or_insert(Value::Null);
        task.entry("focus_time_seconds").or_insert(Value::from(0));
    }

    let Some(obj) = value.as_object_mut() else {
        return Err(StorageError::InvalidVersion(String::from(
            "store root is not an object",
        )));
    };

    let categories = obj
        .entry("categories")
        .or_insert_with(|| json!({}))
        .as_object_mut()
        .ok_or_else(|| StorageError::InvalidVersion(String::from("categories is not an object")))?;

    for category in seed_categories(Timestamp::now()) {
        if !categories.contains_key(&category.id) {
            let id = category.id.clone();
            let row = serde_json::to_value(category)
                .map_err(|e| StorageError::SerializeFailed { source: e })?;
            categories.insert(id, row);
        }
    }

    obj.insert("version".to_string(), Value::from(3));
    Ok(value)
}
