use std::{
    collections::BTreeMap,
    fs::{self, rename, write},
    path::PathBuf,
};

use uuid::Uuid;

use crate::{
    models::settings::{AppSettings, Language, ThemeMode},
    storage::StorageError,
};

const LANGUAGE_KEY: &str = "language";
const THEME_MODE_KEY: &str = "theme_mode";

/// Preferences file: a flat JSON object of string keys to string values
pub struct SettingsStorage {
    path: PathBuf,
}

impl SettingsStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_pairs(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| StorageError::ParseFailed {
                path: self.path.clone(),
                source: e,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(StorageError::LoadFailed {
                path: self.path.clone(),
                source: e,
            }),
        }
    }

    fn write_pairs(&self, pairs: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(pairs)
            .map_err(|e| StorageError::SerializeFailed { source: e })?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| StorageError::SaveFailed {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        let temp_path = PathBuf::from(format!("{}.tmp.{}", self.path.display(), Uuid::new_v4()));
        write(&temp_path, json).map_err(|e| StorageError::SaveFailed {
            path: temp_path.clone(),
            source: e,
        })?;
        rename(&temp_path, &self.path).map_err(|e| StorageError::SaveFailed {
            path: self.path.clone(),
            source: e,
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut pairs = self.read_pairs()?;
        pairs.insert(key.to_string(), value.to_string());
        self.write_pairs(&pairs)
    }

    /// Unknown or missing values fall back to the defaults
    pub fn load(&self) -> Result<AppSettings, StorageError> {
        let pairs = self.read_pairs()?;
        Ok(AppSettings {
            language: pairs
                .get(LANGUAGE_KEY)
                .and_then(|code| Language::from_code(code))
                .unwrap_or_default(),
            theme_mode: pairs
                .get(THEME_MODE_KEY)
                .and_then(|name| ThemeMode::from_storage_name(name))
                .unwrap_or_default(),
        })
    }

    pub fn set_language(&self, language: Language) -> Result<(), StorageError> {
        self.set(LANGUAGE_KEY, language.code())
    }

    pub fn set_theme_mode(&self, theme_mode: ThemeMode) -> Result<(), StorageError> {
        self.set(THEME_MODE_KEY, theme_mode.storage_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SettingsStorage::new(dir.path().join("settings.json"));
        assert_eq!(storage.load().unwrap(), AppSettings::default());
    }

    #[test]
    fn test_set_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SettingsStorage::new(dir.path().join("settings.json"));

        storage.set_language(Language::Vietnamese).unwrap();
        storage.set_theme_mode(ThemeMode::Dark).unwrap();

        let settings = storage.load().unwrap();
        assert_eq!(settings.language, Language::Vietnamese);
        assert_eq!(settings.theme_mode, ThemeMode::Dark);
    }

    #[test]
    fn test_unknown_values_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "language": "fr", "theme_mode": "NEON" }"#).unwrap();

        let settings = SettingsStorage::new(path).load().unwrap();
        assert_eq!(settings, AppSettings::default());
    }
}
