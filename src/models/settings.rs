use std::{fmt, str::FromStr};

use thiserror::Error;

/// User preferences, persisted as plain key-value pairs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AppSettings {
    pub language: Language,
    pub theme_mode: ThemeMode,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsValueError {
    #[error("Unknown language '{0}' (expected en or vi)")]
    UnknownLanguage(String),

    #[error("Unknown theme '{0}' (expected light, dark or system)")]
    UnknownTheme(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    English,
    Vietnamese,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::English, Language::Vietnamese];

    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Vietnamese => "vi",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Vietnamese => "Tiếng Việt",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|language| language.code() == code)
    }
}

impl FromStr for Language {
    type Err = SettingsValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::from_code(&s.trim().to_lowercase())
            .ok_or_else(|| SettingsValueError::UnknownLanguage(s.to_string()))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemeMode {
    Light,
    Dark,
    #[default]
    System,
}

impl ThemeMode {
    pub const ALL: [ThemeMode; 3] = [ThemeMode::Light, ThemeMode::Dark, ThemeMode::System];

    /// Key written to the preferences file
    pub fn storage_name(self) -> &'static str {
        match self {
            ThemeMode::Light => "LIGHT",
            ThemeMode::Dark => "DARK",
            ThemeMode::System => "SYSTEM",
        }
    }

    pub fn from_storage_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.storage_name() == name)
    }
}

impl FromStr for ThemeMode {
    type Err = SettingsValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ThemeMode::from_storage_name(&s.trim().to_uppercase())
            .ok_or_else(|| SettingsValueError::UnknownTheme(s.to_string()))
    }
}

impl fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ThemeMode::Light => "Light",
            ThemeMode::Dark => "Dark",
            ThemeMode::System => "System",
        };
        f.write_str(label)
    }
}
