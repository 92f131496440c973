//! Process configuration read from the environment.

use std::{path::PathBuf, time::Duration};

use jiff::tz::TimeZone;
use thiserror::Error;

pub const DATA_DIR_VAR: &str = "TODOLIST_DATA_DIR";
pub const NOTIFICATIONS_VAR: &str = "TODOLIST_NOTIFICATIONS";
pub const RESCAN_SECS_VAR: &str = "TODOLIST_RESCAN_SECS";

const DEFAULT_RESCAN_SECS: u64 = 30;
const STORE_FILE: &str = "store.json";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Could not find a data directory; set {DATA_DIR_VAR}")]
    NoDataDir,

    #[error("{RESCAN_SECS_VAR} must be a positive number of seconds, got '{0}'")]
    InvalidRescanInterval(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Holds the store, its backups and the settings file
    pub data_dir: PathBuf,
    /// Zone used for calendar arithmetic and display
    pub time_zone: TimeZone,
    /// Whether the user allows reminder notifications
    pub notifications_enabled: bool,
    /// How often the reminder daemon re-reads the store
    pub rescan_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok(), TimeZone::system())
    }

    /// Builds the configuration from an arbitrary variable source
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        time_zone: TimeZone,
    ) -> Result<Self, ConfigError> {
        let data_dir = match lookup(DATA_DIR_VAR).filter(|dir| !dir.trim().is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_local_dir()
                .ok_or(ConfigError::NoDataDir)?
                .join("todolist"),
        };

        let notifications_enabled = lookup(NOTIFICATIONS_VAR)
            .map(|value| !matches!(value.trim().to_lowercase().as_str(), "off" | "false" | "0"))
            .unwrap_or(true);

        let rescan_interval = match lookup(RESCAN_SECS_VAR) {
            Some(value) => match value.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => return Err(ConfigError::InvalidRescanInterval(value)),
            },
            None => Duration::from_secs(DEFAULT_RESCAN_SECS),
        };

        Ok(Self {
            data_dir,
            time_zone,
            notifications_enabled,
            rescan_interval,
        })
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(STORE_FILE)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE)
    }
}
