//! Configuration loading and management
//!
//! Handles parsing of `routines.toml` in the data directory.

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::calendar::{DayBoundary, GridLayout};
use crate::views::{NextTaskWindow, WhenAllComplete};

/// File name of the configuration inside the data directory
pub const CONFIG_FILE: &str = "routines.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Next-task selection policy
    #[serde(default)]
    pub next_task: NextTaskConfig,

    /// Calendar configuration
    #[serde(default)]
    pub calendar: CalendarConfig,

    /// Fallback display labels
    #[serde(default)]
    pub labels: LabelsConfig,
}

/// Which persistence adapter backs the data directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// `routines/<id>.json` + `history/<id>.jsonl`
    Files,
    /// `routines.db` with routines/tasks/task_completions tables
    Sqlite,
}

impl std::str::FromStr for BackendKind {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "files" | "file" | "json" => Ok(BackendKind::Files),
            "sqlite" | "db" => Ok(BackendKind::Sqlite),
            _ => Err(crate::error::Error::InvalidArgument(format!(
                "unknown backend '{s}' (expected files|sqlite)"
            ))),
        }
    }
}

/// Storage-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: BackendKind,
}

fn default_backend() -> BackendKind {
    BackendKind::Files
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
        }
    }
}

/// Next-task policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextTaskConfig {
    /// What to offer once every task has been completed
    #[serde(default = "default_when_all_complete")]
    pub when_all_complete: WhenAllComplete,

    /// Which completions count towards "already done"
    #[serde(default = "default_window")]
    pub window: NextTaskWindow,
}

fn default_when_all_complete() -> WhenAllComplete {
    WhenAllComplete::Stop
}

fn default_window() -> NextTaskWindow {
    NextTaskWindow::AllTime
}

impl Default for NextTaskConfig {
    fn default() -> Self {
        Self {
            when_all_complete: default_when_all_complete(),
            window: default_window(),
        }
    }
}

/// Calendar configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Month grid shape
    #[serde(default = "default_layout")]
    pub layout: GridLayout,

    /// Offset used to attribute completions to calendar days:
    /// "local", "utc", or "+HH:MM"/"-HH:MM"
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
}

fn default_layout() -> GridLayout {
    GridLayout::Fitted
}

fn default_utc_offset() -> String {
    "local".to_string()
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            layout: default_layout(),
            utc_offset: default_utc_offset(),
        }
    }
}

impl CalendarConfig {
    /// Resolve the configured offset into a day boundary.
    pub fn day_boundary(&self) -> crate::error::Result<DayBoundary> {
        let raw = self.utc_offset.trim();
        match raw.to_lowercase().as_str() {
            "local" => Ok(DayBoundary::Local),
            "utc" | "z" => Ok(DayBoundary::utc()),
            _ => parse_offset(raw).map(DayBoundary::new),
        }
    }
}

/// Display labels for records whose owner no longer exists
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelsConfig {
    #[serde(default = "default_deleted_task")]
    pub deleted_task: String,

    #[serde(default = "default_deleted_routine")]
    pub deleted_routine: String,
}

fn default_deleted_task() -> String {
    "Deleted task".to_string()
}

fn default_deleted_routine() -> String {
    "Deleted routine".to_string()
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self {
            deleted_task: default_deleted_task(),
            deleted_routine: default_deleted_routine(),
        }
    }
}

fn parse_offset(raw: &str) -> crate::error::Result<FixedOffset> {
    let invalid = || {
        crate::error::Error::InvalidConfig(format!(
            "calendar.utc_offset: invalid offset '{raw}' (expected local|utc|+HH:MM)"
        ))
    };
    let (sign, rest) = match raw.as_bytes().first() {
        Some(b'+') => (1, &raw[1..]),
        Some(b'-') => (-1, &raw[1..]),
        _ => return Err(invalid()),
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

impl Config {
    /// Load configuration from a `routines.toml` file
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the data directory, or return defaults
    pub fn load_from_dir(data_dir: &Path) -> Self {
        let config_path = data_dir.join(CONFIG_FILE);
        if !config_path.exists() {
            return Self::default();
        }
        match Self::load(&config_path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(
                    path = %config_path.display(),
                    error = %err,
                    "ignoring invalid config"
                );
                Self::default()
            }
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> crate::error::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> crate::error::Result<()> {
        self.calendar.day_boundary()?;
        if self.labels.deleted_task.trim().is_empty() {
            return Err(crate::error::Error::InvalidConfig(
                "labels.deleted_task cannot be empty".to_string(),
            ));
        }
        if self.labels.deleted_routine.trim().is_empty() {
            return Err(crate::error::Error::InvalidConfig(
                "labels.deleted_routine cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}
