//! Entry point tying a data directory to its configuration and storage.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use directories::ProjectDirs;

use crate::calendar::DayBoundary;
use crate::config::{BackendKind, Config, CONFIG_FILE};
use crate::error::{Error, Result};
use crate::ledger::CompletionLedger;
use crate::repository::RoutineRepository;
use crate::storage::{open_backend, Backend, FileBackend};
use crate::views::NextTaskPolicy;

/// Environment variable overriding the default data directory
pub const DATA_DIR_ENV: &str = "ROUTINES_DATA_DIR";

#[derive(Debug, Clone)]
pub struct Tracker {
    data_dir: PathBuf,
    config: Config,
    repository: RoutineRepository,
    ledger: CompletionLedger,
}

impl Tracker {
    /// Open an existing (or empty) data directory using its `routines.toml`.
    pub fn open(data_dir: &Path) -> Result<Self> {
        let config = Config::load_from_dir(data_dir);
        let backend = open_backend(data_dir, config.storage.backend)?;
        Ok(Self::with_backend(data_dir, config, backend))
    }

    pub fn with_backend(data_dir: &Path, config: Config, backend: Arc<dyn Backend>) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            repository: RoutineRepository::new(backend.clone()),
            ledger: CompletionLedger::new(backend, config.labels.clone()),
            config,
        }
    }

    /// Create the data directory and its config, keeping an existing config
    /// unless a different backend is requested.
    pub fn init(data_dir: &Path, backend: Option<BackendKind>) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let config_path = data_dir.join(CONFIG_FILE);
        let mut config = if config_path.exists() {
            Config::load(&config_path)?
        } else {
            Config::default()
        };
        if let Some(kind) = backend {
            config.storage.backend = kind;
        }
        config.save(&config_path)?;

        if config.storage.backend == BackendKind::Files {
            FileBackend::new(data_dir.to_path_buf()).init()?;
        }
        tracing::debug!(
            data_dir = %data_dir.display(),
            backend = ?config.storage.backend,
            "initialized data directory"
        );

        let backend = open_backend(data_dir, config.storage.backend)?;
        Ok(Self::with_backend(data_dir, config, backend))
    }

    /// Platform data directory, e.g. `~/.local/share/routines` on Linux.
    pub fn default_data_dir() -> Result<PathBuf> {
        ProjectDirs::from("", "", "routines")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| {
                Error::OperationFailed(format!(
                    "cannot determine a data directory; pass --data-dir or set {DATA_DIR_ENV}"
                ))
            })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn repository(&self) -> &RoutineRepository {
        &self.repository
    }

    pub fn ledger(&self) -> &CompletionLedger {
        &self.ledger
    }

    pub fn day_boundary(&self) -> Result<DayBoundary> {
        self.config.calendar.day_boundary()
    }

    pub fn today(&self) -> Result<NaiveDate> {
        Ok(self.day_boundary()?.today())
    }

    pub fn next_task_policy(&self, today: NaiveDate) -> Result<NextTaskPolicy> {
        Ok(NextTaskPolicy::from_config(
            &self.config.next_task,
            self.day_boundary()?,
            today,
        ))
    }
}
