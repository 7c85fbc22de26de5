//! Persistence adapters for routines and completion history
//!
//! The repository and ledger only talk to [`Backend`]; two implementations
//! keep the same data in different shapes:
//!
//! ```text
//! <data-dir>/                   # files backend
//!   routines.toml               # configuration
//!   .lock                       # advisory lock held during mutations
//!   routines/<routine-id>.json  # routine metadata + ordered tasks
//!   history/<routine-id>.jsonl  # one completion per line, append-only
//!
//! <data-dir>/                   # sqlite backend
//!   routines.toml
//!   routines.db                 # routines, tasks, task_completions
//! ```

use std::path::Path;
use std::sync::Arc;

use crate::config::BackendKind;
use crate::error::Result;
use crate::model::{Completion, Routine, RoutineSummary};

pub mod files;
pub mod sqlite;

pub use files::FileBackend;
pub use sqlite::SqliteBackend;

/// Storage contract consumed by the repository and the ledger.
///
/// Absent records are `Ok(None)` / `Ok(false)` / empty, never errors.
/// Listing operations skip records they cannot decode; single-record reads
/// report them as [`crate::Error::CorruptRecord`].
pub trait Backend: Send + Sync + std::fmt::Debug {
    /// Summaries of every stored routine, in no particular order.
    fn list_routine_summaries(&self) -> Result<Vec<RoutineSummary>>;

    /// Full routine with tasks ordered by position.
    fn read_routine(&self, id: &str) -> Result<Option<Routine>>;

    /// Insert or replace a routine and its complete task list.
    fn write_routine(&self, routine: &Routine) -> Result<()>;

    /// Remove a routine, its tasks and all of its completions.
    fn delete_routine_record(&self, id: &str) -> Result<bool>;

    fn append_completion(&self, completion: &Completion) -> Result<()>;

    /// Completions of one routine, without name enrichment.
    fn read_completions(&self, routine_id: &str) -> Result<Vec<Completion>>;

    fn read_all_completions(&self) -> Result<Vec<Completion>>;

    /// Remove exactly one completion by its id.
    fn remove_completion(&self, routine_id: &str, completion_id: &str) -> Result<bool>;
}

/// Open the configured backend rooted at `data_dir`.
pub fn open_backend(data_dir: &Path, kind: BackendKind) -> Result<Arc<dyn Backend>> {
    tracing::debug!(data_dir = %data_dir.display(), backend = ?kind, "opening storage");
    match kind {
        BackendKind::Files => Ok(Arc::new(FileBackend::new(data_dir.to_path_buf()))),
        BackendKind::Sqlite => Ok(Arc::new(SqliteBackend::new(
            &data_dir.join(sqlite::DB_FILE),
        )?)),
    }
}
