//! File-per-routine storage
//!
//! Each routine lives in `routines/<id>.json` with its ordered task list;
//! its completions are appended to `history/<id>.jsonl`. Routine writes go
//! through temp-file + rename, so a routine and its tasks change together.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::lock::{self, FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::model::{Completion, Routine, RoutineSummary};
use crate::storage::Backend;

/// Directory holding one JSON file per routine
pub const ROUTINES_DIR: &str = "routines";

/// Directory holding one JSONL history file per routine
pub const HISTORY_DIR: &str = "history";

const LOCK_FILE: &str = ".lock";

/// Storage manager for the file layout
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    pub fn routines_dir(&self) -> PathBuf {
        self.root.join(ROUTINES_DIR)
    }

    pub fn history_dir(&self) -> PathBuf {
        self.root.join(HISTORY_DIR)
    }

    pub fn routine_file(&self, id: &str) -> PathBuf {
        self.routines_dir().join(format!("{id}.json"))
    }

    pub fn history_file(&self, routine_id: &str) -> PathBuf {
        self.history_dir().join(format!("{routine_id}.jsonl"))
    }

    pub fn lock_file(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    /// Create the routines/ and history/ directories
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(self.routines_dir())?;
        fs::create_dir_all(self.history_dir())?;
        Ok(())
    }

    fn lock(&self) -> Result<FileLock> {
        FileLock::acquire(self.lock_file(), DEFAULT_LOCK_TIMEOUT_MS)
    }

    // =========================================================================
    // File I/O helpers
    // =========================================================================

    fn write_json<T: Serialize>(&self, path: &Path, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        lock::write_atomic(path, json.as_bytes())
    }

    fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|err| corrupt(path, err))
    }

    fn append_jsonl<T: Serialize>(&self, path: &Path, record: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string(record)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        writeln!(file, "{}", json)?;
        file.sync_all()?;

        Ok(())
    }

    /// Read all decodable records from a JSONL file; bad lines are skipped.
    fn read_jsonl<T: DeserializeOwned>(&self, path: &Path) -> Result<Vec<T>> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(record) => records.push(record),
                Err(err) => {
                    tracing::warn!(
                        path = %path.display(),
                        line = idx + 1,
                        error = %err,
                        "skipping unreadable history line"
                    );
                }
            }
        }

        Ok(records)
    }

    /// Rewrite a JSONL file without the first line `keep` rejects.
    ///
    /// Lines are copied byte for byte, including ones that no longer parse.
    fn remove_jsonl_line(&self, path: &Path, keep: impl Fn(&str) -> bool) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }
        let content = fs::read_to_string(path)?;
        let mut removed = false;
        let mut buf = String::with_capacity(content.len());
        for line in content.lines() {
            if !removed && !keep(line) {
                removed = true;
                continue;
            }
            buf.push_str(line);
            buf.push('\n');
        }
        if removed {
            lock::write_atomic(path, buf.as_bytes())?;
        }
        Ok(removed)
    }

    fn json_stems(&self, dir: &Path, extension: &str) -> Result<Vec<(String, PathBuf)>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(extension) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                entries.push((stem.to_string(), path.clone()));
            }
        }
        entries.sort();
        Ok(entries)
    }
}

impl Backend for FileBackend {
    fn list_routine_summaries(&self) -> Result<Vec<RoutineSummary>> {
        let mut summaries = Vec::new();
        for (id, path) in self.json_stems(&self.routines_dir(), "json")? {
            match self.read_json::<Routine>(&path) {
                Ok(mut routine) => {
                    routine.id = id;
                    summaries.push(routine.summary());
                }
                Err(err) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %err,
                        "skipping unreadable routine"
                    );
                }
            }
        }
        Ok(summaries)
    }

    fn read_routine(&self, id: &str) -> Result<Option<Routine>> {
        if !is_safe_id(id) {
            return Ok(None);
        }
        let path = self.routine_file(id);
        if !path.exists() {
            return Ok(None);
        }
        let mut routine: Routine = self.read_json(&path).inspect_err(|err| {
            tracing::warn!(path = %path.display(), error = %err, "unreadable routine file");
        })?;
        // The file name is authoritative for the id
        routine.id = id.to_string();
        routine.tasks.sort_by_key(|task| task.position);
        Ok(Some(routine))
    }

    fn write_routine(&self, routine: &Routine) -> Result<()> {
        require_safe_id(&routine.id)?;
        let _lock = self.lock()?;
        self.write_json(&self.routine_file(&routine.id), routine)
    }

    fn delete_routine_record(&self, id: &str) -> Result<bool> {
        if !is_safe_id(id) {
            return Ok(false);
        }
        let _lock = self.lock()?;
        let routine_path = self.routine_file(id);
        let history_path = self.history_file(id);

        if history_path.exists() {
            fs::remove_file(&history_path)?;
        }
        if !routine_path.exists() {
            return Ok(false);
        }
        fs::remove_file(&routine_path)?;
        Ok(true)
    }

    fn append_completion(&self, completion: &Completion) -> Result<()> {
        require_safe_id(&completion.routine_id)?;
        let _lock = self.lock()?;
        self.append_jsonl(&self.history_file(&completion.routine_id), &completion.stored())
    }

    fn read_completions(&self, routine_id: &str) -> Result<Vec<Completion>> {
        if !is_safe_id(routine_id) {
            return Ok(Vec::new());
        }
        self.read_jsonl(&self.history_file(routine_id))
    }

    fn read_all_completions(&self) -> Result<Vec<Completion>> {
        let mut all = Vec::new();
        for (_, path) in self.json_stems(&self.history_dir(), "jsonl")? {
            all.extend(self.read_jsonl::<Completion>(&path)?);
        }
        Ok(all)
    }

    fn remove_completion(&self, routine_id: &str, completion_id: &str) -> Result<bool> {
        if !is_safe_id(routine_id) {
            return Ok(false);
        }
        let _lock = self.lock()?;
        self.remove_jsonl_line(&self.history_file(routine_id), |line| {
            !serde_json::from_str::<LineId>(line).is_ok_and(|record| record.id == completion_id)
        })
    }
}

/// Just enough of a history line to match it by id.
#[derive(Deserialize)]
struct LineId {
    id: String,
}

fn corrupt(path: &Path, err: serde_json::Error) -> Error {
    Error::CorruptRecord {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

/// Ids become file names; anything that could escape the data dir is refused.
fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
}

fn require_safe_id(id: &str) -> Result<()> {
    if is_safe_id(id) {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "routine id '{id}' may only contain letters, digits, '-' and '_'"
        )))
    }
}
