#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use routines::config::{BackendKind, CONFIG_FILE};
use routines::model::{Routine, RoutineDraft, TaskDraft};
use routines::tracker::Tracker;
use tempfile::TempDir;

pub const BACKENDS: [BackendKind; 2] = [BackendKind::Files, BackendKind::Sqlite];

/// Scratch data directory with a config pinned to UTC day boundaries.
pub struct TestData {
    dir: TempDir,
}

impl TestData {
    pub fn init(backend: BackendKind) -> Self {
        let data = Self::empty();
        let backend = match backend {
            BackendKind::Files => "files",
            BackendKind::Sqlite => "sqlite",
        };
        data.write_config(&format!(
            "[storage]\nbackend = \"{backend}\"\n\n[calendar]\nutc_offset = \"utc\"\n"
        ))
        .expect("write config");
        Tracker::init(data.path(), None).expect("init data dir");
        data
    }

    pub fn empty() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_config(&self, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(CONFIG_FILE);
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn tracker(&self) -> Tracker {
        Tracker::open(self.path()).expect("open tracker")
    }

    /// Save a routine with the given task names, in order.
    pub fn seed_routine(&self, name: &str, tasks: &[&str]) -> Routine {
        let draft = tasks
            .iter()
            .fold(RoutineDraft::new(name), |draft, task| {
                draft.with_task(TaskDraft::new(*task))
            });
        self.tracker()
            .repository()
            .save_routine(draft)
            .expect("save routine")
    }

    /// The CLI binary pointed at this data directory.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("routines").expect("binary");
        cmd.env_remove("RUST_LOG")
            .env_remove("ROUTINES_DATA_DIR")
            .arg("--data-dir")
            .arg(self.path());
        cmd
    }
}

pub fn json_output(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}
