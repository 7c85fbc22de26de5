//! Core data model: routines, their ordered tasks, and completion records.
//!
//! Stored routines carry their tasks inline and in order; `position` always
//! equals the task's index. Edits go through [`RoutineDraft`], which is what
//! the repository accepts and renumbers on save.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;
use uuid::Uuid;

use crate::error::{Error, Result};

/// One step of a routine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub position: usize,
}

/// A named, ordered collection of tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Routine {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl Routine {
    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == task_id)
    }

    /// Look a task up by id, falling back to a 1-based position ("2" is the
    /// second task).
    pub fn resolve_task(&self, selector: &str) -> Option<&Task> {
        let selector = selector.trim();
        if let Some(task) = self.task(selector) {
            return Some(task);
        }
        selector
            .parse::<usize>()
            .ok()
            .filter(|n| *n >= 1)
            .and_then(|n| self.tasks.get(n - 1))
    }

    pub fn summary(&self) -> RoutineSummary {
        RoutineSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            updated_at: self.updated_at,
        }
    }

    /// Start an edit of this routine, keeping its id and task ids.
    pub fn to_draft(&self) -> RoutineDraft {
        RoutineDraft {
            id: Some(self.id.clone()),
            name: self.name.clone(),
            description: self.description.clone(),
            tasks: self
                .tasks
                .iter()
                .map(|task| TaskDraft {
                    id: Some(task.id.clone()),
                    name: task.name.clone(),
                    description: task.description.clone(),
                })
                .collect(),
        }
    }
}

/// Summary projection used by routine listings (no tasks).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutineSummary {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// Unsaved task; `id` is assigned on save when absent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TaskDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Unsaved routine; a missing `id` creates a new routine on save.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoutineDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tasks: Vec<TaskDraft>,
}

impl RoutineDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_task(mut self, task: TaskDraft) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn push_task(&mut self, task: TaskDraft) {
        self.tasks.push(task);
    }

    pub fn task_index(&self, task_id: &str) -> Option<usize> {
        self.tasks
            .iter()
            .position(|task| task.id.as_deref() == Some(task_id))
    }

    pub fn edit_task(
        &mut self,
        task_id: &str,
        name: Option<String>,
        description: Option<String>,
    ) -> Result<()> {
        let index = self.require_task(task_id)?;
        let task = &mut self.tasks[index];
        if let Some(name) = name {
            task.name = name;
        }
        if let Some(description) = description {
            task.description = Some(description);
        }
        Ok(())
    }

    pub fn remove_task(&mut self, task_id: &str) -> Result<TaskDraft> {
        let index = self.require_task(task_id)?;
        Ok(self.tasks.remove(index))
    }

    /// Move the task at `from` so that it ends up at index `to`.
    pub fn move_task(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.tasks.len();
        if from >= len || to >= len {
            return Err(Error::InvalidArgument(format!(
                "task index out of range: {from} -> {to} (routine has {len} tasks)"
            )));
        }
        let task = self.tasks.remove(from);
        self.tasks.insert(to, task);
        Ok(())
    }

    pub fn move_task_up(&mut self, index: usize) -> Result<()> {
        if index == 0 {
            return Err(Error::InvalidArgument(
                "first task cannot move up".to_string(),
            ));
        }
        self.move_task(index, index - 1)
    }

    pub fn move_task_down(&mut self, index: usize) -> Result<()> {
        if index + 1 >= self.tasks.len() {
            return Err(Error::InvalidArgument(
                "last task cannot move down".to_string(),
            ));
        }
        self.move_task(index, index + 1)
    }

    fn require_task(&self, task_id: &str) -> Result<usize> {
        self.task_index(task_id).ok_or_else(|| Error::TaskNotFound {
            routine_id: self.id.clone().unwrap_or_default(),
            task_id: task_id.to_string(),
        })
    }
}

/// One timestamped completion of a task.
///
/// `task_name` and `routine_name` are never persisted; the ledger fills them
/// from the current routine when history is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub id: String,
    pub routine_id: String,
    pub task_id: String,
    #[serde(with = "timestamp")]
    pub completed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routine_name: Option<String>,
}

impl Completion {
    pub fn new(
        routine_id: impl Into<String>,
        task_id: impl Into<String>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_completion_id(),
            routine_id: routine_id.into(),
            task_id: task_id.into(),
            completed_at: normalize_timestamp(completed_at),
            task_name: None,
            routine_name: None,
        }
    }

    /// Copy without the read-time name enrichment, as stored.
    pub fn stored(&self) -> Self {
        Self {
            task_name: None,
            routine_name: None,
            ..self.clone()
        }
    }
}

pub fn new_routine_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn new_task_id() -> String {
    Ulid::new().to_string().to_lowercase()
}

pub fn new_completion_id() -> String {
    Ulid::new().to_string().to_lowercase()
}

/// Completion timestamps are kept at millisecond precision so that stored
/// and in-memory values compare equal.
pub fn normalize_timestamp(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(3)
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Accepts any RFC 3339 offset and converts to UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|ts| normalize_timestamp(ts.with_timezone(&Utc)))
        .map_err(|err| Error::InvalidArgument(format!("invalid timestamp '{raw}': {err}")))
}

/// Serde adapter writing `2024-06-30T21:59:59.000Z`.
pub mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        ts: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
