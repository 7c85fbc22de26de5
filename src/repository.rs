//! Routine and task persistence.
//!
//! The repository owns id assignment, timestamps and task renumbering; the
//! backend only stores what it is given.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;

use crate::error::{Error, Result};
use crate::model::{
    new_routine_id, new_task_id, normalize_timestamp, Routine, RoutineDraft, RoutineSummary, Task,
};
use crate::storage::Backend;

#[derive(Debug, Clone)]
pub struct RoutineRepository {
    backend: Arc<dyn Backend>,
}

impl RoutineRepository {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Routine summaries, most recently updated first.
    pub fn list_routines(&self) -> Result<Vec<RoutineSummary>> {
        let mut routines = self.backend.list_routine_summaries()?;
        routines.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(routines)
    }

    /// Full routine with tasks in order, or `None` if absent.
    pub fn get_routine(&self, id: &str) -> Result<Option<Routine>> {
        let id = id.trim();
        if id.is_empty() {
            return Ok(None);
        }
        let Some(mut routine) = self.backend.read_routine(id)? else {
            tracing::debug!(routine_id = %id, "routine not found");
            return Ok(None);
        };
        renumber(&mut routine.tasks);
        Ok(Some(routine))
    }

    pub fn require_routine(&self, id: &str) -> Result<Routine> {
        self.get_routine(id)?
            .ok_or_else(|| Error::RoutineNotFound(id.to_string()))
    }

    /// Create or update a routine from a draft.
    ///
    /// A draft without an id creates a new routine. With an id, `created_at`
    /// is carried over from the stored record and the stored task list is
    /// replaced by the draft's, positioned in draft order.
    pub fn save_routine(&self, draft: RoutineDraft) -> Result<Routine> {
        let name = draft.name.trim();
        if name.is_empty() {
            return Err(Error::InvalidArgument(
                "routine name cannot be empty".to_string(),
            ));
        }

        let id = match draft.id.as_deref().map(str::trim) {
            Some("") => {
                return Err(Error::InvalidArgument(
                    "routine id cannot be empty".to_string(),
                ))
            }
            Some(id) => id.to_string(),
            None => new_routine_id(),
        };

        let mut seen = HashSet::new();
        let mut tasks = Vec::with_capacity(draft.tasks.len());
        for (position, task) in draft.tasks.into_iter().enumerate() {
            let task_name = task.name.trim();
            if task_name.is_empty() {
                return Err(Error::InvalidArgument(format!(
                    "task {} has an empty name",
                    position + 1
                )));
            }
            let task_id = match task.id.as_deref().map(str::trim) {
                Some("") => {
                    return Err(Error::InvalidArgument(format!(
                        "task {} has an empty id",
                        position + 1
                    )))
                }
                Some(task_id) => task_id.to_string(),
                None => new_task_id(),
            };
            if !seen.insert(task_id.clone()) {
                return Err(Error::InvalidArgument(format!(
                    "duplicate task id '{task_id}'"
                )));
            }
            tasks.push(Task {
                id: task_id,
                name: task_name.to_string(),
                description: non_empty(task.description),
                position,
            });
        }

        let now = normalize_timestamp(Utc::now());
        let created_at = match self.backend.read_routine(&id) {
            Ok(Some(existing)) => existing.created_at,
            Ok(None) => now,
            Err(Error::CorruptRecord { path, reason }) => {
                tracing::warn!(
                    routine_id = %id,
                    path = %path,
                    reason = %reason,
                    "overwriting unreadable routine"
                );
                now
            }
            Err(err) => return Err(err),
        };

        let routine = Routine {
            id,
            name: name.to_string(),
            description: non_empty(draft.description),
            tasks,
            created_at,
            updated_at: now,
        };
        self.backend.write_routine(&routine)?;
        tracing::debug!(routine_id = %routine.id, tasks = routine.tasks.len(), "saved routine");
        Ok(routine)
    }

    /// Delete a routine, its tasks and its completions.
    ///
    /// Returns `false` when no id is given or nothing was stored under it.
    pub fn delete_routine(&self, id: &str) -> Result<bool> {
        let id = id.trim();
        if id.is_empty() {
            tracing::warn!("delete_routine called without an id");
            return Ok(false);
        }
        let deleted = self.backend.delete_routine_record(id)?;
        if deleted {
            tracing::debug!(routine_id = %id, "deleted routine");
        } else {
            tracing::warn!(routine_id = %id, "delete_routine: routine not found");
        }
        Ok(deleted)
    }
}

fn renumber(tasks: &mut [Task]) {
    tasks.sort_by_key(|task| task.position);
    for (position, task) in tasks.iter_mut().enumerate() {
        task.position = position;
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
