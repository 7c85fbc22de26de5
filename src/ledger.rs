//! Completion history.
//!
//! Records are appended and removed one at a time. Task and routine names are
//! resolved against the current routine when history is read, so renames show
//! up everywhere and deleted tasks fall back to a label.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::LabelsConfig;
use crate::error::{Error, Result};
use crate::model::{format_timestamp, normalize_timestamp, Completion, Routine};
use crate::storage::Backend;

#[derive(Debug, Clone)]
pub struct CompletionLedger {
    backend: Arc<dyn Backend>,
    labels: LabelsConfig,
}

impl CompletionLedger {
    pub fn new(backend: Arc<dyn Backend>, labels: LabelsConfig) -> Self {
        Self { backend, labels }
    }

    /// Record one completion of `task_id`, at `completed_at` or now.
    ///
    /// The routine must exist; the task id is taken on trust so history can
    /// be recorded for tasks the caller knows about.
    pub fn complete_task(
        &self,
        routine_id: &str,
        task_id: &str,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Completion> {
        let routine_id = require_id("routine id", routine_id)?;
        let task_id = require_id("task id", task_id)?;
        let routine = self
            .backend
            .read_routine(routine_id)?
            .ok_or_else(|| Error::RoutineNotFound(routine_id.to_string()))?;

        let completion = Completion::new(
            routine_id,
            task_id,
            completed_at.unwrap_or_else(Utc::now),
        );
        self.backend.append_completion(&completion)?;
        tracing::debug!(
            routine_id = %routine_id,
            task_id = %task_id,
            completion_id = %completion.id,
            "recorded completion"
        );
        Ok(self.enrich(completion, Some(&routine)))
    }

    /// History of one routine with display names, newest first.
    pub fn get_history(&self, routine_id: &str) -> Result<Vec<Completion>> {
        let routine_id = routine_id.trim();
        if routine_id.is_empty() {
            return Ok(Vec::new());
        }
        let routine = self.lookup_routine(routine_id)?;
        let mut history: Vec<Completion> = self
            .backend
            .read_completions(routine_id)?
            .into_iter()
            .map(|completion| self.enrich(completion, routine.as_ref()))
            .collect();
        newest_first(&mut history);
        Ok(history)
    }

    /// Every routine's history in one pass, keyed by routine id.
    pub fn get_all_histories(&self) -> Result<BTreeMap<String, Vec<Completion>>> {
        let mut routines: HashMap<String, Option<Routine>> = HashMap::new();
        let mut histories: BTreeMap<String, Vec<Completion>> = BTreeMap::new();

        for completion in self.backend.read_all_completions()? {
            if !routines.contains_key(&completion.routine_id) {
                let routine = self.lookup_routine(&completion.routine_id)?;
                routines.insert(completion.routine_id.clone(), routine);
            }
            let routine = routines.get(&completion.routine_id).and_then(Option::as_ref);
            let completion = self.enrich(completion, routine);
            histories
                .entry(completion.routine_id.clone())
                .or_default()
                .push(completion);
        }

        for history in histories.values_mut() {
            newest_first(history);
        }
        Ok(histories)
    }

    /// Remove the single completion of `task_id` recorded at `completed_at`.
    ///
    /// Returns `false` when nothing matches. Several matches are refused
    /// with [`Error::AmbiguousCompletion`]; use
    /// [`CompletionLedger::delete_completion_by_id`] for those.
    pub fn delete_completion(
        &self,
        routine_id: &str,
        task_id: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let routine_id = require_id("routine id", routine_id)?;
        let task_id = require_id("task id", task_id)?;
        let completed_at = normalize_timestamp(completed_at);

        let matches: Vec<Completion> = self
            .backend
            .read_completions(routine_id)?
            .into_iter()
            .filter(|c| c.task_id == task_id && c.completed_at == completed_at)
            .collect();

        match matches.as_slice() {
            [] => {
                tracing::debug!(
                    routine_id = %routine_id,
                    task_id = %task_id,
                    "no completion to delete"
                );
                Ok(false)
            }
            [only] => self.backend.remove_completion(routine_id, &only.id),
            _ => Err(Error::AmbiguousCompletion {
                task_id: task_id.to_string(),
                completed_at: format_timestamp(&completed_at),
                matches: matches.len(),
            }),
        }
    }

    pub fn delete_completion_by_id(&self, routine_id: &str, completion_id: &str) -> Result<bool> {
        let routine_id = require_id("routine id", routine_id)?;
        let completion_id = require_id("completion id", completion_id)?;
        let removed = self.backend.remove_completion(routine_id, completion_id)?;
        if !removed {
            tracing::debug!(
                routine_id = %routine_id,
                completion_id = %completion_id,
                "completion not found"
            );
        }
        Ok(removed)
    }

    fn lookup_routine(&self, routine_id: &str) -> Result<Option<Routine>> {
        match self.backend.read_routine(routine_id) {
            Ok(routine) => Ok(routine),
            Err(Error::CorruptRecord { path, reason }) => {
                tracing::warn!(
                    routine_id = %routine_id,
                    path = %path,
                    reason = %reason,
                    "using fallback names for unreadable routine"
                );
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn enrich(&self, mut completion: Completion, routine: Option<&Routine>) -> Completion {
        completion.task_name = Some(
            routine
                .and_then(|routine| routine.task(&completion.task_id))
                .map(|task| task.name.clone())
                .unwrap_or_else(|| self.labels.deleted_task.clone()),
        );
        completion.routine_name = Some(
            routine
                .map(|routine| routine.name.clone())
                .unwrap_or_else(|| self.labels.deleted_routine.clone()),
        );
        completion
    }
}

fn require_id<'a>(what: &str, id: &'a str) -> Result<&'a str> {
    let id = id.trim();
    if id.is_empty() {
        return Err(Error::InvalidArgument(format!("{what} cannot be empty")));
    }
    Ok(id)
}

fn newest_first(history: &mut [Completion]) {
    history.sort_by(|a, b| {
        b.completed_at
            .cmp(&a.completed_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}
