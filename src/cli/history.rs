//! Completion commands: done, history, history-rm.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::model::{format_timestamp, Completion};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::views::{completions_for_task, group_by_day, next_task, DayHistory};

use super::routine::short_id;
use super::{open_tracker, parse_when, resolve_routine, resolve_task};

pub struct DoneOptions {
    pub routine: String,
    pub task: Option<String>,
    pub at: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

pub struct HistoryOptions {
    pub routine: String,
    pub task: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

pub enum RemoveTarget {
    Id(String),
    Value { task: String, at: String },
}

pub struct RemoveOptions {
    pub routine: String,
    pub target: RemoveTarget,
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

#[derive(serde::Serialize)]
struct HistoryReport {
    routine_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_id: Option<String>,
    total: usize,
    days: Vec<DayHistory>,
}

#[derive(serde::Serialize)]
struct RemoveReport {
    routine_id: String,
    completion_id: String,
    removed: bool,
}

pub fn run_done(options: DoneOptions) -> Result<()> {
    let tracker = open_tracker(options.data_dir)?;
    let routine = resolve_routine(&tracker, &options.routine)?;
    let boundary = tracker.day_boundary()?;

    let task = match options.task.as_deref() {
        Some(selector) => resolve_task(&routine, selector)?.clone(),
        None => {
            let history = tracker.ledger().get_history(&routine.id)?;
            let policy = tracker.next_task_policy(boundary.today())?;
            next_task(&routine, &history, &policy)
                .cloned()
                .ok_or_else(|| {
                    Error::InvalidArgument(format!(
                        "every task of '{}' is done; name the task to record it again",
                        routine.name
                    ))
                })?
        }
    };
    let at = options
        .at
        .as_deref()
        .map(|raw| parse_when(raw, &boundary))
        .transpose()?;

    let completion = tracker.ledger().complete_task(&routine.id, &task.id, at)?;

    let mut human = HumanOutput::new(format!("done: {}", task.name));
    human.push_summary("routine", routine.name.clone());
    human.push_summary("at", format_timestamp(&completion.completed_at));
    human.push_summary("id", completion.id.clone());

    let history = tracker.ledger().get_history(&routine.id)?;
    let policy = tracker.next_task_policy(boundary.today())?;
    if let Some(next) = next_task(&routine, &history, &policy) {
        human.push_next_step(format!(
            "routines done {} {}",
            short_id(&routine.id),
            next.position + 1
        ));
    }

    emit_success(options.output, "done", &completion, Some(&human))
}

pub fn run_history(options: HistoryOptions) -> Result<()> {
    let tracker = open_tracker(options.data_dir)?;
    let routine = resolve_routine(&tracker, &options.routine)?;
    let boundary = tracker.day_boundary()?;
    let mut history = tracker.ledger().get_history(&routine.id)?;

    let task_id = match options.task.as_deref() {
        // Removed tasks can still be asked for by raw id
        Some(selector) => Some(
            resolve_task(&routine, selector)
                .map(|task| task.id.clone())
                .unwrap_or_else(|_| selector.trim().to_string()),
        ),
        None => None,
    };
    if let Some(task_id) = &task_id {
        history = completions_for_task(&history, task_id)
            .into_iter()
            .cloned()
            .collect();
    }

    let days = group_by_day(&history, &boundary);
    let mut human = HumanOutput::new(format!(
        "{}: {} completion(s)",
        routine.name,
        history.len()
    ));
    for day in &days {
        for completion in &day.completions {
            human.push_line(&day.date.to_string(), describe(completion, &boundary));
        }
    }

    let report = HistoryReport {
        routine_id: routine.id,
        task_id,
        total: history.len(),
        days,
    };
    emit_success(options.output, "history", &report, Some(&human))
}

pub fn run_remove(options: RemoveOptions) -> Result<()> {
    let tracker = open_tracker(options.data_dir)?;
    let routine = resolve_routine(&tracker, &options.routine)?;
    let ledger = tracker.ledger();

    let (completion_id, removed) = match options.target {
        RemoveTarget::Id(id) => {
            let removed = ledger.delete_completion_by_id(&routine.id, &id)?;
            (id, removed)
        }
        RemoveTarget::Value { task, at } => {
            let task_id = resolve_task(&routine, &task)
                .map(|task| task.id.clone())
                .unwrap_or_else(|_| task.trim().to_string());
            let at = parse_when(&at, &tracker.day_boundary()?)?;
            let removed = ledger.delete_completion(&routine.id, &task_id, at)?;
            (format!("{task_id}@{}", format_timestamp(&at)), removed)
        }
    };

    if !removed {
        return Err(Error::CompletionNotFound(completion_id));
    }

    let human = HumanOutput::new(format!("removed completion {completion_id}"));
    let report = RemoveReport {
        routine_id: routine.id,
        completion_id,
        removed,
    };
    emit_success(options.output, "history-rm", &report, Some(&human))
}

fn describe(completion: &Completion, boundary: &crate::calendar::DayBoundary) -> String {
    let local = boundary.to_local(&completion.completed_at);
    format!(
        "{}  {}  ({})",
        local.format("%H:%M"),
        completion.task_name.as_deref().unwrap_or(&completion.task_id),
        completion.id
    )
}
