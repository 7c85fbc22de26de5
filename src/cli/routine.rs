//! Routine commands: list, show, new, edit, rm, next.

use std::path::PathBuf;

use chrono::NaiveDate;

use crate::error::Result;
use crate::model::{format_timestamp, Routine, RoutineDraft, RoutineSummary, Task, TaskDraft};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::views::{next_task, task_statuses, TaskStatus};

use super::{open_tracker, resolve_routine};

pub struct ListOptions {
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

pub struct ShowOptions {
    pub routine: String,
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

pub struct NewOptions {
    pub name: String,
    pub description: Option<String>,
    pub tasks: Vec<String>,
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

pub struct EditOptions {
    pub routine: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

pub struct RmOptions {
    pub routine: String,
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

pub struct NextOptions {
    pub routine: String,
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

#[derive(serde::Serialize)]
struct ListReport {
    routines: Vec<RoutineSummary>,
}

#[derive(serde::Serialize)]
struct ShowReport {
    routine: Routine,
    today: NaiveDate,
    tasks: Vec<TaskStatus>,
    next_task: Option<Task>,
}

#[derive(serde::Serialize)]
struct RmReport {
    routine_id: String,
    deleted: bool,
}

#[derive(serde::Serialize)]
struct NextReport {
    routine_id: String,
    next_task: Option<Task>,
}

pub fn run_list(options: ListOptions) -> Result<()> {
    let tracker = open_tracker(options.data_dir)?;
    let routines = tracker.repository().list_routines()?;

    let mut human = HumanOutput::new(format!("{} routine(s)", routines.len()));
    for routine in &routines {
        let line = match &routine.description {
            Some(description) => format!(
                "{}  {} - {}",
                short_id(&routine.id),
                routine.name,
                description
            ),
            None => format!("{}  {}", short_id(&routine.id), routine.name),
        };
        human.push_line("Routines", line);
    }
    if routines.is_empty() {
        human.push_next_step("routines new <name> --task <task>");
    }

    emit_success(options.output, "list", &ListReport { routines }, Some(&human))
}

pub fn run_show(options: ShowOptions) -> Result<()> {
    let tracker = open_tracker(options.data_dir)?;
    let routine = resolve_routine(&tracker, &options.routine)?;
    let history = tracker.ledger().get_history(&routine.id)?;
    let boundary = tracker.day_boundary()?;
    let today = boundary.today();

    let tasks = task_statuses(&routine, &history, today, &boundary);
    let policy = tracker.next_task_policy(today)?;
    let next = next_task(&routine, &history, &policy).cloned();

    let mut human = HumanOutput::new(routine.name.clone());
    human.push_summary("id", routine.id.clone());
    if let Some(description) = &routine.description {
        human.push_summary("description", description.clone());
    }
    human.push_summary("updated", format_timestamp(&routine.updated_at));
    human.push_summary(
        "next",
        next.as_ref()
            .map(|task| task.name.clone())
            .unwrap_or_else(|| "all done".to_string()),
    );
    for status in &tasks {
        let mark = if status.completed_today { "x" } else { " " };
        human.push_line(
            "Tasks",
            format!(
                "[{mark}] {}. {} ({}x)",
                status.task.position + 1,
                status.task.name,
                status.completions
            ),
        );
    }
    if let Some(task) = &next {
        human.push_next_step(format!(
            "routines done {} {}",
            short_id(&routine.id),
            task.position + 1
        ));
    }

    let report = ShowReport {
        routine,
        today,
        tasks,
        next_task: next,
    };
    emit_success(options.output, "show", &report, Some(&human))
}

pub fn run_new(options: NewOptions) -> Result<()> {
    let tracker = open_tracker(options.data_dir)?;

    let mut draft = RoutineDraft::new(options.name);
    draft.description = options.description;
    for name in options.tasks {
        draft.push_task(TaskDraft::new(name));
    }
    let routine = tracker.repository().save_routine(draft)?;

    let mut human = HumanOutput::new(format!("created routine {}", routine.name));
    human.push_summary("id", routine.id.clone());
    human.push_summary("tasks", routine.tasks.len().to_string());
    if routine.tasks.is_empty() {
        human.push_next_step(format!("routines task add {} <name>", short_id(&routine.id)));
    }

    emit_success(options.output, "new", &routine, Some(&human))
}

pub fn run_edit(options: EditOptions) -> Result<()> {
    let tracker = open_tracker(options.data_dir)?;
    let routine = resolve_routine(&tracker, &options.routine)?;

    let mut draft = routine.to_draft();
    if let Some(name) = options.name {
        draft.name = name;
    }
    if let Some(description) = options.description {
        draft.description = Some(description);
    }
    let saved = tracker.repository().save_routine(draft)?;

    let mut human = HumanOutput::new(format!("updated routine {}", saved.name));
    human.push_summary("id", saved.id.clone());
    emit_success(options.output, "edit", &saved, Some(&human))
}

pub fn run_rm(options: RmOptions) -> Result<()> {
    let tracker = open_tracker(options.data_dir)?;
    let routine = resolve_routine(&tracker, &options.routine)?;
    let deleted = tracker.repository().delete_routine(&routine.id)?;

    let header = if deleted {
        format!("deleted routine {}", routine.name)
    } else {
        format!("routine {} was already gone", routine.name)
    };
    let human = HumanOutput::new(header);
    let report = RmReport {
        routine_id: routine.id,
        deleted,
    };
    emit_success(options.output, "rm", &report, Some(&human))
}

pub fn run_next(options: NextOptions) -> Result<()> {
    let tracker = open_tracker(options.data_dir)?;
    let routine = resolve_routine(&tracker, &options.routine)?;
    let history = tracker.ledger().get_history(&routine.id)?;
    let policy = tracker.next_task_policy(tracker.today()?)?;
    let next = next_task(&routine, &history, &policy).cloned();

    let human = match &next {
        Some(task) => {
            let mut human = HumanOutput::new(format!("{}. {}", task.position + 1, task.name));
            if let Some(description) = &task.description {
                human.push_summary("description", description.clone());
            }
            human
        }
        None => HumanOutput::new(format!("{}: all tasks done", routine.name)),
    };
    let report = NextReport {
        routine_id: routine.id,
        next_task: next,
    };
    emit_success(options.output, "next", &report, Some(&human))
}

/// Enough of an id to type back in.
pub(crate) fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
