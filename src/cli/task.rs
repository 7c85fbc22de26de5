//! Task commands: add, edit, rm, move.
//!
//! Every command edits a draft of the stored routine and saves the whole
//! routine back, so positions are always renumbered.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::model::{Routine, TaskDraft};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::tracker::Tracker;

use super::{open_tracker, resolve_routine, resolve_task};

pub struct AddOptions {
    pub routine: String,
    pub name: String,
    pub description: Option<String>,
    /// 1-based
    pub at: Option<usize>,
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

pub struct EditOptions {
    pub routine: String,
    pub task: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

pub struct RmOptions {
    pub routine: String,
    pub task: String,
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

pub enum MoveTarget {
    /// 1-based
    Position(usize),
    Up,
    Down,
}

pub struct MoveOptions {
    pub routine: String,
    pub task: String,
    pub target: MoveTarget,
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

pub fn run_add(options: AddOptions) -> Result<()> {
    let tracker = open_tracker(options.data_dir)?;
    let routine = resolve_routine(&tracker, &options.routine)?;

    let mut draft = routine.to_draft();
    let mut task = TaskDraft::new(options.name);
    task.description = options.description;
    let index = match options.at {
        Some(position) => {
            let index = zero_based(position, draft.tasks.len() + 1)?;
            draft.tasks.insert(index, task);
            index
        }
        None => {
            draft.push_task(task);
            draft.tasks.len() - 1
        }
    };

    let saved = tracker.repository().save_routine(draft)?;
    report(&tracker, options.output, "task add", saved, |routine| {
        routine
            .tasks
            .get(index)
            .map(|task| format!("added task {}. {}", index + 1, task.name))
            .unwrap_or_else(|| "added task".to_string())
    })
}

pub fn run_edit(options: EditOptions) -> Result<()> {
    let tracker = open_tracker(options.data_dir)?;
    let routine = resolve_routine(&tracker, &options.routine)?;
    let task_id = resolve_task(&routine, &options.task)?.id.clone();

    let mut draft = routine.to_draft();
    draft.edit_task(&task_id, options.name, options.description)?;
    let saved = tracker.repository().save_routine(draft)?;

    report(&tracker, options.output, "task edit", saved, |routine| {
        routine
            .task(&task_id)
            .map(|task| format!("updated task {}", task.name))
            .unwrap_or_else(|| "updated task".to_string())
    })
}

pub fn run_rm(options: RmOptions) -> Result<()> {
    let tracker = open_tracker(options.data_dir)?;
    let routine = resolve_routine(&tracker, &options.routine)?;
    let task_id = resolve_task(&routine, &options.task)?.id.clone();

    let mut draft = routine.to_draft();
    let removed = draft.remove_task(&task_id)?;
    let saved = tracker.repository().save_routine(draft)?;

    report(&tracker, options.output, "task rm", saved, |_| {
        format!("removed task {}", removed.name)
    })
}

pub fn run_move(options: MoveOptions) -> Result<()> {
    let tracker = open_tracker(options.data_dir)?;
    let routine = resolve_routine(&tracker, &options.routine)?;
    let task_id = resolve_task(&routine, &options.task)?.id.clone();

    let mut draft = routine.to_draft();
    let from = draft
        .task_index(&task_id)
        .ok_or_else(|| Error::TaskNotFound {
            routine_id: routine.id.clone(),
            task_id: task_id.clone(),
        })?;
    match options.target {
        MoveTarget::Position(position) => {
            let to = zero_based(position, draft.tasks.len())?;
            draft.move_task(from, to)?;
        }
        MoveTarget::Up => draft.move_task_up(from)?,
        MoveTarget::Down => draft.move_task_down(from)?,
    }
    let saved = tracker.repository().save_routine(draft)?;

    report(&tracker, options.output, "task move", saved, |routine| {
        routine
            .task(&task_id)
            .map(|task| format!("moved {} to position {}", task.name, task.position + 1))
            .unwrap_or_else(|| "moved task".to_string())
    })
}

fn zero_based(position: usize, len: usize) -> Result<usize> {
    if position == 0 || position > len {
        return Err(Error::InvalidArgument(format!(
            "position {position} out of range (1-{len})"
        )));
    }
    Ok(position - 1)
}

fn report(
    tracker: &Tracker,
    output: OutputOptions,
    command: &str,
    routine: Routine,
    header: impl FnOnce(&Routine) -> String,
) -> Result<()> {
    tracing::debug!(
        data_dir = %tracker.data_dir().display(),
        routine_id = %routine.id,
        command,
        "task list changed"
    );
    let mut human = HumanOutput::new(header(&routine));
    for task in &routine.tasks {
        human.push_line("Tasks", format!("{}. {}", task.position + 1, task.name));
    }
    emit_success(output, command, &routine, Some(&human))
}
