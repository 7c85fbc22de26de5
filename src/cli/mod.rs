//! Command-line interface for routines
//!
//! This module defines the CLI structure using clap derive macros.
//! Commands live in submodules grouped by what they touch.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDateTime, Utc};
use clap::{Parser, Subcommand};

use crate::calendar::DayBoundary;
use crate::error::{Error, Result};
use crate::model::{parse_timestamp, Routine, Task};
use crate::output::OutputOptions;
use crate::tracker::{Tracker, DATA_DIR_ENV};

mod calendar;
mod history;
mod init;
mod routine;
mod task;

/// routines - ordered habit checklists
///
/// Keep routines of ordered tasks, tick tasks off as you do them, and look
/// back at what you did on a calendar.
#[derive(Parser, Debug)]
#[command(name = "routines")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data directory (defaults to the platform data directory)
    #[arg(long, global = true, env = DATA_DIR_ENV)]
    pub data_dir: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the data directory and its routines.toml
    Init {
        /// Storage backend: files or sqlite
        #[arg(long)]
        backend: Option<String>,
    },

    /// List routines, most recently updated first
    List,

    /// Show a routine with per-task progress
    Show {
        /// Routine id, id prefix or name
        routine: String,
    },

    /// Create a routine
    New {
        name: String,

        #[arg(long)]
        description: Option<String>,

        /// Task name; repeat for several tasks, in order
        #[arg(long = "task")]
        tasks: Vec<String>,
    },

    /// Rename or re-describe a routine
    Edit {
        routine: String,

        #[arg(long)]
        name: Option<String>,

        /// New description; an empty string clears it
        #[arg(long)]
        description: Option<String>,
    },

    /// Delete a routine together with its history
    Rm { routine: String },

    /// Task management within a routine
    #[command(subcommand)]
    Task(TaskCommands),

    /// Record a completion
    Done {
        routine: String,

        /// Task id, 1-based position or name (defaults to the next task)
        task: Option<String>,

        /// When it was done: RFC 3339, or local "YYYY-MM-DD HH:MM[:SS]"
        #[arg(long)]
        at: Option<String>,
    },

    /// Show the next task of a routine
    Next { routine: String },

    /// Completion history of a routine, grouped by day
    History {
        routine: String,

        /// Only completions of this task
        #[arg(long)]
        task: Option<String>,
    },

    /// Delete one completion, by id or by task and time
    #[command(name = "history-rm")]
    HistoryRm {
        routine: String,

        /// Completion id (from `history`)
        #[arg(required_unless_present = "task", conflicts_with_all = ["task", "at"])]
        completion: Option<String>,

        /// Task of the completion to delete
        #[arg(long, requires = "at")]
        task: Option<String>,

        /// Exact completion time
        #[arg(long, requires = "task")]
        at: Option<String>,
    },

    /// Month calendar of completions
    Calendar {
        #[arg(long)]
        year: Option<i32>,

        /// Month number, 1-12
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,
    },

    /// Completions on one day, per routine
    Day {
        /// Date as YYYY-MM-DD (defaults to today)
        date: Option<String>,
    },
}

/// Task subcommands
#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Append a task (or insert it at a position)
    Add {
        routine: String,
        name: String,

        #[arg(long)]
        description: Option<String>,

        /// 1-based position to insert at
        #[arg(long)]
        at: Option<usize>,
    },

    /// Rename or re-describe a task
    Edit {
        routine: String,
        task: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },

    /// Remove a task; its past completions are kept
    Rm { routine: String, task: String },

    /// Reorder a task
    Move {
        routine: String,
        task: String,

        /// 1-based target position
        #[arg(
            long,
            conflicts_with_all = ["up", "down"],
            required_unless_present_any = ["up", "down"]
        )]
        to: Option<usize>,

        #[arg(long, conflicts_with = "down")]
        up: bool,

        #[arg(long)]
        down: bool,
    },
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let data_dir = self.data_dir;
        let output = OutputOptions {
            json: self.json,
            quiet: self.quiet,
        };

        match self.command {
            Commands::Init { backend } => init::run(init::InitOptions {
                backend,
                data_dir,
                output,
            }),
            Commands::List => routine::run_list(routine::ListOptions { data_dir, output }),
            Commands::Show { routine } => routine::run_show(routine::ShowOptions {
                routine,
                data_dir,
                output,
            }),
            Commands::New {
                name,
                description,
                tasks,
            } => routine::run_new(routine::NewOptions {
                name,
                description,
                tasks,
                data_dir,
                output,
            }),
            Commands::Edit {
                routine,
                name,
                description,
            } => routine::run_edit(routine::EditOptions {
                routine,
                name,
                description,
                data_dir,
                output,
            }),
            Commands::Rm { routine } => routine::run_rm(routine::RmOptions {
                routine,
                data_dir,
                output,
            }),
            Commands::Next { routine } => routine::run_next(routine::NextOptions {
                routine,
                data_dir,
                output,
            }),
            Commands::Task(cmd) => match cmd {
                TaskCommands::Add {
                    routine,
                    name,
                    description,
                    at,
                } => task::run_add(task::AddOptions {
                    routine,
                    name,
                    description,
                    at,
                    data_dir,
                    output,
                }),
                TaskCommands::Edit {
                    routine,
                    task,
                    name,
                    description,
                } => task::run_edit(task::EditOptions {
                    routine,
                    task,
                    name,
                    description,
                    data_dir,
                    output,
                }),
                TaskCommands::Rm { routine, task } => task::run_rm(task::RmOptions {
                    routine,
                    task,
                    data_dir,
                    output,
                }),
                TaskCommands::Move {
                    routine,
                    task,
                    to,
                    up,
                    down,
                } => {
                    let target = match (to, up, down) {
                        (Some(position), _, _) => task::MoveTarget::Position(position),
                        (None, true, _) => task::MoveTarget::Up,
                        (None, false, true) => task::MoveTarget::Down,
                        (None, false, false) => {
                            return Err(Error::InvalidArgument(
                                "one of --to, --up or --down is required".to_string(),
                            ))
                        }
                    };
                    task::run_move(task::MoveOptions {
                        routine,
                        task,
                        target,
                        data_dir,
                        output,
                    })
                }
            },
            Commands::Done { routine, task, at } => history::run_done(history::DoneOptions {
                routine,
                task,
                at,
                data_dir,
                output,
            }),
            Commands::History { routine, task } => {
                history::run_history(history::HistoryOptions {
                    routine,
                    task,
                    data_dir,
                    output,
                })
            }
            Commands::HistoryRm {
                routine,
                completion,
                task,
                at,
            } => {
                let target = match (completion, task, at) {
                    (Some(id), _, _) => history::RemoveTarget::Id(id),
                    (None, Some(task), Some(at)) => history::RemoveTarget::Value { task, at },
                    _ => {
                        return Err(Error::InvalidArgument(
                            "pass a completion id, or both --task and --at".to_string(),
                        ))
                    }
                };
                history::run_remove(history::RemoveOptions {
                    routine,
                    target,
                    data_dir,
                    output,
                })
            }
            Commands::Calendar { year, month } => {
                calendar::run_calendar(calendar::CalendarOptions {
                    year,
                    month,
                    data_dir,
                    output,
                })
            }
            Commands::Day { date } => calendar::run_day(calendar::DayOptions {
                date,
                data_dir,
                output,
            }),
        }
    }
}

/// Open the tracker for `--data-dir`, `ROUTINES_DATA_DIR`, or the platform
/// default, in that order.
pub(crate) fn open_tracker(data_dir: Option<PathBuf>) -> Result<Tracker> {
    let data_dir = match data_dir {
        Some(dir) => dir,
        None => Tracker::default_data_dir()?,
    };
    Tracker::open(&data_dir)
}

/// Find a routine by exact id, case-insensitive name, or unique id prefix.
pub(crate) fn resolve_routine(tracker: &Tracker, selector: &str) -> Result<Routine> {
    let selector = selector.trim();
    if selector.is_empty() {
        return Err(Error::InvalidArgument(
            "routine selector cannot be empty".to_string(),
        ));
    }
    let repository = tracker.repository();
    if let Some(routine) = repository.get_routine(selector)? {
        return Ok(routine);
    }

    let summaries = repository.list_routines()?;
    let by_name: Vec<_> = summaries
        .iter()
        .filter(|s| s.name.eq_ignore_ascii_case(selector))
        .collect();
    let candidates = if by_name.is_empty() {
        summaries
            .iter()
            .filter(|s| s.id.starts_with(selector))
            .collect()
    } else {
        by_name
    };

    match candidates.as_slice() {
        [] => Err(Error::RoutineNotFound(selector.to_string())),
        [only] => repository.require_routine(&only.id),
        many => Err(Error::InvalidArgument(format!(
            "'{selector}' matches {} routines; use the id",
            many.len()
        ))),
    }
}

/// Find a task by id, 1-based position, or unique case-insensitive name.
pub(crate) fn resolve_task<'a>(routine: &'a Routine, selector: &str) -> Result<&'a Task> {
    if let Some(task) = routine.resolve_task(selector) {
        return Ok(task);
    }
    let selector = selector.trim();
    let matches: Vec<&Task> = routine
        .tasks
        .iter()
        .filter(|task| task.name.eq_ignore_ascii_case(selector))
        .collect();
    match matches.as_slice() {
        [only] => Ok(only),
        [] => Err(Error::TaskNotFound {
            routine_id: routine.id.clone(),
            task_id: selector.to_string(),
        }),
        many => Err(Error::InvalidArgument(format!(
            "'{selector}' matches {} tasks; use the id or position",
            many.len()
        ))),
    }
}

/// Parse a user-supplied time: RFC 3339 as is, or a wall-clock time at the
/// configured day boundary.
pub(crate) fn parse_when(raw: &str, boundary: &DayBoundary) -> Result<DateTime<Utc>> {
    const LOCAL_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];

    if let Ok(ts) = parse_timestamp(raw) {
        return Ok(ts);
    }
    let raw = raw.trim();
    LOCAL_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .and_then(|local| boundary.local_to_utc(local))
        .map(crate::model::normalize_timestamp)
        .ok_or_else(|| {
            Error::InvalidArgument(format!(
                "invalid time '{raw}' (expected RFC 3339 or YYYY-MM-DD HH:MM[:SS])"
            ))
        })
}
