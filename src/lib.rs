//! routines - ordered habit checklists
//!
//! This library provides the core of the routines CLI: routines made of
//! ordered tasks, a ledger of timestamped task completions, and views derived
//! from both.
//!
//! # Core Concepts
//!
//! - **Routines**: named, ordered task lists; task positions are always 0..n-1
//! - **Completions**: append-only records of a task being done at an instant
//! - **Derived views**: next task, completed-today, history by day, and the
//!   month calendar, computed from a routine and its history
//!
//! # Module Organization
//!
//! - `model`: Routine, Task, Completion and edit drafts
//! - `storage`: `Backend` trait with file and SQLite implementations
//! - `repository`: routine persistence (ids, timestamps, renumbering)
//! - `ledger`: completion history with name resolution
//! - `views`: next task, counts, per-day grouping
//! - `calendar`: day attribution, month grids, per-day aggregation
//! - `tracker`: data directory + config + storage wiring
//! - `config`: `routines.toml`
//! - `lock`: file locking and atomic writes for the file backend
//! - `output`: JSON envelope / human output
//! - `cli`: command-line interface using clap
//!
//! ```no_run
//! use routines::model::{RoutineDraft, TaskDraft};
//! use routines::tracker::Tracker;
//!
//! # fn main() -> routines::Result<()> {
//! let tracker = Tracker::init(std::path::Path::new("/tmp/routines"), None)?;
//! let routine = tracker.repository().save_routine(
//!     RoutineDraft::new("Morning")
//!         .with_task(TaskDraft::new("Stretch"))
//!         .with_task(TaskDraft::new("Water")),
//! )?;
//! tracker.ledger().complete_task(&routine.id, &routine.tasks[0].id, None)?;
//! # Ok(())
//! # }
//! ```

pub mod calendar;
pub mod cli;
pub mod config;
pub mod error;
pub mod ledger;
pub mod lock;
pub mod model;
pub mod output;
pub mod repository;
pub mod storage;
pub mod tracker;
pub mod views;

pub use error::{Error, Result};
