//! Error types for routines
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, unknown routine/task, invalid config)
//! - 3: Conflict (a by-value completion delete matched more than one record)
//! - 4: Operation failed (I/O, corrupt stored data, database error)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the routines CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const CONFLICT: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for routine operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Routine not found: {0}")]
    RoutineNotFound(String),

    #[error("Task {task_id} not found in routine {routine_id}")]
    TaskNotFound { routine_id: String, task_id: String },

    #[error("Completion not found: {0}")]
    CompletionNotFound(String),

    // Conflicts (exit code 3)
    #[error(
        "{matches} completions of task {task_id} share timestamp {completed_at}; \
         delete by id instead"
    )]
    AmbiguousCompletion {
        task_id: String,
        completed_at: String,
        matches: usize,
    },

    // Operation failures (exit code 4)
    #[error("Corrupt record {path}: {reason}")]
    CorruptRecord { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::InvalidArgument(_)
            | Error::InvalidConfig(_)
            | Error::RoutineNotFound(_)
            | Error::TaskNotFound { .. }
            | Error::CompletionNotFound(_) => exit_codes::USER_ERROR,

            // Conflicts
            Error::AmbiguousCompletion { .. } => exit_codes::CONFLICT,

            // Operation failures
            Error::CorruptRecord { .. }
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::Sqlite(_)
            | Error::LockFailed(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured context for machine-readable error output
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::RoutineNotFound(id) => Some(serde_json::json!({ "routine_id": id })),
            Error::TaskNotFound {
                routine_id,
                task_id,
            } => Some(serde_json::json!({
                "routine_id": routine_id,
                "task_id": task_id,
            })),
            Error::CompletionNotFound(id) => Some(serde_json::json!({ "completion_id": id })),
            Error::AmbiguousCompletion {
                task_id,
                completed_at,
                matches,
            } => Some(serde_json::json!({
                "task_id": task_id,
                "completed_at": completed_at,
                "matches": matches,
            })),
            Error::CorruptRecord { path, .. } => Some(serde_json::json!({ "path": path })),
            _ => None,
        }
    }
}

/// Result type alias for routine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            details: err.details(),
        }
    }
}
