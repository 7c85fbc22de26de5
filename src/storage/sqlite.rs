//! Relational storage in a single SQLite database.
//!
//! Three tables keyed by generated ids; deleting a routine cascades to its
//! tasks and completions through foreign keys. Routine + task writes share
//! one transaction.

use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::model::{format_timestamp, Completion, Routine, RoutineSummary, Task};
use crate::storage::Backend;

/// Database file name inside the data directory
pub const DB_FILE: &str = "routines.db";

const SCHEMA_SQL: &str = include_str!("schema.sql");

#[derive(Debug)]
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::OperationFailed("database mutex poisoned".to_string()))
    }

    fn query_completions(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Completion>> {
        let conn = self.conn()?;
        let mut statement = conn.prepare(sql)?;
        let rows = statement.query_map(params, parse_completion_row)?;
        let mut result = Vec::new();
        for row in rows {
            match row {
                Ok(completion) => result.push(completion),
                Err(err) => tracing::warn!(error = %err, "skipping unreadable completion row"),
            }
        }
        Ok(result)
    }
}

impl Backend for SqliteBackend {
    fn list_routine_summaries(&self) -> Result<Vec<RoutineSummary>> {
        let conn = self.conn()?;
        let mut statement = conn.prepare(
            "SELECT id, name, description, updated_at FROM routines ORDER BY updated_at DESC",
        )?;
        let rows = statement.query_map([], |row| {
            Ok(RoutineSummary {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                updated_at: parse_time(&row.get::<_, String>(3)?)?,
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            match row {
                Ok(summary) => result.push(summary),
                Err(err) => tracing::warn!(error = %err, "skipping unreadable routine row"),
            }
        }
        Ok(result)
    }

    fn read_routine(&self, id: &str) -> Result<Option<Routine>> {
        let conn = self.conn()?;
        let routine = conn
            .query_row(
                "SELECT id, name, description, created_at, updated_at FROM routines WHERE id = ?1",
                [id],
                |row| {
                    Ok(Routine {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                        tasks: Vec::new(),
                        created_at: parse_time(&row.get::<_, String>(3)?)?,
                        updated_at: parse_time(&row.get::<_, String>(4)?)?,
                    })
                },
            )
            .optional()
            .map_err(|err| corrupt_row(id, err))?;

        let Some(mut routine) = routine else {
            return Ok(None);
        };

        let mut statement = conn.prepare(
            "SELECT id, name, description, position FROM tasks
             WHERE routine_id = ?1 ORDER BY position ASC",
        )?;
        routine.tasks = statement
            .query_map([id], |row| {
                Ok(Task {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    position: row.get::<_, i64>(3)?.max(0) as usize,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|err| corrupt_row(id, err))?;

        Ok(Some(routine))
    }

    fn write_routine(&self, routine: &Routine) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        // Upsert, not REPLACE: REPLACE deletes the row and would cascade to
        // the routine's completions.
        tx.execute(
            "INSERT INTO routines (id, name, description, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
               name = excluded.name,
               description = excluded.description,
               updated_at = excluded.updated_at",
            params![
                routine.id,
                routine.name,
                routine.description,
                format_timestamp(&routine.created_at),
                format_timestamp(&routine.updated_at),
            ],
        )?;
        tx.execute("DELETE FROM tasks WHERE routine_id = ?1", [&routine.id])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO tasks (routine_id, id, name, description, position)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for task in &routine.tasks {
                insert.execute(params![
                    routine.id,
                    task.id,
                    task.name,
                    task.description,
                    task.position as i64,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_routine_record(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM routines WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }

    fn append_completion(&self, completion: &Completion) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO task_completions (id, routine_id, task_id, completed_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                completion.id,
                completion.routine_id,
                completion.task_id,
                format_timestamp(&completion.completed_at),
            ],
        )?;
        Ok(())
    }

    fn read_completions(&self, routine_id: &str) -> Result<Vec<Completion>> {
        self.query_completions(
            "SELECT id, routine_id, task_id, completed_at FROM task_completions
             WHERE routine_id = ?1 ORDER BY completed_at ASC, id ASC",
            [routine_id],
        )
    }

    fn read_all_completions(&self) -> Result<Vec<Completion>> {
        self.query_completions(
            "SELECT id, routine_id, task_id, completed_at FROM task_completions
             ORDER BY completed_at ASC, id ASC",
            [],
        )
    }

    fn remove_completion(&self, routine_id: &str, completion_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "DELETE FROM task_completions WHERE routine_id = ?1 AND id = ?2",
            [routine_id, completion_id],
        )?;
        Ok(changed > 0)
    }
}

fn parse_completion_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Completion> {
    Ok(Completion {
        id: row.get(0)?,
        routine_id: row.get(1)?,
        task_id: row.get(2)?,
        completed_at: parse_time(&row.get::<_, String>(3)?)?,
        task_name: None,
        routine_name: None,
    })
}

fn parse_time(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    error.to_string(),
                )),
            )
        })
}

fn corrupt_row(id: &str, err: rusqlite::Error) -> Error {
    match err {
        rusqlite::Error::FromSqlConversionFailure(..) | rusqlite::Error::InvalidColumnType(..) => {
            tracing::warn!(routine_id = %id, error = %err, "unreadable routine row");
            Error::CorruptRecord {
                path: format!("{DB_FILE}#routines/{id}"),
                reason: err.to_string(),
            }
        }
        other => Error::Sqlite(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_routine(id: &str, task_ids: &[&str]) -> Routine {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 7, 30, 0).unwrap();
        Routine {
            id: id.to_string(),
            name: format!("Routine {id}"),
            description: None,
            tasks: task_ids
                .iter()
                .enumerate()
                .map(|(position, task_id)| Task {
                    id: task_id.to_string(),
                    name: task_id.to_uppercase(),
                    description: None,
                    position,
                })
                .collect(),
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn test_routine_round_trip() {
        let db = SqliteBackend::in_memory().unwrap();
        let routine = sample_routine("r1", &["a", "b", "c"]);
        db.write_routine(&routine).unwrap();

        let loaded = db.read_routine("r1").unwrap().unwrap();
        assert_eq!(loaded, routine);
        assert!(db.read_routine("nope").unwrap().is_none());
    }

    #[test]
    fn test_rewrite_keeps_completions() {
        let db = SqliteBackend::in_memory().unwrap();
        db.write_routine(&sample_routine("r1", &["a", "b"])).unwrap();
        let done = Completion::new("r1", "a", Utc::now());
        db.append_completion(&done).unwrap();

        // Dropping task "a" from the routine leaves its history in place
        db.write_routine(&sample_routine("r1", &["b"])).unwrap();

        let loaded = db.read_routine("r1").unwrap().unwrap();
        assert_eq!(loaded.tasks.len(), 1);
        let history = db.read_completions("r1").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, done.id);
    }

    #[test]
    fn test_delete_cascades() {
        let db = SqliteBackend::in_memory().unwrap();
        db.write_routine(&sample_routine("r1", &["a"])).unwrap();
        db.write_routine(&sample_routine("r2", &["a"])).unwrap();
        db.append_completion(&Completion::new("r1", "a", Utc::now()))
            .unwrap();
        db.append_completion(&Completion::new("r2", "a", Utc::now()))
            .unwrap();

        assert!(db.delete_routine_record("r1").unwrap());
        assert!(!db.delete_routine_record("r1").unwrap());
        assert!(db.read_completions("r1").unwrap().is_empty());
        assert_eq!(db.read_all_completions().unwrap().len(), 1);
    }

    #[test]
    fn test_completion_requires_routine() {
        let db = SqliteBackend::in_memory().unwrap();
        let err = db
            .append_completion(&Completion::new("ghost", "a", Utc::now()))
            .unwrap_err();
        assert!(matches!(err, Error::Sqlite(_)));
    }

    #[test]
    fn test_remove_completion_by_id() {
        let db = SqliteBackend::in_memory().unwrap();
        db.write_routine(&sample_routine("r1", &["a"])).unwrap();
        let first = Completion::new("r1", "a", Utc::now());
        db.append_completion(&first).unwrap();

        assert!(!db.remove_completion("r2", &first.id).unwrap());
        assert!(db.remove_completion("r1", &first.id).unwrap());
        assert!(db.read_completions("r1").unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_timestamp_is_reported() {
        let db = SqliteBackend::in_memory().unwrap();
        db.write_routine(&sample_routine("r1", &["a"])).unwrap();
        db.conn()
            .unwrap()
            .execute(
                "UPDATE routines SET created_at = 'yesterday' WHERE id = 'r1'",
                [],
            )
            .unwrap();

        assert!(matches!(
            db.read_routine("r1"),
            Err(Error::CorruptRecord { .. })
        ));
    }
}
