//! Task CRUD operations.

use super::{Database, now_ms};
use crate::types::{DATE_FORMAT, NewTask, Task, TaskListQuery, TaskPatch, TaskSort, parse_date};
use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, Row, params, params_from_iter};
use std::str::FromStr;
use tracing::debug;

pub(crate) const TASK_COLUMNS: &str = "id, title, description, priority, due_date, status, created_at";

/// Build an ORDER BY clause for the requested sort.
/// `id` breaks ties so rows created within the same millisecond stay stable.
fn build_order_clause(sort: TaskSort) -> &'static str {
    match sort {
        TaskSort::DueDateAsc => "due_date ASC, id ASC",
        TaskSort::CreatedDesc => "created_at DESC, id DESC",
    }
}

fn conversion_error(idx: usize, err: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse_text_column<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

/// Parse a row selected with [`TASK_COLUMNS`].
pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let due_date: String = row.get(4)?;

    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        priority: parse_text_column(row, 3)?,
        due_date: parse_date(&due_date).map_err(|e| conversion_error(4, e))?,
        status: parse_text_column(row, 5)?,
        created_at: row.get(6)?,
    })
}

/// Internal helper to get a task using an existing connection (avoids deadlock).
fn get_task_internal(conn: &Connection, task_id: i64) -> Result<Option<Task>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS))?;

    let result = stmt.query_row(params![task_id], parse_task_row);

    match result {
        Ok(task) => Ok(Some(task)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Format a due date for storage. Dates outside four-digit years are refused
/// so that stored text keeps chronological order.
fn due_date_text(date: NaiveDate) -> Result<String> {
    let text = date.format(DATE_FORMAT).to_string();
    parse_date(&text)?;
    Ok(text)
}

impl Database {
    /// Insert a task and return it with its assigned id and creation time.
    pub fn create_task(&self, task: NewTask) -> Result<Task> {
        let created_at = now_ms();
        let due_date = due_date_text(task.due_date)?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks (title, description, priority, due_date, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    task.title,
                    task.description,
                    task.priority.as_str(),
                    due_date,
                    task.status.as_str(),
                    created_at,
                ],
            )?;

            let id = conn.last_insert_rowid();
            debug!(task_id = id, title = %task.title, "Created task");

            Ok(Task {
                id,
                title: task.title,
                description: task.description,
                priority: task.priority,
                due_date: task.due_date,
                status: task.status,
                created_at,
            })
        })
    }

    /// Get a task by id.
    pub fn get_task(&self, task_id: i64) -> Result<Option<Task>> {
        self.with_conn(|conn| get_task_internal(conn, task_id))
    }

    /// List tasks matching all present filters.
    pub fn list_tasks(&self, query: &TaskListQuery) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            let mut clauses: Vec<&str> = Vec::new();
            let mut values: Vec<&str> = Vec::new();

            if let Some(status) = query.status {
                clauses.push("status = ?");
                values.push(status.as_str());
            }
            if let Some(priority) = query.priority {
                clauses.push("priority = ?");
                values.push(priority.as_str());
            }

            let mut sql = format!("SELECT {} FROM tasks", TASK_COLUMNS);
            if !clauses.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&clauses.join(" AND "));
            }
            sql.push_str(" ORDER BY ");
            sql.push_str(build_order_clause(query.sort));

            let mut stmt = conn.prepare(&sql)?;
            let tasks = stmt
                .query_map(params_from_iter(values), parse_task_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(tasks)
        })
    }

    /// Apply a partial update. Returns `None` if the task does not exist.
    pub fn update_task(&self, task_id: i64, patch: &TaskPatch) -> Result<Option<Task>> {
        if patch.is_empty() {
            return self.get_task(task_id);
        }

        let mut assignments: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(title) = &patch.title {
            assignments.push("title = ?");
            values.push(Value::Text(title.clone()));
        }
        if let Some(description) = &patch.description {
            assignments.push("description = ?");
            values.push(Value::Text(description.clone()));
        }
        if let Some(priority) = patch.priority {
            assignments.push("priority = ?");
            values.push(Value::Text(priority.as_str().to_string()));
        }
        if let Some(due_date) = patch.due_date {
            assignments.push("due_date = ?");
            values.push(Value::Text(due_date_text(due_date)?));
        }
        if let Some(status) = patch.status {
            assignments.push("status = ?");
            values.push(Value::Text(status.as_str().to_string()));
        }
        values.push(Value::Integer(task_id));

        let sql = format!("UPDATE tasks SET {} WHERE id = ?", assignments.join(", "));

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let changed = tx.execute(&sql, params_from_iter(values.iter()))?;
            if changed == 0 {
                return Ok(None);
            }

            let updated = get_task_internal(&tx, task_id)?;
            tx.commit()?;

            debug!(task_id, fields = assignments.len(), "Updated task");
            Ok(updated)
        })
    }

    /// Delete a task permanently. Returns `false` if it did not exist.
    pub fn delete_task(&self, task_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
            if deleted > 0 {
                debug!(task_id, "Deleted task");
            }
            Ok(deleted > 0)
        })
    }
}
