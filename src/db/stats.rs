//! Aggregation queries backing the insights summary.

use super::Database;
use super::tasks::{TASK_COLUMNS, parse_task_row};
use crate::insights::{PriorityDistribution, TaskQuery};
use crate::types::{DATE_FORMAT, Priority, Task, TaskStatus};
use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::params;
use tracing::warn;

impl TaskQuery for Database {
    fn list_by_status(&self, status: TaskStatus) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM tasks WHERE status = ?1",
                TASK_COLUMNS
            ))?;
            let tasks = stmt
                .query_map(params![status.as_str()], parse_task_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tasks)
        })
    }

    fn count_by_priority(&self, status: TaskStatus) -> Result<PriorityDistribution> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT priority, COUNT(*) FROM tasks WHERE status = ?1 GROUP BY priority",
            )?;
            let rows = stmt
                .query_map(params![status.as_str()], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut distribution = PriorityDistribution::default();
            for (priority, count) in rows {
                match priority.parse::<Priority>() {
                    Ok(priority) => distribution.add(priority, count.max(0) as u64),
                    Err(e) => warn!("Skipping unexpected priority in tasks table: {}", e),
                }
            }
            Ok(distribution)
        })
    }

    fn count_due_between(&self, status: TaskStatus, start: NaiveDate, end: NaiveDate) -> Result<u64> {
        let Some((start, end)) = stored_date_bounds(start, end) else {
            return Ok(0);
        };
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM tasks
                 WHERE status = ?1 AND due_date BETWEEN ?2 AND ?3",
                params![status.as_str(), start, end],
                |row| row.get(0),
            )?;
            Ok(count.max(0) as u64)
        })
    }
}

/// Clamp `[start, end]` to the four-digit years `due_date` can hold and format
/// both ends as stored text, which orders like the dates themselves.
/// `None` when no stored date can fall inside the range.
fn stored_date_bounds(start: NaiveDate, end: NaiveDate) -> Option<(String, String)> {
    let first = NaiveDate::from_ymd_opt(0, 1, 1)?;
    let last = NaiveDate::from_ymd_opt(9999, 12, 31)?;
    let start = start.max(first);
    let end = end.min(last);
    (start <= end).then(|| {
        (
            start.format(DATE_FORMAT).to_string(),
            end.format(DATE_FORMAT).to_string(),
        )
    })
}
