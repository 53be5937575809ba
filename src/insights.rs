//! Open-work insights.
//!
//! Aggregates the open tasks into a total, a per-priority distribution and a
//! due-soon count, then renders a short natural-language summary. The store
//! is reached only through [`TaskQuery`], so any backend (or an in-memory
//! fake in tests) can feed the computation.

use crate::types::{Priority, Task, TaskStatus};
use anyhow::Result;
use chrono::{Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Length of the due-soon window in days, today included.
pub const DUE_SOON_WINDOW_DAYS: u64 = 7;

/// Order used to pick the dominant priority when counts tie.
pub const TIE_BREAK_ORDER: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

/// Read-only task queries the insights computation relies on.
///
/// Only [`list_by_status`](TaskQuery::list_by_status) is required; the
/// aggregate queries default to in-memory aggregation over it and can be
/// overridden with native queries.
pub trait TaskQuery {
    /// All tasks with the given status, in no particular order.
    fn list_by_status(&self, status: TaskStatus) -> Result<Vec<Task>>;

    /// Per-priority counts of tasks with the given status.
    fn count_by_priority(&self, status: TaskStatus) -> Result<PriorityDistribution> {
        let mut distribution = PriorityDistribution::default();
        for task in self.list_by_status(status)? {
            distribution.add(task.priority, 1);
        }
        Ok(distribution)
    }

    /// Count of tasks with the given status due within `[start, end]`, both inclusive.
    fn count_due_between(&self, status: TaskStatus, start: NaiveDate, end: NaiveDate) -> Result<u64> {
        let count = self
            .list_by_status(status)?
            .iter()
            .filter(|task| task.due_date >= start && task.due_date <= end)
            .count();
        Ok(count as u64)
    }
}

/// Count of open tasks per priority. Every priority is always present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityDistribution {
    #[serde(rename = "Low")]
    pub low: u64,
    #[serde(rename = "Medium")]
    pub medium: u64,
    #[serde(rename = "High")]
    pub high: u64,
}

impl PriorityDistribution {
    pub fn get(&self, priority: Priority) -> u64 {
        match priority {
            Priority::Low => self.low,
            Priority::Medium => self.medium,
            Priority::High => self.high,
        }
    }

    pub fn add(&mut self, priority: Priority, count: u64) {
        match priority {
            Priority::Low => self.low += count,
            Priority::Medium => self.medium += count,
            Priority::High => self.high += count,
        }
    }

    pub fn total(&self) -> u64 {
        self.low + self.medium + self.high
    }

    /// Priority with the most tasks, ties resolved by [`TIE_BREAK_ORDER`].
    /// Medium when there are no tasks at all.
    pub fn dominant(&self) -> Priority {
        if self.total() == 0 {
            return Priority::Medium;
        }

        let mut best = TIE_BREAK_ORDER[0];
        for priority in &TIE_BREAK_ORDER[1..] {
            if self.get(*priority) > self.get(best) {
                best = *priority;
            }
        }
        best
    }
}

/// Summary returned by `GET /insights`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightsSummary {
    pub total_open: u64,
    pub priority_distribution: PriorityDistribution,
    pub due_soon_count: u64,
    pub insight: String,
}

/// Today's date in UTC, the default reference date.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Inclusive due-soon window starting at `reference`.
pub fn due_soon_window(reference: NaiveDate) -> (NaiveDate, NaiveDate) {
    let end = reference
        .checked_add_days(Days::new(DUE_SOON_WINDOW_DAYS - 1))
        .unwrap_or(NaiveDate::MAX);
    (reference, end)
}

/// Compute the insights summary for the open tasks in `store`.
pub fn compute_insights<Q>(store: &Q, reference_date: NaiveDate) -> Result<InsightsSummary>
where
    Q: TaskQuery + ?Sized,
{
    let priority_distribution = store.count_by_priority(TaskStatus::Open)?;
    let total_open = priority_distribution.total();

    let (window_start, window_end) = due_soon_window(reference_date);
    let due_soon_count = store.count_due_between(TaskStatus::Open, window_start, window_end)?;

    let insight = render_insight(total_open, &priority_distribution, due_soon_count);

    Ok(InsightsSummary {
        total_open,
        priority_distribution,
        due_soon_count,
        insight,
    })
}

/// Render the human-readable summary sentence.
pub fn render_insight(
    total_open: u64,
    distribution: &PriorityDistribution,
    due_soon_count: u64,
) -> String {
    let mut sentences = Vec::with_capacity(4);

    sentences.push(format!(
        "You have {} open task{}.",
        total_open,
        if total_open == 1 { "" } else { "s" }
    ));

    if due_soon_count > 0 {
        sentences.push(format!(
            "{} {} due in the next {} days.",
            due_soon_count,
            if due_soon_count == 1 { "is" } else { "are" },
            DUE_SOON_WINDOW_DAYS
        ));
    }

    sentences.push(format!(
        "Most of your open tasks are {} priority.",
        distribution.dominant()
    ));

    sentences.push(format!(
        "Priority breakdown \u{2014} High: {}, Medium: {}, Low: {}.",
        distribution.high, distribution.medium, distribution.low
    ));

    sentences.join(" ")
}
