/// Task list views
///
/// Derives what a user sees on the task tab from the company snapshot:
/// role scoping, ordering, the status and completion filters, free-text search
/// and the due-date range. Also the per-task deadline badge.
///
/// Every function is a pure function of its inputs and `now`; views are
/// recomputed from the full snapshot on every request.
///
/// # Order of operations
///
/// 1. scope by role ([`scope_for`])
/// 2. sort ([`sort_for_display`])
/// 3. status filter, completion sub-filter, search, date range ([`apply`])

use crate::calendar::{days_left, ReportZone};
use crate::models::task::{Task, TaskStatus};
use crate::models::user::User;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Status tab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusFilter {
    #[default]
    All,
    Todo,
    InProgress,
    Completed,
    /// Not completed and past due
    Overdue,
}

/// Sub-filter of the COMPLETED tab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompletionFilter {
    #[default]
    All,
    OnTime,
    /// Completed after the due date
    #[serde(alias = "OVERDUE")]
    Late,
}

/// Everything the task tab can filter by
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskQuery {
    pub status: StatusFilter,
    pub completion: CompletionFilter,
    pub search: Option<String>,
    /// Inclusive, calendar date of the due date
    pub from: Option<NaiveDate>,
    /// Inclusive, calendar date of the due date
    pub to: Option<NaiveDate>,
}

/// Tasks visible to a user: everything for the manager tier, own tasks otherwise
pub fn scope_for(user: &User, tasks: &[Task]) -> Vec<Task> {
    tasks
        .iter()
        .filter(|t| t.company_id == user.company_id)
        .filter(|t| user.role.can_view_all_tasks() || t.assignee_id == user.id)
        .cloned()
        .collect()
}

fn display_rank(status: TaskStatus) -> u8 {
    match status {
        TaskStatus::InProgress => 0,
        TaskStatus::Todo => 1,
        TaskStatus::Completed => 2,
    }
}

/// IN_PROGRESS, then TODO, then COMPLETED; ties by ascending due date
///
/// The sort is stable, so equal keys keep their snapshot order.
pub fn sort_for_display(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        display_rank(a.status)
            .cmp(&display_rank(b.status))
            .then_with(|| a.due_date.cmp(&b.due_date))
    });
}

fn matches_status(task: &Task, filter: StatusFilter, now: DateTime<Utc>) -> bool {
    match filter {
        StatusFilter::All => true,
        StatusFilter::Todo => task.status == TaskStatus::Todo,
        StatusFilter::InProgress => task.status == TaskStatus::InProgress,
        StatusFilter::Completed => task.status == TaskStatus::Completed,
        StatusFilter::Overdue => task.is_overdue(now),
    }
}

fn matches_completion(task: &Task, filter: CompletionFilter) -> bool {
    match filter {
        CompletionFilter::All => true,
        _ if task.completed_at.is_none() => false,
        CompletionFilter::OnTime => !task.is_late(),
        CompletionFilter::Late => task.is_late(),
    }
}

fn matches_search(task: &Task, needle: &str) -> bool {
    task.title.to_lowercase().contains(needle) || task.description.to_lowercase().contains(needle)
}

/// Sorts and filters an already scoped list
pub fn apply(
    mut tasks: Vec<Task>,
    query: &TaskQuery,
    zone: &ReportZone,
    now: DateTime<Utc>,
) -> Vec<Task> {
    sort_for_display(&mut tasks);

    let needle = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    tasks
        .into_iter()
        .filter(|t| matches_status(t, query.status, now))
        .filter(|t| query.status != StatusFilter::Completed || matches_completion(t, query.completion))
        .filter(|t| needle.as_deref().map_or(true, |n| matches_search(t, n)))
        .filter(|t| {
            let due = zone.date_of(t.due_date);
            query.from.map_or(true, |from| due >= from) && query.to.map_or(true, |to| due <= to)
        })
        .collect()
}

/// Scope, sort and filter in one call
pub fn visible_tasks(
    user: &User,
    tasks: &[Task],
    query: &TaskQuery,
    zone: &ReportZone,
    now: DateTime<Utc>,
) -> Vec<Task> {
    apply(scope_for(user, tasks), query, zone, now)
}

/// Badge colour tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Urgency {
    Overdue,
    DueToday,
    /// 1 to 3 days left
    Soon,
    /// 4 to 7 days left
    ThisWeek,
    Later,
}

/// Deadline badge shown on open tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadlineInfo {
    pub text: String,
    pub urgency: Urgency,
    pub days_left: i64,
}

/// Badge for a task; `None` once it is completed
pub fn deadline_info(task: &Task, now: DateTime<Utc>) -> Option<DeadlineInfo> {
    if task.status.is_completed() {
        return None;
    }

    let days = days_left(task.due_date, now);
    let (text, urgency) = match days.cmp(&0) {
        Ordering::Less => ("Quá hạn".to_string(), Urgency::Overdue),
        Ordering::Equal => ("Hết hạn hôm nay".to_string(), Urgency::DueToday),
        Ordering::Greater => {
            let urgency = match days {
                1..=3 => Urgency::Soon,
                4..=7 => Urgency::ThisWeek,
                _ => Urgency::Later,
            };
            (format!("Còn {} ngày", days), urgency)
        }
    };

    Some(DeadlineInfo {
        text,
        urgency,
        days_left: days,
    })
}

/// Tasks assigned to one employee: open first, then ascending due date
pub fn employee_tasks(tasks: &[Task], employee_id: uuid::Uuid) -> Vec<Task> {
    let mut list: Vec<Task> = tasks
        .iter()
        .filter(|t| t.assignee_id == employee_id)
        .cloned()
        .collect();
    list.sort_by(|a, b| {
        a.status
            .is_completed()
            .cmp(&b.status.is_completed())
            .then_with(|| a.due_date.cmp(&b.due_date))
    });
    list
}
