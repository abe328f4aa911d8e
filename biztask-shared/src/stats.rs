/// Dashboard and team statistics
///
/// All figures are full scans over an in-memory snapshot. "This month" means
/// the calendar month of `now` in the [`ReportZone`].

use crate::calendar::{days_left, ReportZone};
use crate::models::task::{Task, TaskStatus};
use crate::models::user::{PublicUser, User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Days-left window counted as "due soon"
pub const DUE_SOON_DAYS: i64 = 3;

/// Entries shown on the leaderboard
pub const LEADERBOARD_SIZE: usize = 5;

/// Months in the completion trend
pub const TREND_MONTHS: u32 = 12;

/// Rounded percentage, 0 when there is nothing to divide by
fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    ((part * 200 + whole) / (whole * 2)) as u32
}

/// Headline numbers on the dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub pending: usize,
    pub in_progress: usize,
    pub overdue_total: usize,
    /// Open, not overdue, due within [`DUE_SOON_DAYS`]
    pub due_soon_total: usize,
    pub urgent_total: usize,
    pub created_month: usize,
    pub completed_month: usize,
    /// Share of this month's completions that were late
    pub overdue_rate: u32,
}

fn is_due_soon(task: &Task, now: DateTime<Utc>) -> bool {
    !task.status.is_completed()
        && !task.is_overdue(now)
        && (0..=DUE_SOON_DAYS).contains(&days_left(task.due_date, now))
}

/// Computes the dashboard figures over an already role-scoped list
pub fn dashboard(tasks: &[Task], zone: &ReportZone, now: DateTime<Utc>) -> DashboardStats {
    let mut stats = DashboardStats::default();
    let mut late_completed_month = 0;

    for task in tasks {
        match task.status {
            TaskStatus::Todo => stats.pending += 1,
            TaskStatus::InProgress => stats.in_progress += 1,
            TaskStatus::Completed => {}
        }

        if task.is_overdue(now) {
            stats.overdue_total += 1;
        } else if is_due_soon(task, now) {
            stats.due_soon_total += 1;
        }

        if zone.same_month(task.created_at, now) {
            stats.created_month += 1;
        }

        if let Some(done) = task.completed_at.filter(|_| task.status.is_completed()) {
            if zone.same_month(done, now) {
                stats.completed_month += 1;
                if task.is_late() {
                    late_completed_month += 1;
                }
            }
        }
    }

    stats.urgent_total = stats.overdue_total + stats.due_soon_total;
    stats.overdue_rate = percent(late_completed_month, stats.completed_month);
    stats
}

/// One bar of the completion trend chart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    /// `T{m}`
    pub label: String,
    /// `Tháng {m}/{yyyy}`
    pub full_label: String,
    pub count: usize,
}

/// Completions per month for the last [`TREND_MONTHS`] months, oldest first
pub fn completion_trend(tasks: &[Task], zone: &ReportZone, now: DateTime<Utc>) -> Vec<TrendPoint> {
    zone.trailing_months(now, TREND_MONTHS)
        .into_iter()
        .map(|(year, month)| {
            let count = tasks
                .iter()
                .filter(|t| t.status.is_completed())
                .filter_map(|t| t.completed_at)
                .filter(|done| zone.month_of(*done) == (year, month))
                .count();
            TrendPoint {
                label: format!("T{}", month),
                full_label: format!("Tháng {}/{}", month, year),
                count,
            }
        })
        .collect()
}

/// Workload of one team member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamStat {
    pub user: PublicUser,
    pub todo: usize,
    pub doing: usize,
    pub done: usize,
    pub overdue: usize,
    /// todo + doing
    pub backlog: usize,
    pub done_month: usize,
    pub on_time_rate: u32,
}

fn team_stat(user: &User, tasks: &[Task], zone: &ReportZone, now: DateTime<Utc>) -> TeamStat {
    let mine = tasks.iter().filter(|t| t.assignee_id == user.id);

    let (mut todo, mut doing, mut done, mut overdue) = (0, 0, 0, 0);
    let (mut done_month, mut late_month) = (0, 0);

    for task in mine {
        match task.status {
            TaskStatus::Todo => todo += 1,
            TaskStatus::InProgress => doing += 1,
            TaskStatus::Completed => {
                done += 1;
                // Older documents may lack the completion stamp.
                let finished = task.completed_at.unwrap_or(task.due_date);
                if zone.same_month(finished, now) {
                    done_month += 1;
                    if task.is_late() {
                        late_month += 1;
                    }
                }
            }
        }
        if task.is_overdue(now) {
            overdue += 1;
        }
    }

    TeamStat {
        user: PublicUser::from(user),
        todo,
        doing,
        done,
        overdue,
        backlog: todo + doing,
        done_month,
        on_time_rate: percent(done_month - late_month, done_month),
    }
}

/// Per-member workload, heaviest backlog first
pub fn team_stats(
    users: &[User],
    tasks: &[Task],
    zone: &ReportZone,
    now: DateTime<Utc>,
) -> Vec<TeamStat> {
    let mut stats: Vec<TeamStat> = users
        .iter()
        .map(|user| team_stat(user, tasks, zone, now))
        .collect();
    stats.sort_by(|a, b| b.backlog.cmp(&a.backlog));
    stats
}

/// Top employees by completions this month
pub fn leaderboard(team: &[TeamStat]) -> Vec<TeamStat> {
    let mut board: Vec<TeamStat> = team
        .iter()
        .filter(|s| !s.user.role.is_manager_tier())
        .cloned()
        .collect();
    board.sort_by(|a, b| b.done_month.cmp(&a.done_month));
    board.truncate(LEADERBOARD_SIZE);
    board
}

/// Company-wide tasks created this month
pub fn tasks_created_this_month(tasks: &[Task], zone: &ReportZone, now: DateTime<Utc>) -> usize {
    tasks
        .iter()
        .filter(|t| zone.same_month(t.created_at, now))
        .count()
}

/// TODO tasks waiting for a non-manager user; always 0 for the manager tier
pub fn pending_badge_count(user: &User, tasks: &[Task]) -> usize {
    if user.role.is_manager_tier() {
        return 0;
    }
    tasks
        .iter()
        .filter(|t| t.assignee_id == user.id && t.status == TaskStatus::Todo)
        .count()
}
