/// Task documents
///
/// A task is assigned by a manager-tier user to exactly one assignee and moves
/// through a fixed lifecycle.
///
/// # State Machine
///
/// ```text
/// TODO → IN_PROGRESS → COMPLETED
/// ```
///
/// Transitions never go backwards. `completed_at` is set exactly when the
/// status is `COMPLETED`.
///
/// # Document
///
/// ```json
/// {
///   "id": "3a0c…",
///   "companyId": "5d1c…",
///   "title": "Báo cáo quý 3",
///   "description": "Tổng hợp doanh thu",
///   "assigneeId": "0b7f…",
///   "creatorId": "91aa…",
///   "dueDate": "2024-09-30T10:00:00Z",
///   "status": "IN_PROGRESS",
///   "priority": "HIGH",
///   "createdAt": "2024-09-01T02:00:00Z",
///   "completedAt": null,
///   "attachments": ["data:image/jpeg;base64,…"],
///   "completionImage": null
/// }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Assigned, not yet started
    Todo,

    /// Being worked on
    InProgress,

    /// Done, `completed_at` is stamped
    Completed,
}

impl TaskStatus {
    /// Converts status to its stored string
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "TODO",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Completed => "COMPLETED",
        }
    }

    /// Report label
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "Chờ xử lý",
            TaskStatus::InProgress => "Đang làm",
            TaskStatus::Completed => "Đã xong",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }

    /// Checks if transition to target status is valid
    pub fn can_transition_to(&self, target: TaskStatus) -> bool {
        matches!(
            (self, target),
            (TaskStatus::Todo, TaskStatus::InProgress)
                | (TaskStatus::InProgress, TaskStatus::Completed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "LOW",
            TaskPriority::Medium => "MEDIUM",
            TaskPriority::High => "HIGH",
            TaskPriority::Urgent => "URGENT",
        }
    }

    /// Report label
    pub fn label(&self) -> &'static str {
        match self {
            TaskPriority::Low => "Thấp",
            TaskPriority::Medium => "Trung bình",
            TaskPriority::High => "Cao",
            TaskPriority::Urgent => "Khẩn cấp",
        }
    }
}

/// Task document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique task ID
    pub id: Uuid,

    /// Company this task belongs to
    pub company_id: Uuid,

    pub title: String,

    #[serde(default)]
    pub description: String,

    /// User responsible for the work
    pub assignee_id: Uuid,

    /// User who created the task
    pub creator_id: Uuid,

    pub due_date: DateTime<Utc>,

    pub status: TaskStatus,

    #[serde(default)]
    pub priority: TaskPriority,

    pub created_at: DateTime<Utc>,

    /// Set iff status is `COMPLETED`
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,

    /// Inline `data:` images supplied at creation
    #[serde(default)]
    pub attachments: Vec<String>,

    /// Proof image supplied on completion
    #[serde(default)]
    pub completion_image: Option<String>,
}

impl Task {
    /// Not completed and past its due date
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_completed() && self.due_date < now
    }

    /// Completed after its due date
    ///
    /// Returns `false` for tasks that are not completed.
    pub fn is_late(&self) -> bool {
        match self.completed_at {
            Some(done) if self.status.is_completed() => done > self.due_date,
            _ => false,
        }
    }

    /// Whether the `completed_at` stamp agrees with the status
    pub fn completion_is_consistent(&self) -> bool {
        self.status.is_completed() == self.completed_at.is_some()
    }
}
