/// Task lifecycle engine
///
/// Pure functions that take a task and return the next version of it. Nothing
/// here touches the store; callers persist the result through the gateway.
///
/// # Transitions
///
/// ```text
/// TODO ──advance──▶ IN_PROGRESS ──complete(proof?)──▶ COMPLETED
/// ```
///
/// `advance` on an IN_PROGRESS task does not complete it: completion needs the
/// optional proof image, so it answers [`Advance::NeedsCompletion`] and the
/// caller follows up with [`complete`].
///
/// # Example
///
/// ```
/// use biztask_shared::lifecycle::{advance, complete, Advance};
/// # use biztask_shared::lifecycle::{new_task, TaskDraft};
/// # use biztask_shared::models::user::User;
/// use chrono::{Duration, Utc};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let boss = User::founder("ABC", "Boss", "boss", String::new());
/// # let now = Utc::now();
/// # let task = new_task(TaskDraft {
/// #     title: "Báo cáo".into(),
/// #     due_date: Some(now + Duration::days(2)),
/// #     ..Default::default()
/// # }, &boss, now)?;
/// let started = match advance(&task)? {
///     Advance::Started(task) => task,
///     Advance::NeedsCompletion => unreachable!(),
/// };
/// let done = complete(&started, None, Utc::now())?;
/// assert!(done.completed_at.is_some());
/// # Ok(())
/// # }
/// ```

use crate::models::task::{Task, TaskPriority, TaskStatus};
use crate::models::user::User;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Lifecycle violations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("Công việc đã hoàn thành")]
    AlreadyCompleted,

    /// Completion was requested for a task that has not been started
    #[error("Chỉ có thể hoàn thành công việc đang làm (trạng thái hiện tại: {0})")]
    NotInProgress(TaskStatus),

    #[error("Không thể giao lại công việc đã hoàn thành")]
    ReassignCompleted,

    #[error("Vui lòng nhập tiêu đề và hạn chót!")]
    MissingRequiredFields,
}

/// Outcome of pressing the status button
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    /// TODO moved to IN_PROGRESS
    Started(Task),

    /// Task is IN_PROGRESS; call [`complete`] with an optional proof image
    NeedsCompletion,
}

/// Moves a task one step forward
pub fn advance(task: &Task) -> Result<Advance, LifecycleError> {
    match task.status {
        TaskStatus::Todo => {
            let mut next = task.clone();
            next.status = TaskStatus::InProgress;
            next.completed_at = None;
            Ok(Advance::Started(next))
        }
        TaskStatus::InProgress => Ok(Advance::NeedsCompletion),
        TaskStatus::Completed => Err(LifecycleError::AlreadyCompleted),
    }
}

/// Completes an IN_PROGRESS task, stamping `completed_at = now`
pub fn complete(
    task: &Task,
    proof_image: Option<String>,
    now: DateTime<Utc>,
) -> Result<Task, LifecycleError> {
    match task.status {
        TaskStatus::InProgress => {
            let mut next = task.clone();
            next.status = TaskStatus::Completed;
            next.completed_at = Some(now);
            next.completion_image = proof_image;
            Ok(next)
        }
        TaskStatus::Completed => Err(LifecycleError::AlreadyCompleted),
        status => Err(LifecycleError::NotInProgress(status)),
    }
}

/// Hands a task to another user without touching its status
///
/// The caller checks that `new_assignee_id` belongs to the same company.
pub fn reassign(task: &Task, new_assignee_id: Uuid) -> Result<Task, LifecycleError> {
    if task.status.is_completed() {
        return Err(LifecycleError::ReassignCompleted);
    }
    let mut next = task.clone();
    next.assignee_id = new_assignee_id;
    Ok(next)
}

/// Manager edit of a task's content
///
/// `None` leaves a field unchanged. `attachments` replaces the whole list.
#[derive(Debug, Clone, Default)]
pub struct TaskEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub assignee_id: Option<Uuid>,
    pub priority: Option<TaskPriority>,
    pub attachments: Option<Vec<String>>,
}

/// Applies a content edit; status and timestamps are kept
///
/// A completed task keeps its assignee; naming the current one again is
/// accepted.
pub fn apply_edit(task: &Task, edit: TaskEdit) -> Result<Task, LifecycleError> {
    let mut next = task.clone();

    if task.status.is_completed() && edit.assignee_id.is_some_and(|id| id != task.assignee_id) {
        return Err(LifecycleError::ReassignCompleted);
    }

    if let Some(title) = edit.title {
        if title.trim().is_empty() {
            return Err(LifecycleError::MissingRequiredFields);
        }
        next.title = title;
    }
    if let Some(description) = edit.description {
        next.description = description;
    }
    if let Some(due_date) = edit.due_date {
        next.due_date = due_date;
    }
    if let Some(assignee_id) = edit.assignee_id {
        next.assignee_id = assignee_id;
    }
    if let Some(priority) = edit.priority {
        next.priority = priority;
    }
    if let Some(attachments) = edit.attachments {
        next.attachments = attachments;
    }

    Ok(next)
}

/// Input for a new task
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    /// Defaults to the creator
    pub assignee_id: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Option<TaskPriority>,
    pub attachments: Vec<String>,
}

/// Builds a TODO task in the creator's company
///
/// Title and due date are required. Only manager-tier creators choose the
/// assignee; anyone else is assigned their own task.
pub fn new_task(draft: TaskDraft, creator: &User, now: DateTime<Utc>) -> Result<Task, LifecycleError> {
    let due_date = match draft.due_date {
        Some(due) if !draft.title.trim().is_empty() => due,
        _ => return Err(LifecycleError::MissingRequiredFields),
    };

    let assignee_id = if creator.role.can_assign_tasks() {
        draft.assignee_id.unwrap_or(creator.id)
    } else {
        creator.id
    };

    Ok(Task {
        id: Uuid::new_v4(),
        company_id: creator.company_id,
        title: draft.title,
        description: draft.description,
        assignee_id,
        creator_id: creator.id,
        due_date,
        status: TaskStatus::Todo,
        priority: draft.priority.unwrap_or_default(),
        created_at: now,
        completed_at: None,
        attachments: draft.attachments,
        completion_image: None,
    })
}

/// Manager tier or the assignee
pub fn can_edit_status(user: &User, task: &Task) -> bool {
    user.company_id == task.company_id
        && (user.role.is_manager_tier() || task.assignee_id == user.id)
}

/// Manager tier only
pub fn can_edit_content(user: &User) -> bool {
    user.role.is_manager_tier()
}

/// Manager tier, and the task is still open
pub fn can_reassign(user: &User, task: &Task) -> bool {
    user.role.is_manager_tier()
        && user.company_id == task.company_id
        && !task.status.is_completed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::{CreateUser, UserRole};
    use chrono::Duration;

    fn boss() -> User {
        User::founder("Cong ty ABC", "Giam Doc", "giamdoc", "hash".to_string())
    }

    fn employee_of(boss: &User, username: &str) -> User {
        User::for_company_of(
            boss,
            CreateUser {
                name: username.to_string(),
                username: username.to_string(),
                password_hash: "hash".to_string(),
                role: UserRole::Employee,
            },
        )
    }

    fn draft_for(assignee: Uuid) -> TaskDraft {
        TaskDraft {
            title: "Kiểm kê kho".to_string(),
            description: "Cuối tháng".to_string(),
            assignee_id: Some(assignee),
            due_date: Some(Utc::now() + Duration::days(2)),
            priority: None,
            attachments: vec![],
        }
    }

    #[test]
    fn test_new_task_defaults() {
        let boss = boss();
        let emp = employee_of(&boss, "nv1");
        let now = Utc::now();

        let task = new_task(draft_for(emp.id), &boss, now).unwrap();
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.priority, TaskPriority::Medium);
        assert_eq!(task.assignee_id, emp.id);
        assert_eq!(task.creator_id, boss.id);
        assert_eq!(task.company_id, boss.company_id);
        assert_eq!(task.created_at, now);
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn test_new_task_requires_title_and_due_date() {
        let boss = boss();
        let mut draft = draft_for(boss.id);
        draft.title = "  ".to_string();
        assert_eq!(
            new_task(draft, &boss, Utc::now()),
            Err(LifecycleError::MissingRequiredFields)
        );

        let mut draft = draft_for(boss.id);
        draft.due_date = None;
        assert!(new_task(draft, &boss, Utc::now()).is_err());
    }

    #[test]
    fn test_employee_tasks_are_self_assigned() {
        let boss = boss();
        let emp = employee_of(&boss, "nv1");

        let task = new_task(draft_for(boss.id), &emp, Utc::now()).unwrap();
        assert_eq!(task.assignee_id, emp.id);
    }

    #[test]
    fn test_full_lifecycle() {
        let boss = boss();
        let task = new_task(draft_for(boss.id), &boss, Utc::now()).unwrap();

        let started = match advance(&task).unwrap() {
            Advance::Started(t) => t,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(started.status, TaskStatus::InProgress);
        assert_eq!(advance(&started).unwrap(), Advance::NeedsCompletion);

        let now = Utc::now();
        let done = complete(&started, Some("data:image/jpeg;base64,AA".to_string()), now).unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.completed_at, Some(now));
        assert!(done.completion_is_consistent());
        assert!(done.completion_image.is_some());

        assert_eq!(advance(&done), Err(LifecycleError::AlreadyCompleted));
        assert_eq!(complete(&done, None, now), Err(LifecycleError::AlreadyCompleted));
    }

    #[test]
    fn test_complete_from_todo_is_rejected() {
        let boss = boss();
        let task = new_task(draft_for(boss.id), &boss, Utc::now()).unwrap();
        assert_eq!(
            complete(&task, None, Utc::now()),
            Err(LifecycleError::NotInProgress(TaskStatus::Todo))
        );
    }

    #[test]
    fn test_reassign_keeps_status() {
        let boss = boss();
        let emp = employee_of(&boss, "nv1");
        let task = new_task(draft_for(boss.id), &boss, Utc::now()).unwrap();
        let started = match advance(&task).unwrap() {
            Advance::Started(t) => t,
            other => panic!("unexpected {:?}", other),
        };

        let moved = reassign(&started, emp.id).unwrap();
        assert_eq!(moved.assignee_id, emp.id);
        assert_eq!(moved.status, TaskStatus::InProgress);

        let done = complete(&moved, None, Utc::now()).unwrap();
        assert_eq!(reassign(&done, boss.id), Err(LifecycleError::ReassignCompleted));
    }

    #[test]
    fn test_apply_edit_leaves_status_and_timestamps() {
        let boss = boss();
        let task = new_task(draft_for(boss.id), &boss, Utc::now()).unwrap();

        let edited = apply_edit(
            &task,
            TaskEdit {
                title: Some("Kiểm kê kho (gấp)".to_string()),
                priority: Some(TaskPriority::Urgent),
                attachments: Some(vec!["data:image/jpeg;base64,AA".to_string()]),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(edited.title, "Kiểm kê kho (gấp)");
        assert_eq!(edited.priority, TaskPriority::Urgent);
        assert_eq!(edited.attachments.len(), 1);
        assert_eq!(edited.description, task.description);
        assert_eq!(edited.status, task.status);
        assert_eq!(edited.created_at, task.created_at);

        let blank = TaskEdit {
            title: Some(String::new()),
            ..Default::default()
        };
        assert!(apply_edit(&task, blank).is_err());
    }

    #[test]
    fn test_apply_edit_keeps_completed_assignee() {
        let boss = boss();
        let emp = employee_of(&boss, "nv1");
        let task = new_task(draft_for(boss.id), &boss, Utc::now()).unwrap();
        let started = match advance(&task).unwrap() {
            Advance::Started(t) => t,
            other => panic!("unexpected {:?}", other),
        };
        let done = complete(&started, None, Utc::now()).unwrap();

        let moved = TaskEdit {
            assignee_id: Some(emp.id),
            ..Default::default()
        };
        assert_eq!(apply_edit(&done, moved), Err(LifecycleError::ReassignCompleted));

        let same = TaskEdit {
            title: Some("Kiểm kê kho xong".to_string()),
            assignee_id: Some(boss.id),
            ..Default::default()
        };
        let edited = apply_edit(&done, same).unwrap();
        assert_eq!(edited.assignee_id, boss.id);
        assert_eq!(edited.title, "Kiểm kê kho xong");
        assert_eq!(edited.status, TaskStatus::Completed);
    }

    #[test]
    fn test_permissions() {
        let boss = boss();
        let emp = employee_of(&boss, "nv1");
        let other = employee_of(&boss, "nv2");
        let outsider = User::founder("Khac", "X", "x", "hash".to_string());
        let task = new_task(draft_for(emp.id), &boss, Utc::now()).unwrap();

        assert!(can_edit_status(&boss, &task));
        assert!(can_edit_status(&emp, &task));
        assert!(!can_edit_status(&other, &task));
        assert!(!can_edit_status(&outsider, &task));

        assert!(can_edit_content(&boss));
        assert!(!can_edit_content(&emp));

        assert!(can_reassign(&boss, &task));
        assert!(!can_reassign(&emp, &task));
    }
}
