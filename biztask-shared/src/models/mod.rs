/// Document models for BizTask
///
/// Both collections are stored as whole JSON documents. Field names are
/// camelCase and enum values SCREAMING_CASE.
///
/// # Models
///
/// - `user`: company members with their role tier
/// - `task`: assigned work items and their lifecycle status
///
/// # Example
///
/// ```
/// use biztask_shared::models::user::{User, UserRole};
///
/// let boss = User::founder("Cong ty ABC", "Tran Van B", "giamdoc", "$argon2id$...".to_string());
/// assert_eq!(boss.role, UserRole::Director);
/// assert!(boss.role.is_manager_tier());
/// ```

pub mod task;
pub mod user;
