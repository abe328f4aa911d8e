/// User documents and role tiers
///
/// Users live in the `users` collection. Every user belongs to exactly one
/// company; the `company_id` is the tenant-scoping key and no query ever
/// crosses it.
///
/// # Document
///
/// ```json
/// {
///   "id": "0b7f…",
///   "name": "Nguyen Van A",
///   "username": "nhanvien1",
///   "passwordHash": "$argon2id$v=19$…",
///   "companyName": "Cong ty ABC",
///   "companyId": "5d1c…",
///   "role": "EMPLOYEE",
///   "avatar": "https://ui-avatars.com/api/?name=Nguyen%20Van%20A&background=random",
///   "email": "nhanvien1@biz.com"
/// }
/// ```
///
/// Passwords are stored as Argon2id hashes, never in plaintext.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Role tier inside a company
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    /// Company founder, created at registration
    Director,

    /// Assigns tasks and manages the roster
    Manager,

    /// Works on tasks assigned to them
    Employee,
}

impl UserRole {
    /// Converts role to its stored string
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Director => "DIRECTOR",
            UserRole::Manager => "MANAGER",
            UserRole::Employee => "EMPLOYEE",
        }
    }

    /// Display label used in the roster
    pub fn label(&self) -> &'static str {
        match self {
            UserRole::Director => "Giám đốc",
            UserRole::Manager => "Quản lý",
            UserRole::Employee => "Nhân viên",
        }
    }

    /// Directors and managers share the manager tier: they see every company
    /// task, assign work and manage users.
    pub fn is_manager_tier(&self) -> bool {
        matches!(self, UserRole::Director | UserRole::Manager)
    }

    /// Can create tasks for other users
    pub fn can_assign_tasks(&self) -> bool {
        self.is_manager_tier()
    }

    /// Can add, edit, delete and import users
    pub fn can_manage_users(&self) -> bool {
        self.is_manager_tier()
    }

    /// Can view all tasks (not just own)
    pub fn can_view_all_tasks(&self) -> bool {
        self.is_manager_tier()
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user ID
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Login name, unique within a company
    pub username: String,

    /// Argon2id password hash (PHC string)
    pub password_hash: String,

    /// Company name typed at login
    pub company_name: String,

    /// Tenant-scoping key
    pub company_id: Uuid,

    /// Role tier
    pub role: UserRole,

    /// Avatar URL or inline `data:` image
    pub avatar: String,

    /// Optional contact email
    #[serde(default)]
    pub email: Option<String>,
}

/// Input for creating a user inside an existing company
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub name: String,
    pub username: String,
    /// Already hashed with `auth::password::hash_password`
    pub password_hash: String,
    pub role: UserRole,
}

impl User {
    /// Builds a user that joins the company of `member`
    ///
    /// Avatar and email get the same defaults as registration.
    pub fn for_company_of(member: &User, data: CreateUser) -> Self {
        let avatar = default_avatar(&data.name);
        let email = Some(format!("{}@biz.com", data.username));
        Self {
            id: Uuid::new_v4(),
            name: data.name,
            username: data.username,
            password_hash: data.password_hash,
            company_name: member.company_name.clone(),
            company_id: member.company_id,
            role: data.role,
            avatar,
            email,
        }
    }

    /// Builds the founding director of a brand-new company
    pub fn founder(company_name: &str, name: &str, username: &str, password_hash: String) -> Self {
        let domain: String = company_name
            .split_whitespace()
            .collect::<String>()
            .to_lowercase();
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            username: username.to_string(),
            password_hash,
            company_name: company_name.to_string(),
            company_id: Uuid::new_v4(),
            role: UserRole::Director,
            avatar: default_avatar(name),
            email: Some(format!("{}@{}.com", username, domain)),
        }
    }

    /// Whether both users belong to the same company
    pub fn same_company(&self, other: &User) -> bool {
        self.company_id == other.company_id
    }
}

/// User record without password material
///
/// This is what leaves the process: API responses and the local session file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub company_name: String,
    pub company_id: Uuid,
    pub role: UserRole,
    pub avatar: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            username: user.username.clone(),
            company_name: user.company_name.clone(),
            company_id: user.company_id,
            role: user.role,
            avatar: user.avatar.clone(),
            email: user.email.clone(),
        }
    }
}

/// Generated avatar URL for a display name
pub fn default_avatar(name: &str) -> String {
    format!(
        "https://ui-avatars.com/api/?name={}&background=random",
        encode_uri_component(name)
    )
}

/// Percent-encodes everything except the unreserved URI characters
fn encode_uri_component(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => out.push(byte as char),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
