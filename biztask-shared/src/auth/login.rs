/// Company login and registration
///
/// A login is identified by the company name and the login name within that
/// company; the same login name may exist in different companies.
///
/// # Example
///
/// ```no_run
/// use biztask_shared::auth::login::{login, register, Registration};
/// use biztask_shared::gateway::memory::MemoryGateway;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let gateway = MemoryGateway::new();
/// register(&gateway, Registration {
///     company_name: "Công ty ABC".to_string(),
///     name: "Nguyễn Văn A".to_string(),
///     username: "giamdoc".to_string(),
///     password: "matkhau".to_string(),
/// }).await?;
///
/// let user = login(&gateway, "Công ty ABC", "giamdoc", "matkhau").await?;
/// assert_eq!(user.username, "giamdoc");
/// # Ok(())
/// # }
/// ```

use super::password::{hash_password, validate_new_password, verify_password, PasswordError};
use crate::gateway::{Gateway, StoreError};
use crate::models::user::User;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Sai tên công ty, tài khoản hoặc mật khẩu")]
    InvalidCredentials,

    #[error("Vui lòng điền đầy đủ thông tin")]
    MissingFields,

    #[error("Tên đăng nhập đã tồn tại trong công ty này")]
    UsernameTaken,

    #[error("{0}")]
    WeakPassword(String),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Sign-up form for a new company
#[derive(Debug, Clone)]
pub struct Registration {
    pub company_name: String,
    /// Display name of the founding director
    pub name: String,
    pub username: String,
    pub password: String,
}

/// Checks credentials and returns the stored user
pub async fn login(
    gateway: &dyn Gateway,
    company_name: &str,
    username: &str,
    password: &str,
) -> Result<User, AuthError> {
    let company_name = company_name.trim();
    let username = username.trim();

    let user = gateway
        .find_user_for_login(company_name, username)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    match verify_password(password, &user.password_hash) {
        Ok(true) => {
            info!(user_id = %user.id, company_id = %user.company_id, "User logged in");
            Ok(user)
        }
        Ok(false) => Err(AuthError::InvalidCredentials),
        Err(e) => {
            warn!(user_id = %user.id, error = %e, "Stored password hash is unusable");
            Err(AuthError::InvalidCredentials)
        }
    }
}

/// Creates a company and its founding director
pub async fn register(gateway: &dyn Gateway, form: Registration) -> Result<User, AuthError> {
    let company_name = form.company_name.trim();
    let name = form.name.trim();
    let username = form.username.trim();

    if company_name.is_empty() || name.is_empty() || username.is_empty() || form.password.is_empty()
    {
        return Err(AuthError::MissingFields);
    }
    validate_new_password(&form.password).map_err(AuthError::WeakPassword)?;

    if gateway.username_exists(company_name, username).await? {
        return Err(AuthError::UsernameTaken);
    }

    let founder = User::founder(company_name, name, username, hash_password(&form.password)?);
    gateway.register_company(&founder).await?;

    info!(
        user_id = %founder.id,
        company_id = %founder.company_id,
        company_name = %founder.company_name,
        "Company registered"
    );

    Ok(founder)
}

/// Copy of `user` with a freshly hashed password
pub fn with_new_password(user: &User, new_password: &str) -> Result<User, AuthError> {
    validate_new_password(new_password).map_err(AuthError::WeakPassword)?;

    let mut updated = user.clone();
    updated.password_hash = hash_password(new_password)?;
    Ok(updated)
}
