/// Authentication utilities
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and validation
/// - [`jwt`]: access/refresh token issuing and validation
/// - [`login`]: company login, registration and password changes
///
/// # Security Features
///
/// - **Password Hashing**: Argon2id with 64 MB memory, 3 iterations
/// - **JWT Tokens**: HS256, carrying the user id and the company id
/// - **No plaintext**: user documents only ever hold the PHC hash
///
/// # Example
///
/// ```
/// use biztask_shared::auth::password::{hash_password, verify_password};
/// use biztask_shared::auth::jwt::{issue_token_pair, validate_access_token};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("matkhau")?;
/// assert!(verify_password("matkhau", &hash)?);
///
/// let (user_id, company_id) = (Uuid::new_v4(), Uuid::new_v4());
/// let pair = issue_token_pair(user_id, company_id, "secret-key")?;
/// let claims = validate_access_token(&pair.access_token, "secret-key")?;
/// assert_eq!(claims.company_id, company_id);
/// # Ok(())
/// # }
/// ```

pub mod jwt;
pub mod login;
pub mod password;
