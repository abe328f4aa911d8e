/// Password hashing for user documents
///
/// User documents carry an Argon2id PHC string in `passwordHash`. Plaintext
/// passwords only exist in request bodies and CSV imports and are hashed before
/// anything is written to the store.
///
/// # Parameters
///
/// - **Algorithm**: Argon2id, version 0x13
/// - **Memory**: 64 MB (65536 KB)
/// - **Iterations**: 3
/// - **Parallelism**: 4
/// - **Output**: 32 bytes
///
/// # Example
///
/// ```
/// use biztask_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("matkhau123")?;
/// assert!(verify_password("matkhau123", &hash)?);
/// assert!(!verify_password("sai", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};

/// Longest accepted password, in characters
pub const MAX_PASSWORD_CHARS: usize = 128;

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashError(String),

    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    /// Stored hash is not a PHC string
    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),
}

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = ParamsBuilder::new()
        .m_cost(65536)
        .t_cost(3)
        .p_cost(4)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    Ok(Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes a password with a fresh random salt
///
/// # Returns
///
/// PHC string, e.g. `$argon2id$v=19$m=65536,t=3,p=4$...`
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

    Ok(hash.to_string())
}

/// Verifies a password against a stored PHC hash
///
/// `Ok(false)` means the password is wrong; `Err` means the stored hash is
/// unusable.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| PasswordError::InvalidHash(format!("Failed to parse hash: {}", e)))?;

    // Parameters come from the PHC string.
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(format!("Verification failed: {}", e))),
    }
}

/// Checks a new password before it is hashed
///
/// Any non-blank password up to [`MAX_PASSWORD_CHARS`] is accepted; companies
/// hand out simple initial passwords through CSV rosters.
pub fn validate_new_password(password: &str) -> Result<(), String> {
    if password.trim().is_empty() {
        return Err("Mật khẩu không được để trống".to_string());
    }

    if password.chars().count() > MAX_PASSWORD_CHARS {
        return Err(format!(
            "Mật khẩu không được dài quá {} ký tự",
            MAX_PASSWORD_CHARS
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password() {
        let hash = hash_password("123456").expect("Hash should succeed");

        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("v=19"));
        assert!(hash.contains("m=65536"));
        assert!(hash.contains("t=3"));
        assert!(hash.contains("p=4"));
    }

    #[test]
    fn test_hash_password_produces_different_salts() {
        let hash1 = hash_password("same").expect("Hash 1 should succeed");
        let hash2 = hash_password("same").expect("Hash 2 should succeed");
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("matkhau").expect("Hash should succeed");

        assert!(verify_password("matkhau", &hash).unwrap());
        assert!(!verify_password("MatKhau", &hash).unwrap());
        assert!(!verify_password("", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_unicode() {
        let hash = hash_password("mật khẩu bí mật").expect("Hash should succeed");
        assert!(verify_password("mật khẩu bí mật", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_plaintext_stored_value_is_error() {
        // A legacy plaintext value in the store is not a PHC string.
        assert!(verify_password("123", "123").is_err());
        assert!(verify_password("password", "$argon2id$invalid").is_err());
    }

    #[test]
    fn test_validate_new_password() {
        assert!(validate_new_password("1").is_ok());
        assert!(validate_new_password("   ").is_err());
        assert!(validate_new_password("").is_err());
        assert!(validate_new_password(&"a".repeat(MAX_PASSWORD_CHARS + 1)).is_err());
    }
}
