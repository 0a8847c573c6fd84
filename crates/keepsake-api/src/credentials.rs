use anyhow::anyhow;
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use tracing::info;

use keepsake_db::Database;
use keepsake_db::models::UserRow;

use crate::error::ApiError;

/// Argon2id with a fresh random salt, encoded as a PHC string.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

/// Check a plaintext password against the user's stored hash. An unparseable
/// stored hash never verifies.
pub fn verify(user: &UserRow, password: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(&user.password_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

pub fn find_by_email(db: &Database, email: &str) -> anyhow::Result<Option<UserRow>> {
    db.get_user_by_email(email)
}

/// Register a new user. Blocking: hashing is deliberately slow.
pub fn create_user(db: &Database, email: &str, password: &str) -> Result<i64, ApiError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(ApiError::validation("email and password are required"));
    }

    if db.get_user_by_email(email)?.is_some() {
        return Err(ApiError::DuplicateEmail);
    }

    let password_hash = hash_password(password)?;

    let user_id = db.create_user(email, &password_hash).map_err(|e| {
        // Lost a race against a concurrent signup for the same email.
        if keepsake_db::is_unique_violation(&e) {
            ApiError::DuplicateEmail
        } else {
            ApiError::Internal(e)
        }
    })?;

    info!("User {} registered", user_id);
    Ok(user_id)
}
