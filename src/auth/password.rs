/// Password Hashing and Verification
///
/// bcrypt hashes; the cost factor comes from configuration.

use bcrypt::{hash, verify};

use crate::error::AppError;

/// Hash a password using bcrypt
///
/// # Errors
/// Returns error if the cost is out of range or hashing fails
pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    hash(password, cost).map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its hash
///
/// A hash that bcrypt cannot parse (e.g. an unusable-password marker) never
/// matches.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match verify(password, hash) {
        Ok(valid) => valid,
        Err(e) => {
            tracing::warn!("Stored password hash could not be checked: {}", e);
            false
        }
    }
}
