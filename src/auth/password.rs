//! Secret hashing and validation for Gatehouse.
//!
//! Secrets are stored as bcrypt hashes in their canonical modular crypt
//! form, `$2b$10$` followed by 53 characters of salt and digest.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// bcrypt cost factor used for every hash this crate produces.
pub const HASH_COST: u32 = 10;

/// Minimum length of a password chosen through the login endpoint.
pub const MIN_PASSWORD_LENGTH: usize = 8;

static BCRYPT_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$2[abxy]\$(0[4-9]|[12]\d|3[01])\$[./A-Za-z0-9]{53}$").expect("valid bcrypt pattern")
});

/// Password-related errors.
#[derive(Error, Debug)]
pub enum PasswordError {
    /// Password is too short.
    #[error("password must be at least {MIN_PASSWORD_LENGTH} characters")]
    TooShort,

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    HashError(String),

    /// Stored hash is not in bcrypt format.
    #[error("invalid password hash format")]
    InvalidHash,

    /// Password verification failed (wrong password).
    #[error("password verification failed")]
    VerificationFailed,
}

/// Hash a secret with bcrypt at [`HASH_COST`].
///
/// A fresh random salt is generated for every call.
///
/// # Examples
///
/// ```
/// use gatehouse::auth::{hash_secret, is_bcrypt_hash};
///
/// let hash = hash_secret("my_secure_password").unwrap();
/// assert!(hash.starts_with("$2b$10$"));
/// assert!(is_bcrypt_hash(&hash));
/// ```
pub fn hash_secret(secret: &str) -> Result<String, PasswordError> {
    bcrypt::hash(secret, HASH_COST).map_err(|e| PasswordError::HashError(e.to_string()))
}

/// Verify a secret against a stored bcrypt hash.
///
/// The comparison is bcrypt's own, which is constant-time over the digest.
///
/// # Examples
///
/// ```
/// use gatehouse::auth::{hash_secret, verify_secret};
///
/// let hash = hash_secret("my_secure_password").unwrap();
/// assert!(verify_secret("my_secure_password", &hash).is_ok());
/// assert!(verify_secret("wrong_password", &hash).is_err());
/// ```
pub fn verify_secret(secret: &str, hash: &str) -> Result<(), PasswordError> {
    if !is_bcrypt_hash(hash) {
        return Err(PasswordError::InvalidHash);
    }

    match bcrypt::verify(secret, hash) {
        Ok(true) => Ok(()),
        Ok(false) => Err(PasswordError::VerificationFailed),
        Err(_) => Err(PasswordError::InvalidHash),
    }
}

/// Check whether a string is a bcrypt hash in canonical textual form.
///
/// This validates the format only: prefix, cost and the 53 character
/// salt-plus-digest tail.
pub fn is_bcrypt_hash(candidate: &str) -> bool {
    BCRYPT_FORMAT.is_match(candidate)
}

/// Validate a password chosen by a user.
///
/// # Examples
///
/// ```
/// use gatehouse::auth::validate_password;
///
/// assert!(validate_password("short").is_err());
/// assert!(validate_password("valid_password_123").is_ok());
/// ```
pub fn validate_password(password: &str) -> Result<(), PasswordError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PasswordError::TooShort);
    }
    Ok(())
}
