//! Password hashing for stored credentials
//!
//! Passwords are hashed with Argon2id and stored as PHC strings, so the
//! salt and parameters travel with the hash.

use crate::error::{AppError, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;
use rand::RngCore;

const SALT_SIZE: usize = 16; // 128 bits

/// Hash a password with a fresh random salt
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);

    let salt_string = SaltString::encode_b64(&salt)
        .map_err(|e| AppError::PasswordHash(format!("Salt encoding failed: {}", e)))?;

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt_string)
        .map_err(|e| AppError::PasswordHash(format!("Hashing failed: {}", e)))?;

    Ok(hash.to_string())
}

/// Check a password against a stored PHC hash.
///
/// Returns `Ok(false)` on mismatch; `Err` only when the stored hash itself
/// cannot be parsed.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| AppError::PasswordHash(format!("Malformed stored hash: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AppError::PasswordHash(format!("Verification failed: {}", e))),
    }
}
