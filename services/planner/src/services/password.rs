//! services/planner/src/services/password.rs
//!
//! Salted password hashing for accounts. The salt is stored next to the
//! digest on the account document, both hex encoded.

use argon2::Argon2;
use rand::Rng;
use subtle::ConstantTimeEq;

use crate::error::{AppError, AppResult};

const SALT_LEN: usize = 16;
const DIGEST_LEN: usize = 32;

/// Generates a random per-account salt, hex encoded.
pub fn generate_salt() -> String {
    let salt: [u8; SALT_LEN] = rand::thread_rng().gen();
    hex::encode(salt)
}

/// Hashes a password with Argon2id using the provided hex salt.
pub fn hash_password(password: &str, salt: &str) -> AppResult<String> {
    Ok(hex::encode(derive_digest(password, salt)?))
}

fn derive_digest(password: &str, salt: &str) -> AppResult<[u8; DIGEST_LEN]> {
    let salt = hex::decode(salt)
        .map_err(|e| AppError::InvalidArgument(format!("malformed salt: {}", e)))?;
    let mut digest = [0u8; DIGEST_LEN];
    Argon2::default()
        .hash_password_into(password.as_bytes(), &salt, &mut digest)
        .map_err(|e| AppError::InvalidArgument(format!("password hashing failed: {}", e)))?;
    Ok(digest)
}

/// Verifies a password against a stored digest and salt, comparing the raw
/// digests in constant time. A malformed digest or salt counts as a mismatch.
pub fn verify_password(password: &str, stored_digest: &str, salt: &str) -> bool {
    let (Ok(digest), Ok(stored)) = (derive_digest(password, salt), hex::decode(stored_digest)) else {
        return false;
    };
    digest.as_slice().ct_eq(stored.as_slice()).into()
}
