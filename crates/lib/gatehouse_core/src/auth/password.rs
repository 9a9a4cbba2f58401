//! Salted password hashing via bcrypt.
//!
//! Every user carries its own random salt next to the hash. Verification
//! re-derives the hash under the stored salt and compares the two strings.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bcrypt::Version;
use rand::{Rng, rng};

use super::AuthError;

/// bcrypt cost factor.
const BCRYPT_COST: u32 = 10;

/// bcrypt salt length in bytes.
const SALT_LEN: usize = 16;

/// Generate a fresh random salt, base64-encoded.
pub fn generate_salt() -> String {
    let mut bytes = [0u8; SALT_LEN];
    rng().fill(&mut bytes);
    STANDARD.encode(bytes)
}

/// Hash a password under the given salt (bcrypt, cost 10).
pub fn hash_password(password: &str, salt: &str) -> Result<String, AuthError> {
    let salt = decode_salt(salt)?;
    bcrypt::hash_with_salt(password, BCRYPT_COST, salt)
        .map(|parts| parts.format_for_version(Version::TwoB))
        .map_err(|e| AuthError::Internal(format!("bcrypt hash: {e}")))
}

/// Check a candidate password against a stored hash and salt.
pub fn verify_password(candidate: &str, stored_hash: &str, salt: &str) -> Result<bool, AuthError> {
    let derived = hash_password(candidate, salt)?;
    Ok(constant_time_eq(derived.as_bytes(), stored_hash.as_bytes()))
}

fn decode_salt(salt: &str) -> Result<[u8; SALT_LEN], AuthError> {
    let bytes = STANDARD
        .decode(salt)
        .map_err(|e| AuthError::Internal(format!("salt decode: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| AuthError::Internal("salt must be 16 bytes".into()))
}

/// Byte comparison whose running time depends only on the input length.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
