//! Authentication and authorization logic.
//!
//! Password hashing, token signing, permission gates and the account
//! workflow built on top of them. Storage and notification are reached
//! through the contracts in [`crate::store`] and [`crate::notify`].

pub mod guard;
pub mod jwt;
pub mod password;
pub mod service;

use thiserror::Error;

/// Authentication errors.
///
/// Messages are user-facing; the HTTP layer passes them through unchanged
/// except for `Storage` and `Internal`.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidCredential(String),

    #[error("{0}")]
    AccessDenied(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// PostgreSQL `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// Unique constraint on `users.email`.
const USERS_EMAIL_KEY: &str = "users_email_key";

impl From<sqlx::Error> for AuthError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e
            && db.code().as_deref() == Some(UNIQUE_VIOLATION)
        {
            let message = match db.constraint() {
                Some(USERS_EMAIL_KEY) => "Account with this email already exists",
                _ => "Record already exists",
            };
            return AuthError::Conflict(message.into());
        }
        AuthError::Storage(e.to_string())
    }
}
