//! Storage contracts for users and issued tokens.
//!
//! Absence is reported as `Ok(None)` (or an empty list / zero count), never as
//! an error. Implementations are responsible for per-record atomicity only;
//! callers that read, modify and write back a user are not protected against
//! concurrent writers.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::auth::AuthError;
use crate::models::auth::{AccessTokenRecord, NewUser, User, UserUpdate};

pub use memory::{MemoryTokenLedger, MemoryUserDirectory};
pub use postgres::{PgTokenLedger, PgUserDirectory};

/// User accounts and their app memberships.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_all(&self) -> Result<Vec<User>, AuthError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AuthError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;

    /// Persist a new user. Fails with `Conflict` when the email is taken.
    async fn create(&self, user: NewUser) -> Result<User, AuthError>;

    /// Apply a partial update, returning the updated user.
    async fn update(&self, id: &str, update: UserUpdate) -> Result<Option<User>, AuthError>;

    /// Remove a user, returning the removed record.
    async fn delete(&self, id: &str) -> Result<Option<User>, AuthError>;
}

/// Ledger of issued tokens, used for revocation bookkeeping.
#[async_trait]
pub trait AccessTokenLedger: Send + Sync {
    async fn create(
        &self,
        token: &str,
        app_id: &str,
        user_id: &str,
    ) -> Result<AccessTokenRecord, AuthError>;

    async fn find_by_token(&self, token: &str) -> Result<Option<AccessTokenRecord>, AuthError>;

    async fn find_by_app_and_user(
        &self,
        app_id: &str,
        user_id: &str,
    ) -> Result<Vec<AccessTokenRecord>, AuthError>;

    /// Returns the number of records removed.
    async fn delete_by_token(&self, token: &str) -> Result<u64, AuthError>;

    /// Removes every record for the pair. Returns the number removed.
    async fn delete_by_app_and_user(&self, app_id: &str, user_id: &str) -> Result<u64, AuthError>;
}
