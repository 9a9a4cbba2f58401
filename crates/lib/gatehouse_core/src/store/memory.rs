//! In-process stores backed by `tokio::sync::RwLock`.
//!
//! Used by tests and by the server's `--memory` mode. Nothing survives a
//! restart.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AccessTokenLedger, UserDirectory};
use crate::auth::AuthError;
use crate::models::auth::{AccessTokenRecord, NewUser, User, UserUpdate};

fn email_taken() -> AuthError {
    AuthError::Conflict("Account with this email already exists".into())
}

/// Users kept in insertion order.
#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    users: RwLock<Vec<User>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_all(&self) -> Result<Vec<User>, AuthError> {
        Ok(self.users.read().await.clone())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AuthError> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, AuthError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == user.email) {
            return Err(email_taken());
        }
        let now = Utc::now();
        let record = User {
            id: Uuid::now_v7().to_string(),
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            password_hash: user.password_hash,
            salt: user.salt,
            account_status: user.account_status,
            apps: user.apps,
            created_at: now,
            updated_at: now,
        };
        users.push(record.clone());
        Ok(record)
    }

    async fn update(&self, id: &str, update: UserUpdate) -> Result<Option<User>, AuthError> {
        let mut users = self.users.write().await;
        if let Some(email) = &update.email
            && users.iter().any(|u| u.id != id && &u.email == email)
        {
            return Err(email_taken());
        }
        Ok(users.iter_mut().find(|u| u.id == id).map(|user| {
            user.apply(update);
            user.clone()
        }))
    }

    async fn delete(&self, id: &str) -> Result<Option<User>, AuthError> {
        let mut users = self.users.write().await;
        Ok(users
            .iter()
            .position(|u| u.id == id)
            .map(|idx| users.remove(idx)))
    }
}

/// Token records kept in issue order.
#[derive(Debug, Default)]
pub struct MemoryTokenLedger {
    records: RwLock<Vec<AccessTokenRecord>>,
}

impl MemoryTokenLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccessTokenLedger for MemoryTokenLedger {
    async fn create(
        &self,
        token: &str,
        app_id: &str,
        user_id: &str,
    ) -> Result<AccessTokenRecord, AuthError> {
        let record = AccessTokenRecord {
            token: token.to_string(),
            app_id: app_id.to_string(),
            user_id: user_id.to_string(),
            created_at: Utc::now(),
        };
        self.records.write().await.push(record.clone());
        Ok(record)
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<AccessTokenRecord>, AuthError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|r| r.token == token)
            .cloned())
    }

    async fn find_by_app_and_user(
        &self,
        app_id: &str,
        user_id: &str,
    ) -> Result<Vec<AccessTokenRecord>, AuthError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.app_id == app_id && r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete_by_token(&self, token: &str) -> Result<u64, AuthError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.token != token);
        Ok((before - records.len()) as u64)
    }

    async fn delete_by_app_and_user(&self, app_id: &str, user_id: &str) -> Result<u64, AuthError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| !(r.app_id == app_id && r.user_id == user_id));
        Ok((before - records.len()) as u64)
    }
}
