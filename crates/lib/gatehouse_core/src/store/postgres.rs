//! PostgreSQL-backed stores.
//!
//! Memberships live in `user_apps`, ordered by `position`. Replacing a user's
//! memberships rewrites the whole list inside one transaction.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{AccessTokenLedger, UserDirectory};
use crate::auth::AuthError;
use crate::models::auth::{AccessTokenRecord, AppMembership, NewUser, User, UserUpdate};

type UserRow = (
    Uuid,
    String,
    String,
    String,
    String,
    String,
    String,
    DateTime<Utc>,
    DateTime<Utc>,
);

type AppRow = (Uuid, String, String, String, String);

const USER_COLUMNS: &str = "id, first_name, last_name, email, password_hash, salt, \
                            account_status, created_at, updated_at";

/// Ids that are not UUIDs cannot exist in the tables.
fn parse_id(id: &str) -> Option<Uuid> {
    Uuid::parse_str(id).ok()
}

fn user_from_row(row: UserRow, apps: Vec<AppMembership>) -> Result<User, AuthError> {
    let (id, first_name, last_name, email, password_hash, salt, status, created_at, updated_at) =
        row;
    Ok(User {
        id: id.to_string(),
        first_name,
        last_name,
        email,
        password_hash,
        salt,
        account_status: status.parse().map_err(AuthError::Storage)?,
        apps,
        created_at,
        updated_at,
    })
}

fn membership_from_row(row: AppRow) -> Result<(Uuid, AppMembership), AuthError> {
    let (user_id, app_id, app_label, app_address, permission) = row;
    Ok((
        user_id,
        AppMembership {
            app_id,
            app_label,
            app_address,
            permission: permission.parse().map_err(AuthError::Storage)?,
        },
    ))
}

/// User directory over `users` and `user_apps`.
#[derive(Debug, Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn apps_for(&self, user_id: Uuid) -> Result<Vec<AppMembership>, AuthError> {
        let rows = sqlx::query_as::<_, AppRow>(
            "SELECT user_id, app_id, app_label, app_address, permission \
             FROM user_apps WHERE user_id = $1 ORDER BY position",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| membership_from_row(row).map(|(_, app)| app))
            .collect()
    }

    async fn hydrate(&self, row: Option<UserRow>) -> Result<Option<User>, AuthError> {
        match row {
            None => Ok(None),
            Some(row) => {
                let apps = self.apps_for(row.0).await?;
                user_from_row(row, apps).map(Some)
            }
        }
    }
}

async fn replace_apps(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    apps: &[AppMembership],
) -> Result<(), AuthError> {
    sqlx::query("DELETE FROM user_apps WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    for (position, app) in apps.iter().enumerate() {
        sqlx::query(
            "INSERT INTO user_apps (user_id, position, app_id, app_label, app_address, permission) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(user_id)
        .bind(position as i32)
        .bind(&app.app_id)
        .bind(&app.app_label)
        .bind(&app.app_address)
        .bind(app.permission.as_str())
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_all(&self) -> Result<Vec<User>, AuthError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        let app_rows = sqlx::query_as::<_, AppRow>(
            "SELECT user_id, app_id, app_label, app_address, permission \
             FROM user_apps ORDER BY user_id, position",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut apps: HashMap<Uuid, Vec<AppMembership>> = HashMap::new();
        for row in app_rows {
            let (user_id, app) = membership_from_row(row)?;
            apps.entry(user_id).or_default().push(app);
        }

        rows.into_iter()
            .map(|row| {
                let user_apps = apps.remove(&row.0).unwrap_or_default();
                user_from_row(row, user_apps)
            })
            .collect()
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AuthError> {
        let Some(id) = parse_id(id) else {
            return Ok(None);
        };
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        self.hydrate(row).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        self.hydrate(row).await
    }

    async fn create(&self, user: NewUser) -> Result<User, AuthError> {
        let id = Uuid::now_v7();
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO users (id, first_name, last_name, email, password_hash, salt, account_status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.salt)
        .bind(user.account_status.as_str())
        .execute(&mut *tx)
        .await?;
        replace_apps(&mut tx, id, &user.apps).await?;
        tx.commit().await?;

        self.find_by_id(&id.to_string())
            .await?
            .ok_or_else(|| AuthError::Storage("created user not readable".into()))
    }

    async fn update(&self, id: &str, update: UserUpdate) -> Result<Option<User>, AuthError> {
        let Some(uid) = parse_id(id) else {
            return Ok(None);
        };
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query_scalar::<_, Uuid>(
            "UPDATE users SET \
                first_name = COALESCE($2, first_name), \
                last_name = COALESCE($3, last_name), \
                email = COALESCE($4, email), \
                password_hash = COALESCE($5, password_hash), \
                salt = COALESCE($6, salt), \
                account_status = COALESCE($7, account_status), \
                updated_at = now() \
             WHERE id = $1 RETURNING id",
        )
        .bind(uid)
        .bind(update.first_name)
        .bind(update.last_name)
        .bind(update.email)
        .bind(update.password_hash)
        .bind(update.salt)
        .bind(update.account_status.map(|s| s.as_str()))
        .fetch_optional(&mut *tx)
        .await?;

        if updated.is_none() {
            return Ok(None);
        }
        if let Some(apps) = &update.apps {
            replace_apps(&mut tx, uid, apps).await?;
        }
        tx.commit().await?;
        self.find_by_id(id).await
    }

    async fn delete(&self, id: &str) -> Result<Option<User>, AuthError> {
        let Some(existing) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        let Some(uid) = parse_id(id) else {
            return Ok(None);
        };
        let removed = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(uid)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok((removed > 0).then_some(existing))
    }
}

type TokenRow = (String, String, Uuid, DateTime<Utc>);

fn record_from_row((token, app_id, user_id, created_at): TokenRow) -> AccessTokenRecord {
    AccessTokenRecord {
        token,
        app_id,
        user_id: user_id.to_string(),
        created_at,
    }
}

/// Token ledger over `access_tokens`.
#[derive(Debug, Clone)]
pub struct PgTokenLedger {
    pool: PgPool,
}

impl PgTokenLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccessTokenLedger for PgTokenLedger {
    async fn create(
        &self,
        token: &str,
        app_id: &str,
        user_id: &str,
    ) -> Result<AccessTokenRecord, AuthError> {
        let uid = parse_id(user_id)
            .ok_or_else(|| AuthError::Storage(format!("invalid user id '{user_id}'")))?;
        let row = sqlx::query_as::<_, TokenRow>(
            "INSERT INTO access_tokens (id, token, app_id, user_id) VALUES ($1, $2, $3, $4) \
             RETURNING token, app_id, user_id, created_at",
        )
        .bind(Uuid::now_v7())
        .bind(token)
        .bind(app_id)
        .bind(uid)
        .fetch_one(&self.pool)
        .await?;
        Ok(record_from_row(row))
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<AccessTokenRecord>, AuthError> {
        let row = sqlx::query_as::<_, TokenRow>(
            "SELECT token, app_id, user_id, created_at FROM access_tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(record_from_row))
    }

    async fn find_by_app_and_user(
        &self,
        app_id: &str,
        user_id: &str,
    ) -> Result<Vec<AccessTokenRecord>, AuthError> {
        let Some(uid) = parse_id(user_id) else {
            return Ok(Vec::new());
        };
        let rows = sqlx::query_as::<_, TokenRow>(
            "SELECT token, app_id, user_id, created_at FROM access_tokens \
             WHERE app_id = $1 AND user_id = $2 ORDER BY created_at",
        )
        .bind(app_id)
        .bind(uid)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(record_from_row).collect())
    }

    async fn delete_by_token(&self, token: &str) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM access_tokens WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_by_app_and_user(&self, app_id: &str, user_id: &str) -> Result<u64, AuthError> {
        let Some(uid) = parse_id(user_id) else {
            return Ok(0);
        };
        let result = sqlx::query("DELETE FROM access_tokens WHERE app_id = $1 AND user_id = $2")
            .bind(app_id)
            .bind(uid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
