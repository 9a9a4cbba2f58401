//! Identity domain models.
//!
//! `User` is the stored record and carries credential material; it is never
//! serialized. Everything that crosses the API boundary goes through
//! [`PublicUser`], [`Profile`] or the token types below.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Permission tier attached to a single app membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Permission {
    Read,
    Write,
    Admin,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Read => "READ",
            Permission::Write => "WRITE",
            Permission::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "READ" => Ok(Permission::Read),
            "WRITE" => Ok(Permission::Write),
            "ADMIN" => Ok(Permission::Admin),
            other => Err(format!("{other} is not supported")),
        }
    }
}

/// Whether an account may log in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountStatus {
    #[default]
    Active,
    Inactive,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "Active",
            AccountStatus::Inactive => "Inactive",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(AccountStatus::Active),
            "Inactive" => Ok(AccountStatus::Inactive),
            other => Err(format!("{other} is not supported")),
        }
    }
}

/// One user's relationship to one consuming application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppMembership {
    pub app_id: String,
    #[serde(default)]
    pub app_label: String,
    #[serde(default)]
    pub app_address: String,
    pub permission: Permission,
}

impl AppMembership {
    /// Membership with no label or address, as granted by `add_app`.
    pub fn new(app_id: impl Into<String>, permission: Permission) -> Self {
        Self {
            app_id: app_id.into(),
            app_label: String::new(),
            app_address: String::new(),
            permission,
        }
    }
}

/// Stored user record, including credential material.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub salt: String,
    pub account_status: AccountStatus,
    pub apps: Vec<AppMembership>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// First membership for `app_id`, if any.
    pub fn membership(&self, app_id: &str) -> Option<&AppMembership> {
        self.apps.iter().find(|app| app.app_id == app_id)
    }

    /// Apply a partial update in place. Fields left as `None` are untouched.
    pub fn apply(&mut self, update: UserUpdate) {
        if let Some(v) = update.first_name {
            self.first_name = v;
        }
        if let Some(v) = update.last_name {
            self.last_name = v;
        }
        if let Some(v) = update.email {
            self.email = v;
        }
        if let Some(v) = update.password_hash {
            self.password_hash = v;
        }
        if let Some(v) = update.salt {
            self.salt = v;
        }
        if let Some(v) = update.account_status {
            self.account_status = v;
        }
        if let Some(v) = update.apps {
            self.apps = v;
        }
        self.updated_at = Utc::now();
    }
}

/// Record handed to the directory on creation. The directory assigns the id.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub salt: String,
    pub account_status: AccountStatus,
    pub apps: Vec<AppMembership>,
}

/// Partial update of a stored user.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub salt: Option<String>,
    pub account_status: Option<AccountStatus>,
    pub apps: Option<Vec<AppMembership>>,
}

/// Fields supplied by a caller creating an account.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

/// Self-service profile fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

/// Administrative user fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub account_status: Option<AccountStatus>,
}

impl From<ProfileUpdate> for UserUpdate {
    fn from(p: ProfileUpdate) -> Self {
        Self {
            first_name: p.first_name,
            last_name: p.last_name,
            email: p.email,
            ..Default::default()
        }
    }
}

impl From<UserPatch> for UserUpdate {
    fn from(p: UserPatch) -> Self {
        Self {
            first_name: p.first_name,
            last_name: p.last_name,
            email: p.email,
            account_status: p.account_status,
            ..Default::default()
        }
    }
}

/// External view of a user. Never carries the password hash or salt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub account_status: AccountStatus,
    pub apps: Vec<AppMembership>,
}

impl From<&User> for PublicUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.clone(),
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            email: u.email.clone(),
            account_status: u.account_status,
            apps: u.apps.clone(),
        }
    }
}

/// A user as seen from one app. `permission` and `app_id` are empty strings
/// when the user has no membership for the requested app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    pub account_status: AccountStatus,
    pub permission: String,
    pub app_id: String,
}

/// App membership as embedded in a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimsApp {
    pub app_id: String,
    pub permission: Permission,
}

/// Identity carried by a signed token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    /// User ID.
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    pub account_status: AccountStatus,
    pub app: ClaimsApp,
}

impl TokenClaims {
    /// Claims for `user` scoped to `app`.
    pub fn for_membership(user: &User, app: &AppMembership) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            account_status: user.account_status,
            app: ClaimsApp {
                app_id: app.app_id.clone(),
                permission: app.permission,
            },
        }
    }
}

/// Ledger entry for an issued token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenRecord {
    pub token: String,
    pub app_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// Plain confirmation returned by most workflow operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginOutcome {
    pub token: String,
    pub redirect_url_with_token: String,
}
