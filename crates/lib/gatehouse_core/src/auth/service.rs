//! Account workflow: signup, app-scoped login, logout, account administration,
//! app membership management and password reset.
//!
//! Every failure is logged here, where it originates, and then returned
//! unchanged to the caller. Nothing is retried.
//!
//! The ledger records issued tokens but does not decide their validity.
//! Deleting a ledger row (logout) leaves the signed token usable until it
//! expires, unless `strict_revocation` is enabled, in which case
//! [`AuthService::authenticate`] also requires the ledger row.

use std::sync::Arc;

use chrono::Duration;
use tracing::{error, info, warn};

use super::AuthError;
use super::guard::{self, Gate};
use super::jwt::{LINK_TOKEN_TTL_SECS, TokenCodec};
use super::password;
use crate::models::auth::{
    AccessTokenRecord, AccountDetails, AccountStatus, AppMembership, LoginOutcome,
    MessageResponse, NewUser, Permission, Profile, ProfileUpdate, PublicUser, TokenClaims, User,
    UserPatch, UserUpdate,
};
use crate::notify::Notifier;
use crate::store::{AccessTokenLedger, UserDirectory};

/// Knobs that are not part of any collaborator.
#[derive(Debug, Clone, Default)]
pub struct ServiceSettings {
    /// Base URL of the account front-end, used in emailed links.
    pub client_url: String,
    /// Apps whose tokens are accepted at the authorization gate. Empty admits all.
    pub allowed_app_ids: Vec<String>,
    /// Require a ledger entry for every presented token.
    pub strict_revocation: bool,
}

/// Business logic over the user directory, token ledger and notifier.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserDirectory>,
    tokens: Arc<dyn AccessTokenLedger>,
    notifier: Arc<dyn Notifier>,
    codec: TokenCodec,
    settings: ServiceSettings,
}

fn log_failure(operation: &str, err: &AuthError) {
    match err {
        AuthError::Storage(_) | AuthError::Notification(_) | AuthError::Internal(_) => {
            error!(operation, error = %err, "auth operation failed")
        }
        _ => warn!(operation, error = %err, "auth operation rejected"),
    }
}

fn user_not_found() -> AuthError {
    AuthError::NotFound("User not found".into())
}

/// bcrypt is CPU-bound; keep it off the async workers.
async fn hash_off_thread(password: String, salt: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || password::hash_password(&password, &salt))
        .await
        .map_err(|e| AuthError::Internal(format!("hash task: {e}")))?
}

async fn verify_off_thread(
    candidate: String,
    stored_hash: String,
    salt: String,
) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || {
        password::verify_password(&candidate, &stored_hash, &salt)
    })
    .await
    .map_err(|e| AuthError::Internal(format!("verify task: {e}")))?
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        tokens: Arc<dyn AccessTokenLedger>,
        notifier: Arc<dyn Notifier>,
        codec: TokenCodec,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            users,
            tokens,
            notifier,
            codec,
            settings,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn ledger(&self) -> &dyn AccessTokenLedger {
        self.tokens.as_ref()
    }

    // -----------------------------------------------------------------------
    // Authorization boundary
    // -----------------------------------------------------------------------

    /// Resolve the caller from an `Authorization` header value.
    pub async fn authenticate(&self, header: Option<&str>) -> Result<TokenClaims, AuthError> {
        let result = async {
            let header = header
                .ok_or_else(|| AuthError::InvalidCredential("Missing authorization header".into()))?;
            let token = guard::bearer_token(header).ok_or_else(|| {
                AuthError::InvalidCredential("Invalid authorization scheme".into())
            })?;
            let claims = self
                .codec
                .verify(token)
                .ok_or_else(|| AuthError::InvalidCredential("Invalid or expired token".into()))?;

            if !self.settings.allowed_app_ids.is_empty()
                && !self.settings.allowed_app_ids.contains(&claims.app.app_id)
            {
                return Err(AuthError::AccessDenied("Access Denied".into()));
            }

            if self.settings.strict_revocation && self.tokens.find_by_token(token).await?.is_none()
            {
                return Err(AuthError::InvalidCredential("Token has been revoked".into()));
            }
            Ok::<_, AuthError>(claims)
        }
        .await;
        result.inspect_err(|e| log_failure("authenticate", e))
    }

    /// Apply a permission gate to already-resolved claims.
    pub fn authorize(&self, gate: Gate, claims: &TokenClaims) -> Result<(), AuthError> {
        guard::authorize(gate, claims).inspect_err(|e| log_failure("authorize", e))
    }

    // -----------------------------------------------------------------------
    // Directory passthroughs
    // -----------------------------------------------------------------------

    pub async fn get_all_users(&self) -> Result<Vec<PublicUser>, AuthError> {
        let result = self.users.find_all().await;
        result
            .map(|users| users.iter().map(PublicUser::from).collect())
            .inspect_err(|e| log_failure("get_all_users", e))
    }

    pub async fn get_user_by_id(&self, id: &str) -> Result<PublicUser, AuthError> {
        let result = async {
            let user = self.users.find_by_id(id).await?.ok_or_else(user_not_found)?;
            Ok::<_, AuthError>(PublicUser::from(&user))
        }
        .await;
        result.inspect_err(|e| log_failure("get_user_by_id", e))
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<PublicUser, AuthError> {
        let result = async {
            let user = self
                .users
                .find_by_email(email)
                .await?
                .ok_or_else(user_not_found)?;
            Ok::<_, AuthError>(PublicUser::from(&user))
        }
        .await;
        result.inspect_err(|e| log_failure("get_user_by_email", e))
    }

    pub async fn delete_user(&self, id: &str) -> Result<MessageResponse, AuthError> {
        let result = async {
            self.users.delete(id).await?.ok_or_else(user_not_found)?;
            info!(user_id = id, "user deleted");
            Ok::<_, AuthError>(MessageResponse::new("User deleted"))
        }
        .await;
        result.inspect_err(|e| log_failure("delete_user", e))
    }

    /// The user as seen from `app_id`. A missing membership is not an error.
    pub async fn get_profile(&self, user_id: &str, app_id: &str) -> Result<Profile, AuthError> {
        let result = async {
            let user = self
                .users
                .find_by_id(user_id)
                .await?
                .ok_or_else(user_not_found)?;
            let app = user.membership(app_id);
            Ok::<_, AuthError>(Profile {
                id: user.id.clone(),
                email: user.email.clone(),
                account_status: user.account_status,
                permission: app
                    .map(|a| a.permission.as_str().to_string())
                    .unwrap_or_default(),
                app_id: app.map(|a| a.app_id.clone()).unwrap_or_default(),
            })
        }
        .await;
        result.inspect_err(|e| log_failure("get_profile", e))
    }

    // -----------------------------------------------------------------------
    // Account creation and sessions
    // -----------------------------------------------------------------------

    /// Self-service registration. No token is issued.
    pub async fn signup(&self, details: AccountDetails) -> Result<MessageResponse, AuthError> {
        let result = async {
            let user = self.register(details, Vec::new()).await?;
            info!(user_id = %user.id, email = %user.email, "account signed up");
            Ok::<_, AuthError>(MessageResponse::new("Account created successfully"))
        }
        .await;
        result.inspect_err(|e| log_failure("signup", e))
    }

    /// Administrative account creation with one initial membership. The new
    /// user receives a one-day token by notification only.
    pub async fn create_account(
        &self,
        details: AccountDetails,
        membership: AppMembership,
    ) -> Result<MessageResponse, AuthError> {
        let result = async {
            let user = self.register(details, vec![membership]).await?;
            let app = user
                .apps
                .first()
                .ok_or_else(|| AuthError::Internal("created user has no membership".into()))?;

            let claims = TokenClaims::for_membership(&user, app);
            let token = self
                .codec
                .sign_with_ttl(&claims, Duration::seconds(LINK_TOKEN_TTL_SECS))?;
            self.tokens.create(&token, &app.app_id, &user.id).await?;

            let link = format!("{}/change-password?token={}", self.settings.client_url, token);
            self.notifier
                .send(&user.email, "Account Created", &link)
                .await?;

            info!(user_id = %user.id, app_id = %app.app_id, "account created");
            Ok::<_, AuthError>(MessageResponse::new("Account created successfully"))
        }
        .await;
        result.inspect_err(|e| log_failure("create_account", e))
    }

    async fn register(
        &self,
        details: AccountDetails,
        apps: Vec<AppMembership>,
    ) -> Result<User, AuthError> {
        if self.users.find_by_email(&details.email).await?.is_some() {
            return Err(AuthError::Conflict(
                "Account with this email already exists".into(),
            ));
        }
        let salt = password::generate_salt();
        let password_hash = hash_off_thread(details.password, salt.clone()).await?;
        self.users
            .create(NewUser {
                first_name: details.first_name,
                last_name: details.last_name,
                email: details.email,
                password_hash,
                salt,
                account_status: AccountStatus::Active,
                apps,
            })
            .await
    }

    /// App-scoped login. Checks run in a fixed order so each rejection has
    /// its own reason.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        redirect_url: &str,
        redirect_app_id: &str,
    ) -> Result<LoginOutcome, AuthError> {
        let result = async {
            let user = self
                .users
                .find_by_email(email)
                .await?
                .ok_or_else(|| AuthError::NotFound("Account not found".into()))?;

            let valid = verify_off_thread(
                password.to_string(),
                user.password_hash.clone(),
                user.salt.clone(),
            )
            .await?;
            if !valid {
                return Err(AuthError::InvalidCredential(
                    "Invalid email or password".into(),
                ));
            }

            if user.account_status == AccountStatus::Inactive {
                return Err(AuthError::AccessDenied(
                    "Access Denied. Account is not active".into(),
                ));
            }

            let app = user
                .membership(redirect_app_id)
                .ok_or_else(|| AuthError::NotFound("App not found".into()))?;

            let claims = TokenClaims::for_membership(&user, app);
            let token = self.codec.sign(&claims)?;
            self.tokens.create(&token, redirect_app_id, &user.id).await?;

            info!(user_id = %user.id, app_id = redirect_app_id, "login succeeded");
            Ok::<_, AuthError>(LoginOutcome {
                redirect_url_with_token: format!("{redirect_url}?token={token}"),
                token,
            })
        }
        .await;
        result.inspect_err(|e| log_failure("login", e))
    }

    /// Remove every ledger entry for the pair. Idempotent.
    pub async fn logout(&self, app_id: &str, user_id: &str) -> Result<MessageResponse, AuthError> {
        let result = async {
            let removed = self.tokens.delete_by_app_and_user(app_id, user_id).await?;
            info!(user_id, app_id, removed, "logged out");
            Ok::<_, AuthError>(MessageResponse::new("Logged out successfully"))
        }
        .await;
        result.inspect_err(|e| log_failure("logout", e))
    }

    /// Ledger entry for a presented token value.
    pub async fn lookup_token(&self, token: &str) -> Result<AccessTokenRecord, AuthError> {
        let result = async {
            let record = self
                .tokens
                .find_by_token(token)
                .await?
                .ok_or_else(|| AuthError::NotFound("Token not found".into()))?;
            Ok::<_, AuthError>(record)
        }
        .await;
        result.inspect_err(|e| log_failure("lookup_token", e))
    }

    /// Delete the ledger entry for one token value. Idempotent.
    pub async fn revoke_token(&self, token: &str) -> Result<MessageResponse, AuthError> {
        let result = async {
            let removed = self.tokens.delete_by_token(token).await?;
            info!(removed, "token ledger entry deleted");
            Ok::<_, AuthError>(MessageResponse::new("Token deleted"))
        }
        .await;
        result.inspect_err(|e| log_failure("revoke_token", e))
    }

    // -----------------------------------------------------------------------
    // Profile and status
    // -----------------------------------------------------------------------

    pub async fn update_profile(
        &self,
        user_id: &str,
        profile: ProfileUpdate,
    ) -> Result<MessageResponse, AuthError> {
        let result = async {
            self.users
                .update(user_id, profile.into())
                .await?
                .ok_or_else(user_not_found)?;
            Ok::<_, AuthError>(MessageResponse::new("Profile updated successfully"))
        }
        .await;
        result.inspect_err(|e| log_failure("update_profile", e))
    }

    pub async fn update_user(&self, id: &str, patch: UserPatch) -> Result<PublicUser, AuthError> {
        let result = async {
            let user = self
                .users
                .update(id, patch.into())
                .await?
                .ok_or_else(user_not_found)?;
            Ok::<_, AuthError>(PublicUser::from(&user))
        }
        .await;
        result.inspect_err(|e| log_failure("update_user", e))
    }

    pub async fn change_account_status(
        &self,
        user_id: &str,
        account_status: AccountStatus,
    ) -> Result<MessageResponse, AuthError> {
        let result = async {
            let update = UserUpdate {
                account_status: Some(account_status),
                ..Default::default()
            };
            self.users
                .update(user_id, update)
                .await?
                .ok_or_else(user_not_found)?;
            info!(user_id, status = %account_status, "account status changed");
            Ok::<_, AuthError>(MessageResponse::new("Account status updated successfully"))
        }
        .await;
        result.inspect_err(|e| log_failure("change_account_status", e))
    }

    // -----------------------------------------------------------------------
    // App memberships (read-modify-write, not isolated from concurrent writers)
    // -----------------------------------------------------------------------

    /// Append a membership. An existing membership for the same app is kept,
    /// so the list may end up holding both.
    pub async fn add_app(
        &self,
        membership: AppMembership,
        user_id: &str,
    ) -> Result<MessageResponse, AuthError> {
        let result = async {
            let mut user = self
                .users
                .find_by_id(user_id)
                .await?
                .ok_or_else(user_not_found)?;
            let app_id = membership.app_id.clone();
            user.apps.push(membership);
            self.write_apps(&user.id, user.apps).await?;
            info!(user_id, app_id = %app_id, "app added");
            Ok::<_, AuthError>(MessageResponse::new("App added successfully"))
        }
        .await;
        result.inspect_err(|e| log_failure("add_app", e))
    }

    /// Rewrite the permission of every membership for `app_id`.
    pub async fn update_app(
        &self,
        app_id: &str,
        permission: Permission,
        user_id: &str,
    ) -> Result<MessageResponse, AuthError> {
        let result = async {
            let user = self
                .users
                .find_by_id(user_id)
                .await?
                .ok_or_else(user_not_found)?;
            let apps = user
                .apps
                .into_iter()
                .map(|app| {
                    if app.app_id == app_id {
                        AppMembership { permission, ..app }
                    } else {
                        app
                    }
                })
                .collect();
            self.write_apps(&user.id, apps).await?;
            info!(user_id, app_id, %permission, "app permission updated");
            Ok::<_, AuthError>(MessageResponse::new("App updated successfully"))
        }
        .await;
        result.inspect_err(|e| log_failure("update_app", e))
    }

    /// Drop every membership for `app_id`.
    pub async fn remove_app(
        &self,
        app_id: &str,
        user_id: &str,
    ) -> Result<MessageResponse, AuthError> {
        let result = async {
            let user = self
                .users
                .find_by_id(user_id)
                .await?
                .ok_or_else(user_not_found)?;
            let apps = user
                .apps
                .into_iter()
                .filter(|app| app.app_id != app_id)
                .collect();
            self.write_apps(&user.id, apps).await?;
            info!(user_id, app_id, "app removed");
            Ok::<_, AuthError>(MessageResponse::new("App removed successfully"))
        }
        .await;
        result.inspect_err(|e| log_failure("remove_app", e))
    }

    async fn write_apps(&self, user_id: &str, apps: Vec<AppMembership>) -> Result<(), AuthError> {
        let update = UserUpdate {
            apps: Some(apps),
            ..Default::default()
        };
        self.users
            .update(user_id, update)
            .await?
            .map(|_| ())
            .ok_or_else(user_not_found)
    }

    // -----------------------------------------------------------------------
    // Password reset
    // -----------------------------------------------------------------------

    /// Email a one-day reset link bound to the user's membership in
    /// `redirect_app_id`. The token is recorded in the ledger like any other.
    pub async fn forgot_password(
        &self,
        email: &str,
        redirect_app_id: &str,
        redirect_url: &str,
    ) -> Result<MessageResponse, AuthError> {
        let result = async {
            let user = self
                .users
                .find_by_email(email)
                .await?
                .ok_or_else(user_not_found)?;
            let app = user
                .membership(redirect_app_id)
                .ok_or_else(|| AuthError::NotFound("Redirect app not found".into()))?;

            let claims = TokenClaims::for_membership(&user, app);
            let token = self
                .codec
                .sign_with_ttl(&claims, Duration::seconds(LINK_TOKEN_TTL_SECS))?;
            self.tokens.create(&token, redirect_app_id, &user.id).await?;

            let link = format!(
                "{}/reset-password?token={}&redirectUrl={}",
                self.settings.client_url, token, redirect_url
            );
            self.notifier.send(email, "Reset Password", &link).await?;

            info!(user_id = %user.id, app_id = redirect_app_id, "password reset link sent");
            Ok::<_, AuthError>(MessageResponse::new("Reset password email sent successfully"))
        }
        .await;
        result.inspect_err(|e| log_failure("forgot_password", e))
    }

    /// Set a new password for the authenticated caller.
    pub async fn reset_password(
        &self,
        new_password: &str,
        claims: &TokenClaims,
    ) -> Result<bool, AuthError> {
        let result = async {
            let salt = password::generate_salt();
            let password_hash = hash_off_thread(new_password.to_string(), salt.clone()).await?;
            let update = UserUpdate {
                password_hash: Some(password_hash),
                salt: Some(salt),
                ..Default::default()
            };
            self.users
                .update(&claims.id, update)
                .await?
                .ok_or_else(user_not_found)?;
            info!(user_id = %claims.id, "password reset");
            Ok::<_, AuthError>(true)
        }
        .await;
        result.inspect_err(|e| log_failure("reset_password", e))
    }
}
