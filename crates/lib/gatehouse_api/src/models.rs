//! Request and response bodies for the HTTP surface.
//!
//! Request fields default to empty so that a missing field reaches
//! validation and is reported by name instead of as a JSON rejection.

use gatehouse_core::models::auth::{Profile, PublicUser};
use serde::{Deserialize, Serialize};

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SignupRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

/// Administrative account creation. The target app comes from `?appId=`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateAccountRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub permission: String,
    pub app_label: String,
    pub app_address: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub redirect_url: String,
    pub redirect_app_id: String,
}

/// Both fields fall back to the caller's own token.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LogoutRequest {
    pub app_id: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProfileUpdateRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserUpdateRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub account_status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AccountStatusRequest {
    pub user_id: String,
    pub account_status: String,
}

/// Adds or rewrites a membership. Label and address only apply on add.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppMembershipRequest {
    pub user_id: String,
    pub app_id: String,
    pub permission: String,
    pub app_label: String,
    pub app_address: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RemoveAppRequest {
    pub user_id: String,
    pub app_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    pub email: String,
    pub redirect_app_id: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResetPasswordRequest {
    pub password: String,
}

// ---------------------------------------------------------------------------
// Query strings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IdQuery {
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EmailQuery {
    pub email: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProfileQuery {
    pub id: String,
    pub app_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppIdQuery {
    pub app_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TokenQuery {
    pub token: String,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct UserListResponse {
    pub users: Vec<PublicUser>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub user: PublicUser,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileResponse {
    pub user: Profile,
}

/// Logout wraps its confirmation under `result`.
#[derive(Debug, Clone, Serialize)]
pub struct LogoutResponse {
    pub result: gatehouse_core::models::auth::MessageResponse,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetPasswordResponse {
    pub success: bool,
}
