//! Account lifecycle handlers: signup, login, logout and password recovery.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use gatehouse_core::models::auth::{AppMembership, LoginOutcome, MessageResponse};

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{
    AppIdQuery, CreateAccountRequest, ForgotPasswordRequest, LoginRequest, LogoutRequest,
    LogoutResponse, ResetPasswordRequest, ResetPasswordResponse, SignupRequest,
};
use crate::validation::{self, Validate};

/// `POST /user/signup`: self-service registration without app memberships.
pub async fn signup(
    State(state): State<AppState>,
    Json(body): Json<SignupRequest>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    let details = body.validate()?;
    let resp = state.auth.signup(details).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

/// `POST /user/login`: app-scoped login returning a session token.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<LoginOutcome>> {
    let body = body.validate()?;
    let resp = state
        .auth
        .login(
            &body.email,
            &body.password,
            &body.redirect_url,
            &body.redirect_app_id,
        )
        .await?;
    Ok(Json(resp))
}

/// `POST /user/logout`: drops ledger entries for an (app, user) pair,
/// defaulting to the caller's own token.
pub async fn logout(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    body: Option<Json<LogoutRequest>>,
) -> AppResult<Json<LogoutResponse>> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let app_id = body.app_id.unwrap_or(claims.app.app_id);
    let user_id = body.user_id.unwrap_or(claims.id);
    let result = state.auth.logout(&app_id, &user_id).await?;
    Ok(Json(LogoutResponse { result }))
}

/// `POST /user/createAccount?appId=`: administrative account creation.
pub async fn create_account(
    State(state): State<AppState>,
    Query(query): Query<AppIdQuery>,
    Json(body): Json<CreateAccountRequest>,
) -> AppResult<Json<MessageResponse>> {
    let app_id = validation::required(&query.app_id, "App ID is required")?;
    let (details, permission, app_label, app_address) = body.validate()?;
    let mut membership = AppMembership::new(app_id, permission);
    membership.app_label = app_label;
    membership.app_address = app_address;
    let resp = state.auth.create_account(details, membership).await?;
    Ok(Json(resp))
}

/// `POST /user/forgot-password`: emails a reset link.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    let body = body.validate()?;
    let resp = state
        .auth
        .forgot_password(&body.email, &body.redirect_app_id, &body.redirect_url)
        .await?;
    Ok(Json(resp))
}

/// `POST /user/reset-password`: sets a new password for the token's user.
pub async fn reset_password(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    Json(body): Json<ResetPasswordRequest>,
) -> AppResult<Json<ResetPasswordResponse>> {
    let password = body.validate()?;
    let success = state.auth.reset_password(&password, &claims).await?;
    Ok(Json(ResetPasswordResponse { success }))
}
