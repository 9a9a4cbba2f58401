//! User directory handlers.

use axum::extract::{Query, State};
use axum::{Extension, Json};
use gatehouse_core::models::auth::MessageResponse;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{
    AccountStatusRequest, EmailQuery, IdQuery, ProfileQuery, ProfileResponse,
    ProfileUpdateRequest, UserListResponse, UserResponse, UserUpdateRequest,
};
use crate::validation::{self, Validate};

/// `GET /user/list`: every user, credentials stripped.
pub async fn list_users(State(state): State<AppState>) -> AppResult<Json<UserListResponse>> {
    let users = state.auth.get_all_users().await?;
    Ok(Json(UserListResponse { users }))
}

/// `GET /user/findById?id=`
pub async fn find_by_id(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<UserResponse>> {
    let id = validation::required(&query.id, "User ID is required")?;
    let user = state.auth.get_user_by_id(&id).await?;
    Ok(Json(UserResponse { user }))
}

/// `GET /users/findByEmail?email=`
pub async fn find_by_email(
    State(state): State<AppState>,
    Query(query): Query<EmailQuery>,
) -> AppResult<Json<UserResponse>> {
    let email = validation::email(&query.email)?;
    let user = state.auth.get_user_by_email(&email).await?;
    Ok(Json(UserResponse { user }))
}

/// `GET /user/profile?id=&appId=`: the user as seen from one app.
pub async fn get_profile(
    State(state): State<AppState>,
    Query(query): Query<ProfileQuery>,
) -> AppResult<Json<ProfileResponse>> {
    let id = validation::required(&query.id, "User ID is required")?;
    let user = state.auth.get_profile(&id, query.app_id.trim()).await?;
    Ok(Json(ProfileResponse { user }))
}

/// `PUT /user/profile`: the caller edits their own names and email.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    Json(body): Json<ProfileUpdateRequest>,
) -> AppResult<Json<MessageResponse>> {
    let profile = body.validate()?;
    let resp = state.auth.update_profile(&claims.id, profile).await?;
    Ok(Json(resp))
}

/// `PUT /user/update?id=`: administrative edit of any user.
pub async fn update_user(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
    Json(body): Json<UserUpdateRequest>,
) -> AppResult<Json<UserResponse>> {
    let id = validation::required(&query.id, "User ID is required")?;
    let patch = body.validate()?;
    let user = state.auth.update_user(&id, patch).await?;
    Ok(Json(UserResponse { user }))
}

/// `PUT /user/status`: activate or deactivate an account.
pub async fn change_account_status(
    State(state): State<AppState>,
    Json(body): Json<AccountStatusRequest>,
) -> AppResult<Json<MessageResponse>> {
    let (user_id, status) = body.validate()?;
    let resp = state.auth.change_account_status(&user_id, status).await?;
    Ok(Json(resp))
}

/// `DELETE /user/delete?id=`
pub async fn delete_user(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<MessageResponse>> {
    let id = validation::required(&query.id, "User ID is required")?;
    let resp = state.auth.delete_user(&id).await?;
    Ok(Json(resp))
}
