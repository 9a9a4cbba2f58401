//! App membership handlers. All require the admin tier.

use axum::Json;
use axum::extract::State;
use gatehouse_core::models::auth::MessageResponse;

use crate::AppState;
use crate::error::AppResult;
use crate::models::{AppMembershipRequest, RemoveAppRequest};
use crate::validation::Validate;

/// `POST /user/apps`: append a membership.
pub async fn add_app(
    State(state): State<AppState>,
    Json(body): Json<AppMembershipRequest>,
) -> AppResult<Json<MessageResponse>> {
    let (user_id, membership) = body.validate()?;
    let resp = state.auth.add_app(membership, &user_id).await?;
    Ok(Json(resp))
}

/// `PUT /user/apps`: change the permission held for an app.
pub async fn update_app(
    State(state): State<AppState>,
    Json(body): Json<AppMembershipRequest>,
) -> AppResult<Json<MessageResponse>> {
    let (user_id, membership) = body.validate()?;
    let resp = state
        .auth
        .update_app(&membership.app_id, membership.permission, &user_id)
        .await?;
    Ok(Json(resp))
}

/// `DELETE /user/apps`: drop every membership for an app.
pub async fn remove_app(
    State(state): State<AppState>,
    Json(body): Json<RemoveAppRequest>,
) -> AppResult<Json<MessageResponse>> {
    let (user_id, app_id) = body.validate()?;
    let resp = state.auth.remove_app(&app_id, &user_id).await?;
    Ok(Json(resp))
}
