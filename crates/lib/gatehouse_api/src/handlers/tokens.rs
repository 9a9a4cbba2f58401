//! Token ledger audit.

use axum::Json;
use axum::extract::{Query, State};
use gatehouse_core::models::auth::{AccessTokenRecord, MessageResponse};

use crate::AppState;
use crate::error::AppResult;
use crate::models::TokenQuery;
use crate::validation;

/// `GET /token?token=`: ledger entry for an issued token.
pub async fn lookup_token(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> AppResult<Json<AccessTokenRecord>> {
    let token = validation::required(&query.token, "Token is required")?;
    let record = state.auth.lookup_token(&token).await?;
    Ok(Json(record))
}

/// `DELETE /token?token=`: remove one ledger entry.
pub async fn revoke_token(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> AppResult<Json<MessageResponse>> {
    let token = validation::required(&query.token, "Token is required")?;
    let resp = state.auth.revoke_token(&token).await?;
    Ok(Json(resp))
}
