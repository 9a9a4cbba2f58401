//! Authentication middleware: Bearer token verification and tier gates.

use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use gatehouse_core::auth::guard::Gate;
use gatehouse_core::models::auth::TokenClaims;

use crate::AppState;
use crate::error::AppError;

/// Key used to store `TokenClaims` in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub TokenClaims);

/// Axum middleware: verifies `Authorization: Bearer <token>` and injects
/// `AuthenticatedUser` into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let claims = state.auth.authenticate(header).await?;

    request.extensions_mut().insert(AuthenticatedUser(claims));

    Ok(next.run(request).await)
}

/// State for [`require_gate`]: the shared app state plus the gate to apply.
#[derive(Clone)]
pub struct TierGate {
    pub state: AppState,
    pub gate: Gate,
}

impl TierGate {
    pub fn new(state: &AppState, gate: Gate) -> Self {
        Self {
            state: state.clone(),
            gate,
        }
    }
}

/// Axum middleware: admits the request only if the caller's tier passes
/// the gate. Must run inside [`require_auth`].
///
/// ```ignore
/// Router::new()
///     .route("/user/delete", delete(users::delete_user))
///     .route_layer(from_fn_with_state(
///         TierGate::new(&state, Gate::RequireAdminTier),
///         require_gate,
///     ))
/// ```
pub async fn require_gate(
    State(tier): State<TierGate>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(AuthenticatedUser(claims)) = request.extensions().get::<AuthenticatedUser>() else {
        return Err(AppError::Unauthorized("Missing authorization header".into()));
    };
    tier.state.auth.authorize(tier.gate, claims)?;

    Ok(next.run(request).await)
}
