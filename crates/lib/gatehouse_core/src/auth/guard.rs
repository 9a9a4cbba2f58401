//! Permission gates over a caller's app-scoped permission.
//!
//! The admission table is deliberately not a lattice: `RequireAdminTier` is
//! the broadest gate and `RequireReadTier` the narrowest.
//!
//! | Gate                | Admits              |
//! |---------------------|---------------------|
//! | `Authenticated`     | any valid token     |
//! | `RequireReadTier`   | READ                |
//! | `RequireWriteTier`  | WRITE, READ         |
//! | `RequireAdminTier`  | ADMIN, WRITE, READ  |

use super::AuthError;
use crate::models::auth::{Permission, TokenClaims};

/// Authorization predicate evaluated against resolved claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Authenticated,
    RequireReadTier,
    RequireWriteTier,
    RequireAdminTier,
}

impl Gate {
    /// Set membership, not ordering. Keep each arm explicit.
    pub fn admits(self, permission: Permission) -> bool {
        match self {
            Gate::Authenticated => true,
            Gate::RequireReadTier => matches!(permission, Permission::Read),
            Gate::RequireWriteTier => matches!(permission, Permission::Write | Permission::Read),
            Gate::RequireAdminTier => matches!(
                permission,
                Permission::Admin | Permission::Write | Permission::Read
            ),
        }
    }
}

/// Check `claims` against `gate`. The error never names the required tier.
pub fn authorize(gate: Gate, claims: &TokenClaims) -> Result<(), AuthError> {
    if gate.admits(claims.app.permission) {
        Ok(())
    } else {
        Err(AuthError::AccessDenied("Access Denied".into()))
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
