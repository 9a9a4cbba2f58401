//! JWT token signing and verification.

use std::fmt;
use std::path::PathBuf;

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::AuthError;
use crate::models::auth::TokenClaims;

/// Session token lifetime when nothing else is configured: 1 hour.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 60 * 60;

/// Lifetime of tokens embedded in emailed links (account creation, password reset).
pub const LINK_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

/// Payload actually signed: the claims plus registered JWT fields.
///
/// `jti` keeps two tokens issued in the same second for the same membership
/// distinct, which the ledger relies on.
#[derive(Debug, Serialize, Deserialize)]
struct SignedClaims {
    #[serde(flatten)]
    claims: TokenClaims,
    jti: String,
    iat: i64,
    exp: i64,
}

/// Signs and verifies bearer tokens (HS256).
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    default_ttl: Duration,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &[u8], default_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            default_ttl,
        }
    }

    /// Sign with the configured session lifetime.
    pub fn sign(&self, claims: &TokenClaims) -> Result<String, AuthError> {
        self.sign_with_ttl(claims, self.default_ttl)
    }

    /// Sign with an explicit lifetime. A non-positive `ttl` yields an already
    /// expired token; one past the representable date range is an error.
    pub fn sign_with_ttl(&self, claims: &TokenClaims, ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now();
        let expires = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AuthError::Internal("token lifetime out of range".into()))?;
        let signed = SignedClaims {
            claims: claims.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expires.timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &signed, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
    }

    /// Verify a token, returning its claims when the signature is valid and
    /// the expiry lies strictly in the future.
    pub fn verify(&self, token: &str) -> Option<TokenClaims> {
        if token.is_empty() {
            return None;
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        let data = match decode::<SignedClaims>(token, &self.decoding, &validation) {
            Ok(data) => data,
            Err(e) => {
                debug!(error = %e, "token rejected");
                return None;
            }
        };
        if data.claims.exp <= Utc::now().timestamp() {
            debug!("token rejected: expired");
            return None;
        }
        Some(data.claims.claims)
    }
}

/// Resolve the signing secret: env var `JWT_SECRET` → `APP_SECRET` → persisted file.
pub fn resolve_jwt_secret() -> String {
    if let Ok(secret) = std::env::var("JWT_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    if let Ok(secret) = std::env::var("APP_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    let secret_path = jwt_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(&secret_path, &secret);
    info!(path = %secret_path.display(), "generated new JWT secret");
    secret
}

/// Path to the persisted signing secret.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gatehouse")
        .join("jwt-secret")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::{AccountStatus, ClaimsApp, Permission};

    fn codec() -> TokenCodec {
        TokenCodec::new(b"test-secret", Duration::seconds(DEFAULT_TOKEN_TTL_SECS))
    }

    fn claims() -> TokenClaims {
        TokenClaims {
            id: "0190f0e0-0000-7000-8000-000000000001".into(),
            email: "a@x.com".into(),
            account_status: AccountStatus::Active,
            app: ClaimsApp {
                app_id: "app-1".into(),
                permission: Permission::Admin,
            },
        }
    }

    #[test]
    fn round_trip_returns_same_claims() {
        let codec = codec();
        let token = codec.sign(&claims()).unwrap();
        assert_eq!(codec.verify(&token), Some(claims()));
    }

    #[test]
    fn link_ttl_round_trips() {
        let codec = codec();
        let token = codec
            .sign_with_ttl(&claims(), Duration::seconds(LINK_TOKEN_TTL_SECS))
            .unwrap();
        assert_eq!(codec.verify(&token), Some(claims()));
    }

    #[test]
    fn expired_token_is_rejected() {
        let codec = codec();
        let token = codec.sign_with_ttl(&claims(), Duration::seconds(-1)).unwrap();
        assert_eq!(codec.verify(&token), None);
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let codec = codec();
        let token = codec.sign_with_ttl(&claims(), Duration::zero()).unwrap();
        assert_eq!(codec.verify(&token), None);
    }

    #[test]
    fn oversized_ttl_is_an_error() {
        let codec = TokenCodec::new(b"test-secret", Duration::seconds(1_000_000_000_000_000));
        match codec.sign(&claims()) {
            Err(AuthError::Internal(msg)) => assert_eq!(msg, "token lifetime out of range"),
            other => panic!("expected internal error, got {other:?}"),
        }
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = codec().sign(&claims()).unwrap();
        let other = TokenCodec::new(b"other-secret", Duration::hours(1));
        assert_eq!(other.verify(&token), None);
    }

    #[test]
    fn malformed_and_empty_tokens_are_rejected() {
        let codec = codec();
        assert_eq!(codec.verify(""), None);
        assert_eq!(codec.verify("not-a-jwt"), None);
        assert_eq!(codec.verify("a.b.c"), None);
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let codec = codec();
        let token = codec.sign(&claims()).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = base64::Engine::encode(
            &base64::engine::general_purpose::URL_SAFE_NO_PAD,
            br#"{"_id":"x","email":"x","accountStatus":"Active","app":{"appId":"app-1","permission":"ADMIN"},"jti":"j","iat":0,"exp":9999999999}"#,
        );
        parts[1] = &forged;
        assert_eq!(codec.verify(&parts.join(".")), None);
    }

    #[test]
    fn tokens_issued_together_are_distinct() {
        let codec = codec();
        let a = codec.sign(&claims()).unwrap();
        let b = codec.sign(&claims()).unwrap();
        assert_ne!(a, b);
    }
}
