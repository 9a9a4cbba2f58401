//! API server configuration.

use gatehouse_core::auth::jwt::{DEFAULT_TOKEN_TTL_SECS, TokenCodec, resolve_jwt_secret};
use gatehouse_core::auth::service::ServiceSettings;

/// Upper bound on the session token lifetime: 30 days.
pub const MAX_TOKEN_TTL_SECS: i64 = 30 * 24 * 60 * 60;

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// JWT signing secret.
    pub jwt_secret: String,
    /// Lifetime of session tokens issued at login, in seconds.
    pub token_ttl_secs: i64,
    /// Base URL of the client that renders account links.
    pub client_url: String,
    /// Apps whose tokens are honoured. Empty admits every app.
    pub allowed_app_ids: Vec<String>,
    /// Reject tokens that no longer have a ledger entry.
    pub strict_revocation: bool,
    /// Webhook that delivers notifications. Notifications are only logged when unset.
    pub notify_webhook_url: Option<String>,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable             | Default                                  |
    /// |----------------------|------------------------------------------|
    /// | `BIND_ADDR`          | `127.0.0.1:3100`                         |
    /// | `DATABASE_URL`       | `postgres://localhost:5432/gatehouse`    |
    /// | `JWT_SECRET` / `APP_SECRET` | generated & persisted to file     |
    /// | `TOKEN_TTL_SECS`     | `3600`, capped at 30 days                |
    /// | `CLIENT_URL`         | `http://localhost:3000`                  |
    /// | `ALLOWED_APP_IDS`    | empty (all apps)                         |
    /// | `STRICT_REVOCATION`  | `false`                                  |
    /// | `NOTIFY_WEBHOOK_URL` | unset                                    |
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3100".into()),
            pg_connection_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/gatehouse".into()),
            jwt_secret: resolve_jwt_secret(),
            token_ttl_secs: std::env::var("TOKEN_TTL_SECS")
                .map(|v| parse_ttl(&v))
                .unwrap_or(DEFAULT_TOKEN_TTL_SECS),
            client_url: std::env::var("CLIENT_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            allowed_app_ids: std::env::var("ALLOWED_APP_IDS")
                .map(|v| parse_list(&v))
                .unwrap_or_default(),
            strict_revocation: std::env::var("STRICT_REVOCATION")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            notify_webhook_url: std::env::var("NOTIFY_WEBHOOK_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
        }
    }

    /// Token codec keyed by the configured secret. The lifetime is clamped
    /// to `1..=MAX_TOKEN_TTL_SECS`.
    pub fn token_codec(&self) -> TokenCodec {
        let secs = self.token_ttl_secs.clamp(1, MAX_TOKEN_TTL_SECS);
        let ttl = chrono::Duration::try_seconds(secs)
            .unwrap_or_else(|| chrono::Duration::seconds(DEFAULT_TOKEN_TTL_SECS));
        TokenCodec::new(self.jwt_secret.as_bytes(), ttl)
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            client_url: self.client_url.trim_end_matches('/').to_string(),
            allowed_app_ids: self.allowed_app_ids.clone(),
            strict_revocation: self.strict_revocation,
        }
    }
}

/// Positive seconds up to `MAX_TOKEN_TTL_SECS`; anything else falls back
/// to the default.
fn parse_ttl(raw: &str) -> i64 {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|secs| (1..=MAX_TOKEN_TTL_SECS).contains(secs))
        .unwrap_or(DEFAULT_TOKEN_TTL_SECS)
}

/// Comma separated list, blanks dropped.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use gatehouse_core::models::auth::{AccountStatus, ClaimsApp, Permission, TokenClaims};

    use super::*;

    #[test]
    fn list_parsing_drops_blanks() {
        assert_eq!(parse_list(" a0, ,crm,"), vec!["a0", "crm"]);
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn ttl_parsing_rejects_out_of_range() {
        assert_eq!(parse_ttl("900"), 900);
        assert_eq!(parse_ttl(" 7200 "), 7200);
        assert_eq!(parse_ttl("0"), DEFAULT_TOKEN_TTL_SECS);
        assert_eq!(parse_ttl("-5"), DEFAULT_TOKEN_TTL_SECS);
        assert_eq!(parse_ttl("soon"), DEFAULT_TOKEN_TTL_SECS);
        assert_eq!(parse_ttl("1000000000000000"), DEFAULT_TOKEN_TTL_SECS);
        assert_eq!(parse_ttl("99999999999999999999"), DEFAULT_TOKEN_TTL_SECS);
        assert_eq!(
            parse_ttl(&MAX_TOKEN_TTL_SECS.to_string()),
            MAX_TOKEN_TTL_SECS
        );
    }

    #[test]
    fn oversized_ttl_still_signs() {
        let config = ApiConfig {
            bind_addr: "127.0.0.1:0".into(),
            pg_connection_url: String::new(),
            jwt_secret: "test-secret".into(),
            token_ttl_secs: i64::MAX,
            client_url: String::new(),
            allowed_app_ids: Vec::new(),
            strict_revocation: false,
            notify_webhook_url: None,
        };
        let claims = TokenClaims {
            id: "u1".into(),
            email: "a@x.com".into(),
            account_status: AccountStatus::Active,
            app: ClaimsApp {
                app_id: "app-1".into(),
                permission: Permission::Read,
            },
        };
        let codec = config.token_codec();
        let token = codec.sign(&claims).unwrap();
        assert_eq!(codec.verify(&token), Some(claims));
    }

    #[test]
    fn flag_parsing() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" 1 "));
        assert!(parse_flag("ON"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }
}
