//! # gatehouse_api
//!
//! HTTP API library for Gatehouse.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod validation;

use std::sync::Arc;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post, put};
use gatehouse_core::auth::guard::Gate;
use gatehouse_core::auth::service::AuthService;
use gatehouse_core::notify::{LogNotifier, Notifier, WebhookNotifier};
use gatehouse_core::store::{
    AccessTokenLedger, MemoryTokenLedger, MemoryUserDirectory, PgTokenLedger, PgUserDirectory,
    UserDirectory,
};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};

use crate::config::ApiConfig;
use crate::handlers::{account, apps, health, tokens, users};
use crate::middleware::auth::{TierGate, require_auth, require_gate};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Account workflow over the configured stores.
    pub auth: Arc<AuthService>,
    /// API configuration.
    pub config: ApiConfig,
}

impl AppState {
    /// State over explicit collaborators.
    pub fn new(
        config: ApiConfig,
        users: Arc<dyn UserDirectory>,
        ledger: Arc<dyn AccessTokenLedger>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let auth = AuthService::new(
            users,
            ledger,
            notifier,
            config.token_codec(),
            config.service_settings(),
        );
        Self {
            auth: Arc::new(auth),
            config,
        }
    }

    /// PostgreSQL-backed state. Notifications go to the configured webhook.
    pub fn postgres(pool: PgPool, config: ApiConfig) -> Self {
        let notifier = notifier_for(&config);
        Self::new(
            config,
            Arc::new(PgUserDirectory::new(pool.clone())),
            Arc::new(PgTokenLedger::new(pool)),
            notifier,
        )
    }

    /// Process-local state. Nothing survives a restart.
    pub fn in_memory(config: ApiConfig) -> Self {
        let notifier = notifier_for(&config);
        Self::new(
            config,
            Arc::new(MemoryUserDirectory::new()),
            Arc::new(MemoryTokenLedger::new()),
            notifier,
        )
    }
}

fn notifier_for(config: &ApiConfig) -> Arc<dyn Notifier> {
    match &config.notify_webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
        None => Arc::new(LogNotifier),
    }
}

/// Run embedded database migrations.
///
/// Delegates to `gatehouse_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    gatehouse_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route("/health", get(health::health))
        .route("/user/signup", post(account::signup))
        .route("/user/login", post(account::login))
        .route("/user/forgot-password", post(account::forgot_password));

    // Any verified token
    let authenticated = Router::new()
        .route("/user/list", get(users::list_users))
        .route("/user/findById", get(users::find_by_id))
        .route("/users/findByEmail", get(users::find_by_email))
        .route("/user/profile", get(users::get_profile))
        .route("/user/logout", post(account::logout))
        .route("/user/reset-password", post(account::reset_password));

    let write_tier = Router::new()
        .route("/user/profile", put(users::update_profile))
        .route_layer(from_fn_with_state(
            TierGate::new(&state, Gate::RequireWriteTier),
            require_gate,
        ));

    let admin_tier = Router::new()
        .route("/user/createAccount", post(account::create_account))
        .route("/user/update", put(users::update_user))
        .route("/user/status", put(users::change_account_status))
        .route(
            "/user/apps",
            post(apps::add_app).put(apps::update_app).delete(apps::remove_app),
        )
        .route("/user/delete", delete(users::delete_user))
        .route("/token", get(tokens::lookup_token).delete(tokens::revoke_token))
        .route_layer(from_fn_with_state(
            TierGate::new(&state, Gate::RequireAdminTier),
            require_gate,
        ));

    let protected = authenticated
        .merge(write_tier)
        .merge(admin_tier)
        .layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(cors)
        .with_state(state)
}
