//! Integration tests: build the router over in-memory stores and drive it
//! with `oneshot`.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use gatehouse_api::middleware::auth::{TierGate, require_auth, require_gate};
use gatehouse_api::{AppState, config::ApiConfig};
use gatehouse_core::auth::guard::Gate;
use gatehouse_core::models::auth::{AccountDetails, AppMembership, Permission};
use gatehouse_core::notify::MemoryNotifier;
use gatehouse_core::store::{AccessTokenLedger, MemoryTokenLedger, MemoryUserDirectory};
use serde_json::{Value, json};
use tower::ServiceExt;

const PASSWORD: &str = "Str0ng!Pass";

fn test_config() -> ApiConfig {
    ApiConfig {
        bind_addr: "127.0.0.1:0".into(),
        pg_connection_url: String::new(),
        jwt_secret: "test-secret".into(),
        token_ttl_secs: 3600,
        client_url: "https://accounts.test".into(),
        allowed_app_ids: Vec::new(),
        strict_revocation: false,
        notify_webhook_url: None,
    }
}

struct TestApp {
    router: Router,
    state: AppState,
    notifier: Arc<MemoryNotifier>,
}

fn app_with(config: ApiConfig) -> TestApp {
    let notifier = Arc::new(MemoryNotifier::new());
    let state = AppState::new(
        config,
        Arc::new(MemoryUserDirectory::new()),
        Arc::new(MemoryTokenLedger::new()),
        notifier.clone(),
    );
    TestApp {
        router: gatehouse_api::router(state.clone()),
        state,
        notifier,
    }
}

fn app() -> TestApp {
    app_with(test_config())
}

async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
        Some(body) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };

    let resp = router.clone().oneshot(req).await.expect("request");
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, json)
}

/// Creates a member of `app_id` directly through the service.
async fn member(app: &TestApp, email: &str, app_id: &str, permission: Permission) {
    app.state
        .auth
        .create_account(
            AccountDetails {
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                email: email.into(),
                password: PASSWORD.into(),
            },
            AppMembership::new(app_id, permission),
        )
        .await
        .expect("create account");
}

async fn login(app: &TestApp, email: &str, app_id: &str) -> String {
    let (status, body) = send(
        &app.router,
        Method::POST,
        "/user/login",
        None,
        Some(json!({
            "email": email,
            "password": PASSWORD,
            "redirectUrl": "https://app.test/home",
            "redirectAppId": app_id,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    body["token"].as_str().expect("token").to_string()
}

async fn user_id(app: &TestApp, email: &str) -> String {
    app.state
        .auth
        .get_user_by_email(email)
        .await
        .expect("user exists")
        .id
}

#[tokio::test]
async fn health_endpoint_answers() {
    let app = app();
    let (status, body) = send(&app.router, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("Health is good"));
}

#[tokio::test]
async fn signup_then_duplicate_conflicts() {
    let app = app();
    let body = json!({
        "firstName": "Ada",
        "lastName": "Lovelace",
        "email": "Ada@Example.com",
        "password": PASSWORD,
    });

    let (status, resp) = send(
        &app.router,
        Method::POST,
        "/user/signup",
        None,
        Some(body.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(resp["message"], "Account created successfully");

    let (status, resp) = send(&app.router, Method::POST, "/user/signup", None, Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(resp["error"], "conflict");
    assert_eq!(resp["message"], "Account with this email already exists");
}

#[tokio::test]
async fn signup_reports_first_validation_failure() {
    let app = app();
    let (status, resp) = send(
        &app.router,
        Method::POST,
        "/user/signup",
        None,
        Some(json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "email": "not-an-email",
            "password": "weak",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["error"], "validation_error");
    assert_eq!(resp["message"], "Invalid email");
}

#[tokio::test]
async fn login_rejections_carry_their_reason() {
    let app = app();
    member(&app, "a@x.com", "app-1", Permission::Read).await;

    let attempt = |email: &str, password: &str, app_id: &str| {
        json!({
            "email": email,
            "password": password,
            "redirectUrl": "https://app.test/home",
            "redirectAppId": app_id,
        })
    };

    let (status, resp) = send(
        &app.router,
        Method::POST,
        "/user/login",
        None,
        Some(attempt("b@x.com", PASSWORD, "app-1")),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(resp["message"], "Account not found");

    let (status, resp) = send(
        &app.router,
        Method::POST,
        "/user/login",
        None,
        Some(attempt("a@x.com", "Wr0ng!Pass", "app-1")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp["message"], "Invalid email or password");

    let (status, resp) = send(
        &app.router,
        Method::POST,
        "/user/login",
        None,
        Some(attempt("a@x.com", PASSWORD, "app-9")),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(resp["message"], "App not found");
}

#[tokio::test]
async fn login_returns_redirect_with_token() {
    let app = app();
    member(&app, "a@x.com", "app-1", Permission::Read).await;

    let (status, resp) = send(
        &app.router,
        Method::POST,
        "/user/login",
        None,
        Some(json!({
            "email": "A@X.com",
            "password": PASSWORD,
            "redirectUrl": "https://app.test/home",
            "redirectAppId": "app-1",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = resp["token"].as_str().unwrap();
    assert_eq!(
        resp["redirectUrlWithToken"],
        format!("https://app.test/home?token={token}")
    );
}

#[tokio::test]
async fn protected_routes_require_bearer_token() {
    let app = app();
    let (status, resp) = send(&app.router, Method::GET, "/user/list", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp["message"], "Missing authorization header");

    let req = Request::builder()
        .uri("/user/list")
        .header(header::AUTHORIZATION, "Basic abc")
        .body(Body::empty())
        .unwrap();
    let resp = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app.router, Method::GET, "/user/list", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn listed_users_carry_no_credentials() {
    let app = app();
    member(&app, "a@x.com", "app-1", Permission::Read).await;
    let token = login(&app, "a@x.com", "app-1").await;

    let (status, resp) = send(&app.router, Method::GET, "/user/list", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let users = resp["users"].as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["email"], "a@x.com");
    assert!(users[0].get("passwordHash").is_none());
    assert!(users[0].get("salt").is_none());
}

#[tokio::test]
async fn find_and_profile_lookups() {
    let app = app();
    member(&app, "a@x.com", "app-1", Permission::Write).await;
    let token = login(&app, "a@x.com", "app-1").await;
    let id = user_id(&app, "a@x.com").await;

    let (status, resp) = send(
        &app.router,
        Method::GET,
        &format!("/user/findById?id={id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["user"]["_id"], id.as_str());

    let (status, resp) = send(
        &app.router,
        Method::GET,
        "/users/findByEmail?email=a@x.com",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["user"]["email"], "a@x.com");

    let (status, _) = send(
        &app.router,
        Method::GET,
        "/user/findById?id=missing",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, resp) = send(
        &app.router,
        Method::GET,
        &format!("/user/profile?id={id}&appId=app-1"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["user"]["permission"], "WRITE");
    assert_eq!(resp["user"]["appId"], "app-1");

    let (status, resp) = send(
        &app.router,
        Method::GET,
        &format!("/user/profile?id={id}&appId=app-2"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["user"]["permission"], "");
}

#[tokio::test]
async fn write_tier_admits_read_but_not_admin() {
    let app = app();
    member(&app, "reader@x.com", "app-1", Permission::Read).await;
    member(&app, "admin@x.com", "app-1", Permission::Admin).await;
    let reader = login(&app, "reader@x.com", "app-1").await;
    let admin = login(&app, "admin@x.com", "app-1").await;
    let update = json!({ "firstName": "Augusta" });

    let (status, _) = send(
        &app.router,
        Method::PUT,
        "/user/profile",
        Some(&reader),
        Some(update.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let user = app.state.auth.get_user_by_email("reader@x.com").await.unwrap();
    assert_eq!(user.first_name, "Augusta");

    let (status, resp) = send(
        &app.router,
        Method::PUT,
        "/user/profile",
        Some(&admin),
        Some(update),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(resp["message"], "Access Denied");
}

#[tokio::test]
async fn read_tier_gate_admits_only_read() {
    let app = app();
    member(&app, "reader@x.com", "app-1", Permission::Read).await;
    member(&app, "writer@x.com", "app-1", Permission::Write).await;
    let reader = login(&app, "reader@x.com", "app-1").await;
    let writer = login(&app, "writer@x.com", "app-1").await;

    let router = Router::new()
        .route("/read-only", get(|| async { "ok" }))
        .route_layer(from_fn_with_state(
            TierGate::new(&app.state, Gate::RequireReadTier),
            require_gate,
        ))
        .layer(from_fn_with_state(app.state.clone(), require_auth))
        .with_state(app.state.clone());

    let (status, body) = send(&router, Method::GET, "/read-only", Some(&reader), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("ok"));
    let (status, body) = send(&router, Method::GET, "/read-only", Some(&writer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Access Denied");
}

#[tokio::test]
async fn create_account_notifies_with_change_password_link() {
    let app = app();
    member(&app, "admin@x.com", "app-1", Permission::Admin).await;
    let admin = login(&app, "admin@x.com", "app-1").await;

    let (status, resp) = send(
        &app.router,
        Method::POST,
        "/user/createAccount?appId=app-2",
        Some(&admin),
        Some(json!({
            "firstName": "Grace",
            "lastName": "Hopper",
            "email": "grace@x.com",
            "password": PASSWORD,
            "permission": "WRITE",
            "appLabel": "Billing",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{resp}");

    let sent = app.notifier.sent().await;
    let last = sent.last().unwrap();
    assert_eq!(last.to, "grace@x.com");
    assert_eq!(last.subject, "Account Created");
    assert!(last.link.starts_with("https://accounts.test/change-password?token="));

    let created = app.state.auth.get_user_by_email("grace@x.com").await.unwrap();
    assert_eq!(created.apps.len(), 1);
    assert_eq!(created.apps[0].app_id, "app-2");
    assert_eq!(created.apps[0].app_label, "Billing");
    assert_eq!(created.apps[0].permission, Permission::Write);
}

#[tokio::test]
async fn create_account_requires_app_id() {
    let app = app();
    member(&app, "admin@x.com", "app-1", Permission::Admin).await;
    let admin = login(&app, "admin@x.com", "app-1").await;

    let (status, resp) = send(
        &app.router,
        Method::POST,
        "/user/createAccount",
        Some(&admin),
        Some(json!({
            "firstName": "Grace",
            "lastName": "Hopper",
            "email": "grace@x.com",
            "password": PASSWORD,
            "permission": "READ",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["message"], "App ID is required");
}

#[tokio::test]
async fn logout_is_advisory_by_default() {
    let app = app();
    member(&app, "a@x.com", "app-1", Permission::Read).await;
    let token = login(&app, "a@x.com", "app-1").await;

    let (status, resp) = send(&app.router, Method::POST, "/user/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["result"]["message"], "Logged out successfully");

    let ledger = app.state.auth.ledger();
    assert!(ledger.find_by_token(&token).await.unwrap().is_none());

    let (status, _) = send(&app.router, Method::GET, "/user/list", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn strict_revocation_rejects_logged_out_token() {
    let app = app_with(ApiConfig {
        strict_revocation: true,
        ..test_config()
    });
    member(&app, "a@x.com", "app-1", Permission::Read).await;
    let token = login(&app, "a@x.com", "app-1").await;

    let (status, _) = send(&app.router, Method::GET, "/user/list", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app.router,
        Method::POST,
        "/user/logout",
        Some(&token),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, resp) = send(&app.router, Method::GET, "/user/list", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp["message"], "Token has been revoked");
}

#[tokio::test]
async fn allow_list_rejects_tokens_for_other_apps() {
    let app = app_with(ApiConfig {
        allowed_app_ids: vec!["app-2".into()],
        ..test_config()
    });
    member(&app, "a@x.com", "app-1", Permission::Read).await;
    let token = login(&app, "a@x.com", "app-1").await;

    let (status, resp) = send(&app.router, Method::GET, "/user/list", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(resp["message"], "Access Denied");
}

#[tokio::test]
async fn forgot_then_reset_password() {
    let app = app();
    member(&app, "a@x.com", "app-1", Permission::Read).await;

    let (status, _) = send(
        &app.router,
        Method::POST,
        "/user/forgot-password",
        None,
        Some(json!({
            "email": "a@x.com",
            "redirectAppId": "app-1",
            "redirectUrl": "https://app.test/home",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let sent = app.notifier.sent().await;
    let link = &sent.last().unwrap().link;
    assert!(link.starts_with("https://accounts.test/reset-password?token="));
    let reset_token = link
        .split("token=")
        .nth(1)
        .and_then(|rest| rest.split('&').next())
        .unwrap()
        .to_string();

    let new_password = "N3w!Passw0rd";
    let (status, resp) = send(
        &app.router,
        Method::POST,
        "/user/reset-password",
        Some(&reset_token),
        Some(json!({ "password": new_password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["success"], true);

    let (status, _) = send(
        &app.router,
        Method::POST,
        "/user/login",
        None,
        Some(json!({
            "email": "a@x.com",
            "password": new_password,
            "redirectUrl": "https://app.test/home",
            "redirectAppId": "app-1",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn reset_password_enforces_strength() {
    let app = app();
    member(&app, "a@x.com", "app-1", Permission::Read).await;
    let token = login(&app, "a@x.com", "app-1").await;

    let (status, resp) = send(
        &app.router,
        Method::POST,
        "/user/reset-password",
        Some(&token),
        Some(json!({ "password": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["message"], "Password must be provided");
}

#[tokio::test]
async fn membership_grant_update_and_revoke() {
    let app = app();
    member(&app, "admin@x.com", "app-1", Permission::Admin).await;
    member(&app, "a@x.com", "app-1", Permission::Read).await;
    let admin = login(&app, "admin@x.com", "app-1").await;
    let id = user_id(&app, "a@x.com").await;

    let (status, _) = send(
        &app.router,
        Method::POST,
        "/user/apps",
        Some(&admin),
        Some(json!({ "userId": id, "appId": "app-2", "permission": "READ" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    login(&app, "a@x.com", "app-2").await;

    let (status, _) = send(
        &app.router,
        Method::PUT,
        "/user/apps",
        Some(&admin),
        Some(json!({ "userId": id, "appId": "app-2", "permission": "WRITE" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let profile = app.state.auth.get_profile(&id, "app-2").await.unwrap();
    assert_eq!(profile.permission, "WRITE");

    let (status, _) = send(
        &app.router,
        Method::DELETE,
        "/user/apps",
        Some(&admin),
        Some(json!({ "userId": id, "appId": "app-2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let user = app.state.auth.get_user_by_id(&id).await.unwrap();
    assert!(user.apps.iter().all(|a| a.app_id != "app-2"));
}

#[tokio::test]
async fn deactivated_account_cannot_log_in() {
    let app = app();
    member(&app, "admin@x.com", "app-1", Permission::Admin).await;
    member(&app, "a@x.com", "app-1", Permission::Read).await;
    let admin = login(&app, "admin@x.com", "app-1").await;
    let id = user_id(&app, "a@x.com").await;

    let (status, _) = send(
        &app.router,
        Method::PUT,
        "/user/status",
        Some(&admin),
        Some(json!({ "userId": id, "accountStatus": "Inactive" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, resp) = send(
        &app.router,
        Method::POST,
        "/user/login",
        None,
        Some(json!({
            "email": "a@x.com",
            "password": PASSWORD,
            "redirectUrl": "https://app.test/home",
            "redirectAppId": "app-1",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(resp["message"], "Access Denied. Account is not active");
}

#[tokio::test]
async fn admin_update_and_delete_user() {
    let app = app();
    member(&app, "admin@x.com", "app-1", Permission::Admin).await;
    member(&app, "a@x.com", "app-1", Permission::Read).await;
    let admin = login(&app, "admin@x.com", "app-1").await;
    let id = user_id(&app, "a@x.com").await;

    let (status, resp) = send(
        &app.router,
        Method::PUT,
        &format!("/user/update?id={id}"),
        Some(&admin),
        Some(json!({
            "firstName": "Augusta",
            "lastName": "King",
            "email": "augusta@x.com",
            "accountStatus": "Active",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["user"]["email"], "augusta@x.com");

    let (status, resp) = send(
        &app.router,
        Method::DELETE,
        &format!("/user/delete?id={id}"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["message"], "User deleted");

    let (status, _) = send(
        &app.router,
        Method::DELETE,
        &format!("/user/delete?id={id}"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn token_ledger_lookup_and_revoke() {
    let app = app();
    member(&app, "admin@x.com", "app-1", Permission::Admin).await;
    let admin = login(&app, "admin@x.com", "app-1").await;
    let id = user_id(&app, "admin@x.com").await;

    let (status, resp) = send(
        &app.router,
        Method::GET,
        &format!("/token?token={admin}"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["userId"], id.as_str());
    assert_eq!(resp["appId"], "app-1");

    let (status, _) = send(
        &app.router,
        Method::DELETE,
        &format!("/token?token={admin}"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app.router,
        Method::GET,
        &format!("/token?token={admin}"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
