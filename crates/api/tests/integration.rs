//! Integration tests for API routes.
//!
//! Uses `tower::ServiceExt` to test Axum routes without a real HTTP server,
//! an in-memory SQLite database, and a `wiremock` stand-in for the Telegram
//! Bot API.

use std::collections::HashMap;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use empire_api::middleware::auth::{encode_jwt, password_digest};
use empire_api::rate_limit::{Limit, RateLimiter};
use empire_api::routes::create_router;
use empire_api::state::AppState;
use empire_common::config::AppConfig;
use empire_common::db::{create_pool, run_migrations};
use empire_engine::shopify::{HMAC_HEADER, TIMESTAMP_HEADER, sign};
use empire_notifier::AlertDispatcher;

const JWT_SECRET: &str = "test-jwt-secret-for-integration-tests";
const SHOPIFY_SECRET: &str = "shpss_integration";
const ADMIN_PASSWORD: &str = "correct horse";

// ============================================================
// Helpers
// ============================================================

fn test_config(telegram: &MockServer, unset: &[&str]) -> AppConfig {
    let vars: HashMap<String, String> = [
        ("JWT_SECRET", JWT_SECRET.to_string()),
        ("ADMIN_USER", "keys".to_string()),
        ("ADMIN_PW_SHA256", password_digest(ADMIN_PASSWORD)),
        ("SHOPIFY_API_SECRET", SHOPIFY_SECRET.to_string()),
        ("ADMIN_CHAT_ID", "4242".to_string()),
        ("EMPIRE_BOT_TOKEN", "empire-token".to_string()),
        ("ZARIAH_BOT_TOKEN", "zariah-token".to_string()),
        ("TELEGRAM_API_BASE", telegram.uri()),
        ("ALERT_MAX_RETRIES", "1".to_string()),
        ("ALERT_BACKOFF_BASE_MS", "1".to_string()),
    ]
    .into_iter()
    .filter(|(k, _)| !unset.contains(k))
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    AppConfig::from_lookup(|k| vars.get(k).cloned()).unwrap()
}

async fn build_test_state(telegram: &MockServer, limiter: RateLimiter) -> AppState {
    build_state_without(telegram, limiter, &[]).await
}

async fn build_state_without(telegram: &MockServer, limiter: RateLimiter, unset: &[&str]) -> AppState {
    let pool = create_pool("sqlite::memory:", 1).await.unwrap();
    run_migrations(&pool).await.unwrap();

    let config = test_config(telegram, unset);
    let dispatcher = AlertDispatcher::from_config(&config).unwrap();
    AppState::new(pool, config, dispatcher, limiter)
}

async fn app(telegram: &MockServer) -> (AppState, Router) {
    let state = build_test_state(telegram, RateLimiter::memory()).await;
    (state.clone(), create_router(state))
}

async fn mount_send_ok(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path(format!("/bot{}/sendMessage", token)))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {"message_id": 1}})),
        )
        .mount(server)
        .await;
}

fn admin_token() -> String {
    encode_jwt("keys", JWT_SECRET, 15, true).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn signed_webhook(body: &str, secret: &str) -> Request<Body> {
    let timestamp = chrono::Utc::now().timestamp().to_string();
    Request::builder()
        .method("POST")
        .uri("/shopify/webhook")
        .header("content-type", "application/json")
        .header(TIMESTAMP_HEADER, timestamp)
        .header(HMAC_HEADER, sign(secret, body.as_bytes()).unwrap())
        .body(Body::from(body.to_string()))
        .unwrap()
}

// ============================================================
// Status
// ============================================================

#[tokio::test]
async fn test_health_endpoint() {
    let server = MockServer::start().await;
    let (_, app) = app(&server).await;

    let response = app.oneshot(get("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "empire-api");
}

#[tokio::test]
async fn test_root_reports_worker_and_queues() {
    let server = MockServer::start().await;
    let (_, app) = app(&server).await;

    let json = json_body(app.oneshot(get("/", None)).await.unwrap()).await;
    assert_eq!(json["status"], "running");
    assert_eq!(json["rate_limiting"], "memory");
    assert_eq!(json["bot_thread"], true);
    assert_eq!(json["message_queues"], json!({"empire": 0, "zariah": 0}));
}

#[tokio::test]
async fn test_alerts_status_reports_each_bot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/botempire-token/getMe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {}})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/botzariah-token/getMe"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"ok": false, "error_code": 401, "description": "Unauthorized"})),
        )
        .mount(&server)
        .await;
    let (_, app) = app(&server).await;

    let json = json_body(app.oneshot(get("/alerts/status", None)).await.unwrap()).await;
    assert_eq!(json, json!({"telegram": {"empire": true, "zariah": false}}));
}

// ============================================================
// Admin auth
// ============================================================

#[tokio::test]
async fn test_login_issues_admin_token() {
    let server = MockServer::start().await;
    let (_, app) = app(&server).await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/admin/login",
            None,
            json!({"username": "keys", "password": ADMIN_PASSWORD}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let token = json_body(response).await["token"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .oneshot(get("/admin/orders", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!([]));
}

#[tokio::test]
async fn test_login_rejects_bad_password() {
    let server = MockServer::start().await;
    let (_, app) = app(&server).await;

    let response = app
        .oneshot(post_json(
            "/admin/login",
            None,
            json!({"username": "keys", "password": "wrong"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(json_body(response).await["error"].is_string());
}

#[tokio::test]
async fn test_login_is_rate_limited() {
    let server = MockServer::start().await;
    let (_, app) = app(&server).await;

    for _ in 0..5 {
        let response = app
            .clone()
            .oneshot(post_json(
                "/admin/login",
                None,
                json!({"username": "keys", "password": "wrong"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = app
        .oneshot(post_json(
            "/admin/login",
            None,
            json!({"username": "keys", "password": ADMIN_PASSWORD}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_incomplete_login_body_is_json_error() {
    let server = MockServer::start().await;
    let (_, app) = app(&server).await;

    let response = app
        .clone()
        .oneshot(post_json("/admin/login", None, json!({"username": "keys"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["error"].is_string());

    let garbage = Request::builder()
        .method("POST")
        .uri("/admin/login")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(garbage).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["error"].is_string());
}

#[tokio::test]
async fn test_admin_routes_require_token() {
    let server = MockServer::start().await;
    let (_, app) = app(&server).await;

    let response = app
        .clone()
        .oneshot(get("/admin/orders", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(get("/admin/deliveries", Some("not-a-jwt")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let non_admin = encode_jwt("guest", JWT_SECRET, 15, false).unwrap();
    let response = app
        .oneshot(get("/admin/orders", Some(&non_admin)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ============================================================
// Shopify webhook
// ============================================================

#[tokio::test]
async fn test_webhook_processes_then_deduplicates() {
    let server = MockServer::start().await;
    mount_send_ok(&server, "empire-token").await;
    let (state, app) = app(&server).await;

    let body = json!({
        "id": 5550001,
        "total_price": "6100.00",
        "billing_address": {"country": "US"},
        "shipping_address": {"country": "RU"}
    })
    .to_string();

    let response = app
        .clone()
        .oneshot(signed_webhook(&body, SHOPIFY_SECRET))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "processed");
    assert_eq!(json["order_id"], "5550001");

    let response = app
        .clone()
        .oneshot(signed_webhook(&body, SHOPIFY_SECRET))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "duplicate");

    // one alert for the one new order
    state.queue.shutdown().await;
    let deliveries = state.deliveries.list(None, 10).await.unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].status, "sent");
    assert_eq!(deliveries[0].delivered_by.as_deref(), Some("empire"));
    assert_eq!(deliveries[0].chat_id, "4242");
    assert_eq!(deliveries[0].text, "💰 Order: $6100.00 | Risk: 70%");

    let orders = app
        .oneshot(get("/admin/orders", Some(&admin_token())))
        .await
        .unwrap();
    let orders = json_body(orders).await;
    assert_eq!(orders.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_webhook_rejects_bad_signature() {
    let server = MockServer::start().await;
    let (_, app) = app(&server).await;

    let body = json!({"id": 1, "total_price": "1.00"}).to_string();
    let response = app
        .oneshot(signed_webhook(&body, "some-other-secret"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_webhook_rejects_missing_headers() {
    let server = MockServer::start().await;
    let (_, app) = app(&server).await;

    let response = app
        .oneshot(post_json("/shopify/webhook", None, json!({"id": 1})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_webhook_rejects_stale_timestamp() {
    let server = MockServer::start().await;
    let (_, app) = app(&server).await;

    let body = json!({"id": 1, "total_price": "1.00"}).to_string();
    let stale = (chrono::Utc::now().timestamp() - 3600).to_string();
    let request = Request::builder()
        .method("POST")
        .uri("/shopify/webhook")
        .header("content-type", "application/json")
        .header(TIMESTAMP_HEADER, stale)
        .header(HMAC_HEADER, sign(SHOPIFY_SECRET, body.as_bytes()).unwrap())
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(json_body(response).await["error"].is_string());
}

#[tokio::test]
async fn test_webhook_refused_without_app_secret() {
    let server = MockServer::start().await;
    let state = build_state_without(&server, RateLimiter::memory(), &["SHOPIFY_API_SECRET"]).await;
    let app = create_router(state);

    let body = json!({"id": 1, "total_price": "1.00"}).to_string();
    let response = app
        .oneshot(signed_webhook(&body, SHOPIFY_SECRET))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json_body(response).await["error"].is_string());
}

#[tokio::test]
async fn test_webhook_without_order_id_is_bad_request() {
    let server = MockServer::start().await;
    let (_, app) = app(&server).await;

    let body = json!({"total_price": "1.00"}).to_string();
    let response = app
        .oneshot(signed_webhook(&body, SHOPIFY_SECRET))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ============================================================
// Sending
// ============================================================

#[tokio::test]
async fn test_bot_send_queues_and_delivers() {
    let server = MockServer::start().await;
    mount_send_ok(&server, "zariah-token").await;
    let (state, app) = app(&server).await;

    let response = app
        .oneshot(post_json(
            "/bot/send",
            Some(&admin_token()),
            json!({"bot": "zariah", "chat_id": 777, "text": "hello"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "sent");
    assert!(json["delivery_id"].is_string());

    state.queue.shutdown().await;
    let deliveries = state.deliveries.list(None, 10).await.unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].requested_bot, "zariah");
    assert_eq!(deliveries[0].delivered_by.as_deref(), Some("zariah"));
    assert_eq!(deliveries[0].chat_id, "777");
}

#[tokio::test]
async fn test_bot_send_unknown_bot() {
    let server = MockServer::start().await;
    let (_, app) = app(&server).await;

    let response = app
        .oneshot(post_json(
            "/bot/send",
            Some(&admin_token()),
            json!({"bot": "deepseek", "chat_id": "1", "text": "hello"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bot_send_without_text_is_json_error() {
    let server = MockServer::start().await;
    let (_, app) = app(&server).await;

    let response = app
        .oneshot(post_json(
            "/bot/send",
            Some(&admin_token()),
            json!({"bot": "empire"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["error"].is_string());
}

#[tokio::test]
async fn test_bot_send_requires_admin() {
    let server = MockServer::start().await;
    let (_, app) = app(&server).await;

    let response = app
        .oneshot(post_json("/bot/send", None, json!({"text": "hello"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_alert_test_fails_over() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/botempire-token/sendMessage"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_json(json!({"ok": false, "error_code": 403, "description": "Forbidden"})),
        )
        .mount(&server)
        .await;
    mount_send_ok(&server, "zariah-token").await;
    let (_, app) = app(&server).await;

    let response = app
        .oneshot(post_json("/alerts/test", Some(&admin_token()), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let report = json_body(response).await;
    assert_eq!(report["delivered"], true);
    assert_eq!(report["delivered_by"], "zariah");
    assert_eq!(report["attempts"].as_array().unwrap().len(), 2);
    assert_eq!(report["attempts"][0]["ok"], false);
}

#[tokio::test]
async fn test_delivery_log_filters_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(
            json!({"ok": false, "error_code": 400, "description": "Bad Request: chat not found"}),
        ))
        .mount(&server)
        .await;
    let (state, app) = app(&server).await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/bot/send",
            Some(&admin_token()),
            json!({"chat_id": "-1", "text": "lost"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    state.queue.shutdown().await;

    let response = app
        .oneshot(get("/admin/deliveries?status=failed", Some(&admin_token())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let rows = json_body(response).await;
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["status"], "failed");
    assert!(rows[0]["delivered_by"].is_null());
    assert!(
        rows[0]["error_detail"]
            .as_str()
            .unwrap()
            .contains("chat not found")
    );
}

// ============================================================
// Rate limiting
// ============================================================

#[tokio::test]
async fn test_global_rate_limit() {
    let server = MockServer::start().await;
    let limiter = RateLimiter::memory().with_default_limits(vec![Limit::per_minute(2)]);
    let app = create_router(build_test_state(&server, limiter).await);

    let request = |ip: &str| {
        Request::builder()
            .uri("/health")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    };

    for _ in 0..2 {
        let response = app.clone().oneshot(request("198.51.100.1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = app.clone().oneshot(request("198.51.100.1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let response = app.oneshot(request("198.51.100.2")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
