#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::PgPool;
use studyplan_core::study_plan::StudyPlan;
use studyplan_db::bootstrap::DbHealth;
use tower::ServiceExt;

use studyplan_api::auth::jwt::JwtConfig;
use studyplan_api::config::ServerConfig;
use studyplan_api::router::build_app_router;
use studyplan_api::state::AppState;

pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: String::new(),
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        db_connect_attempts: 1,
        db_retry_delay_secs: 0,
        study_plan_path: None,
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            access_token_expiry_mins: 60,
        },
    }
}

/// Full application router over a pool the test harness already migrated.
pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with_health(pool, DbHealth::ready())
}

/// Full application router with an explicit readiness handle.
pub fn build_test_app_with_health(pool: PgPool, db_health: DbHealth) -> Router {
    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        db_health,
        plan: Arc::new(StudyPlan::default_plan()),
    };
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(
    app: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, None, Some(body)).await
}

pub async fn put_json_auth(app: Router, uri: &str, token: &str, body: Value) -> Response<Body> {
    send(app, Method::PUT, uri, Some(token), Some(body)).await
}

/// Register `username` with [`TEST_PASSWORD`] and log in, returning the
/// access token.
pub async fn register_and_login(app: Router, username: &str) -> String {
    let credentials = serde_json::json!({ "username": username, "password": TEST_PASSWORD });

    let response = post_json(app.clone(), "/api/v1/auth/register", credentials.clone()).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = post_json(app, "/api/v1/auth/login", credentials).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["access_token"]
        .as_str()
        .unwrap()
        .to_string()
}
