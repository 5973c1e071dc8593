pub mod auth;
pub mod health;
pub mod plan;
pub mod progress;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /auth/register                 register (public)
/// /auth/login                    login (public)
///
/// /plan                          study plan (public)
///
/// /progress                      get, replace (requires auth)
/// /progress/summary              per-subject stats (requires auth)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/plan", plan::router())
        .nest("/progress", progress::router())
}
