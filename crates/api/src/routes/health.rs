use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;
use studyplan_db::bootstrap::DbStatus;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok` when the database is ready and reachable, `degraded` otherwise.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// `initializing`, `ready` or `down`.
    pub db_status: &'static str,
    /// Most recent database initialization error, if any.
    pub last_error: Option<String>,
}

/// GET /health -- returns service and database health.
///
/// Not gated by readiness, so it answers while the database is starting.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_status = state.db_health.status();

    let healthy = match db_status {
        DbStatus::Ready => studyplan_db::health_check(&state.pool).await.is_ok(),
        DbStatus::Initializing | DbStatus::Down { .. } => false,
    };

    Json(HealthResponse {
        status: if healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_status: db_status.as_str(),
        last_error: state.db_health.last_error(),
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
