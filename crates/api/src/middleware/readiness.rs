//! Gate for routes that need the database.
//!
//! The listener comes up before database initialization finishes. Until the
//! bootstrap task marks [`DbHealth`](studyplan_db::bootstrap::DbHealth)
//! ready, and for good if it gives up, every gated request gets a 503.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use studyplan_db::bootstrap::DbStatus;

use crate::error::AppError;
use crate::state::AppState;

/// Pass the request through only when the database is ready.
pub async fn require_db_ready(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    match state.db_health.status() {
        DbStatus::Ready => next.run(request).await,
        DbStatus::Initializing => {
            AppError::ServiceUnavailable("Database is initializing, try again shortly".into())
                .into_response()
        }
        DbStatus::Down { .. } => {
            AppError::ServiceUnavailable("Database is unavailable".into()).into_response()
        }
    }
}
