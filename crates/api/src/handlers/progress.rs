//! Handlers for the caller's progress document.
//!
//! The server stores whatever form the client sends: a plaintext document or
//! an `{ "encrypted": ... }` envelope it cannot read. Plaintext documents
//! must already be canonical; legacy shapes are only rewritten at startup.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use studyplan_core::document::{
    empty_document_value, is_encrypted_value, ProgressDocument, StoredProgress,
};
use studyplan_core::error::CoreError;
use studyplan_core::stats::{progress_summary, SubjectSummary};
use studyplan_core::types::Timestamp;
use studyplan_db::repositories::ProgressRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Stored progress plus when it was last saved.
///
/// `updated_at` is `null` when the user has never saved.
#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub data: Value,
    pub updated_at: Option<Timestamp>,
}

/// GET /api/v1/progress
///
/// Returns the default document when the user has no row.
pub async fn get_progress(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<ProgressResponse>> {
    let response = match ProgressRepo::find_by_user(&state.pool, auth.user_id).await? {
        Some(row) => ProgressResponse {
            data: row.data,
            updated_at: Some(row.updated_at),
        },
        None => ProgressResponse {
            data: empty_document_value(),
            updated_at: None,
        },
    };
    Ok(Json(response))
}

/// PUT /api/v1/progress
///
/// Replace the caller's document. Last write wins.
pub async fn put_progress(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<Value>,
) -> AppResult<Json<ProgressResponse>> {
    let stored = StoredProgress::parse(body)?;
    let data = stored.to_value()?;

    let row = ProgressRepo::upsert(&state.pool, auth.user_id, &data).await?;
    tracing::debug!(
        user_id = auth.user_id,
        encrypted = stored.is_encrypted(),
        "Saved progress",
    );

    Ok(Json(ProgressResponse {
        data: row.data,
        updated_at: Some(row.updated_at),
    }))
}

/// GET /api/v1/progress/summary
///
/// Per-subject completion against the plan. Encrypted documents are opaque
/// to the server, so they get a 409.
pub async fn get_summary(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<DataResponse<Vec<SubjectSummary>>>> {
    let data = ProgressRepo::find_by_user(&state.pool, auth.user_id)
        .await?
        .map(|row| row.data)
        .unwrap_or_else(empty_document_value);

    if is_encrypted_value(&data) {
        return Err(AppError::Core(CoreError::Conflict(
            "Progress is encrypted and can only be summarized by the client".into(),
        )));
    }

    let document = ProgressDocument::read_lenient(data).map_err(|e| {
        AppError::InternalError(format!(
            "Stored progress for user {} is unreadable: {e}",
            auth.user_id
        ))
    })?;

    Ok(Json(DataResponse {
        data: progress_summary(&document, &state.plan),
    }))
}
