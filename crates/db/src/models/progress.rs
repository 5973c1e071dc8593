//! Progress document rows.

use serde::Serialize;
use sqlx::FromRow;
use studyplan_core::types::{DbId, Timestamp};

/// A row from the `progress` table.
///
/// `data` is kept as raw JSON: it may be a plaintext document in any
/// historical shape or an opaque `{ "encrypted": ... }` envelope.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Progress {
    pub user_id: DbId,
    pub data: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
