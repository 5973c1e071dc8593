//! Repository for the `progress` table.
//!
//! One row per user, keyed by `user_id`. Saves are last-write-wins upserts,
//! so repeating a save is harmless.

use sqlx::{PgConnection, PgExecutor, PgPool};
use studyplan_core::document::empty_document_value;
use studyplan_core::types::DbId;

use crate::models::progress::Progress;

/// Column list for `progress` queries.
const COLUMNS: &str = "user_id, data, created_at, updated_at";

/// Provides data access for progress documents.
pub struct ProgressRepo;

impl ProgressRepo {
    /// Insert the default document for a freshly registered user.
    pub async fn create_default<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: DbId,
    ) -> Result<Progress, sqlx::Error> {
        let query = format!(
            "INSERT INTO progress (user_id, data) VALUES ($1, $2) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Progress>(&query)
            .bind(user_id)
            .bind(empty_document_value())
            .fetch_one(executor)
            .await
    }

    /// Get the progress row for a user.
    ///
    /// Returns `None` if the user has no row.
    pub async fn find_by_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Option<Progress>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM progress WHERE user_id = $1");
        sqlx::query_as::<_, Progress>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Insert or replace a user's document.
    ///
    /// Uses `ON CONFLICT (user_id) DO UPDATE`; the last write wins.
    pub async fn upsert(
        pool: &PgPool,
        user_id: DbId,
        data: &serde_json::Value,
    ) -> Result<Progress, sqlx::Error> {
        let query = format!(
            "INSERT INTO progress (user_id, data) \
             VALUES ($1, $2) \
             ON CONFLICT (user_id) DO UPDATE SET \
                 data = EXCLUDED.data, \
                 updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Progress>(&query)
            .bind(user_id)
            .bind(data)
            .fetch_one(pool)
            .await
    }

    /// All user ids that have a progress row, in ascending order.
    pub async fn list_user_ids(pool: &PgPool) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar::<_, DbId>("SELECT user_id FROM progress ORDER BY user_id")
            .fetch_all(pool)
            .await
    }

    /// Read a user's document and lock the row until the transaction ends.
    pub async fn lock_data(
        conn: &mut PgConnection,
        user_id: DbId,
    ) -> Result<Option<serde_json::Value>, sqlx::Error> {
        sqlx::query_scalar::<_, serde_json::Value>(
            "SELECT data FROM progress WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(conn)
        .await
    }

    /// Overwrite a document without bumping `updated_at`.
    ///
    /// Used by the startup migration, which is not a user edit.
    pub async fn replace_data(
        conn: &mut PgConnection,
        user_id: DbId,
        data: &serde_json::Value,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE progress SET data = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(data)
            .execute(conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
