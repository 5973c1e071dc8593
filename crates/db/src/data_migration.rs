//! Startup rewrite of legacy progress documents into the canonical shape.
//!
//! Runs once per bootstrap, after schema migrations. Each row is read,
//! migrated and written back inside its own transaction with the row locked,
//! so a concurrent save either lands before the read or waits for the commit.
//! Encrypted rows are opaque to the server and skipped.

use chrono::Utc;
use serde::Serialize;
use studyplan_core::document::is_encrypted_value;
use studyplan_core::migration::migrate_document;
use studyplan_core::study_plan::SubjectCatalog;
use studyplan_core::types::DbId;

use crate::bootstrap::is_server_starting;
use crate::repositories::ProgressRepo;
use crate::DbPool;

/// Counts from one pass over the `progress` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DataMigrationSummary {
    pub scanned: usize,
    pub migrated: usize,
    pub skipped_encrypted: usize,
    pub failed: usize,
}

/// What happened to a single row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowOutcome {
    Clean,
    Migrated,
    Encrypted,
    /// The row disappeared between listing and locking.
    Missing,
}

/// Migrate every stored progress document.
///
/// A database error tied to one row (a constraint, a bad value) is logged,
/// counted in [`DataMigrationSummary::failed`], and the batch moves on.
/// Losing the connection fails the whole run so the caller can retry it.
pub async fn run_data_migration(
    pool: &DbPool,
    catalog: &SubjectCatalog,
) -> Result<DataMigrationSummary, sqlx::Error> {
    let user_ids = ProgressRepo::list_user_ids(pool).await?;
    let summary = migrate_rows(pool, catalog, &user_ids).await?;

    tracing::info!(
        scanned = summary.scanned,
        migrated = summary.migrated,
        skipped_encrypted = summary.skipped_encrypted,
        failed = summary.failed,
        "Progress data migration finished",
    );
    Ok(summary)
}

async fn migrate_rows(
    pool: &DbPool,
    catalog: &SubjectCatalog,
    user_ids: &[DbId],
) -> Result<DataMigrationSummary, sqlx::Error> {
    let mut summary = DataMigrationSummary::default();

    for &user_id in user_ids {
        summary.scanned += 1;
        match migrate_row(pool, catalog, user_id).await {
            Ok(RowOutcome::Migrated) => summary.migrated += 1,
            Ok(RowOutcome::Encrypted) => summary.skipped_encrypted += 1,
            Ok(RowOutcome::Clean | RowOutcome::Missing) => {}
            Err(e) if is_row_error(&e) => {
                summary.failed += 1;
                tracing::error!(user_id, error = %e, "Failed to migrate progress document");
            }
            Err(e) => {
                tracing::warn!(
                    user_id,
                    migrated = summary.migrated,
                    error = %e,
                    "Lost the database during progress data migration",
                );
                return Err(e);
            }
        }
    }

    Ok(summary)
}

/// A server-reported error about this row, as opposed to the connection or
/// pool failing underneath the batch.
fn is_row_error(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(_) | sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_)
    ) && !is_server_starting(error)
}

async fn migrate_row(
    pool: &DbPool,
    catalog: &SubjectCatalog,
    user_id: DbId,
) -> Result<RowOutcome, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let Some(mut data) = ProgressRepo::lock_data(&mut *tx, user_id).await? else {
        tx.rollback().await?;
        return Ok(RowOutcome::Missing);
    };

    if is_encrypted_value(&data) {
        tx.rollback().await?;
        return Ok(RowOutcome::Encrypted);
    }

    let report = migrate_document(&mut data, Utc::now(), catalog);
    for anomaly in &report.anomalies {
        tracing::warn!(
            user_id,
            subject = %anomaly.subject,
            chapter = ?anomaly.chapter,
            reason = %anomaly.reason,
            "Left unrecognized progress entry untouched",
        );
    }

    if !report.dirty {
        tx.rollback().await?;
        return Ok(RowOutcome::Clean);
    }

    ProgressRepo::replace_data(&mut *tx, user_id, &data).await?;
    tx.commit().await?;

    tracing::debug!(
        user_id,
        lectures_rewritten = report.lectures_rewritten,
        pins_removed = report.pins_removed,
        subjects_rekeyed = report.subjects_rekeyed,
        "Migrated progress document",
    );
    Ok(RowOutcome::Migrated)
}
