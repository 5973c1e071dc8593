//! Postgres storage for users and progress documents.
//!
//! - [`models`] / [`repositories`] -- row structs and zero-sized repos.
//! - [`data_migration`] -- repairs stored progress documents at startup.
//! - [`bootstrap`] -- connect, apply schema, migrate, with bounded retries.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

pub mod bootstrap;
pub mod data_migration;
pub mod models;
pub mod repositories;

pub type DbPool = sqlx::PgPool;

/// Maximum pooled connections.
const MAX_CONNECTIONS: u32 = 20;

/// How long a caller waits for a pooled connection.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a connection pool from a database URL, connecting eagerly.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await
}

/// Create a pool without connecting. Connections are opened on first use,
/// so the server can start while the database is still coming up.
pub fn create_lazy_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    create_lazy_pool_with_timeout(database_url, ACQUIRE_TIMEOUT)
}

pub fn create_lazy_pool_with_timeout(
    database_url: &str,
    acquire_timeout: Duration,
) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(acquire_timeout)
        .connect_lazy(database_url)
}

/// Round-trip a trivial query to verify connectivity.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply pending schema migrations from `db/migrations`.
///
/// Every statement is written to be re-runnable (`IF NOT EXISTS`), and sqlx
/// records applied versions, so calling this on every start is safe.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}
