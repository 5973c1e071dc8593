//! Database initialization with bounded retries.
//!
//! The server starts accepting connections before the database is usable.
//! [`initialize`] runs in a background task: it waits for Postgres to accept
//! queries, applies the schema, rewrites legacy progress documents once, and
//! then flips the shared [`DbHealth`] handle to [`DbStatus::Ready`]. Until
//! then the API answers 503.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use studyplan_core::study_plan::SubjectCatalog;
use tokio_util::sync::CancellationToken;

use crate::data_migration::{run_data_migration, DataMigrationSummary};
use crate::DbPool;

/// Postgres `cannot_connect_now`: the server is up but still starting.
const PG_CANNOT_CONNECT_NOW: &str = "57P03";

// ---------------------------------------------------------------------------
// Health handle
// ---------------------------------------------------------------------------

/// Lifecycle of the database as seen by the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbStatus {
    Initializing,
    Ready,
    Down { last_error: String },
}

impl DbStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Down { .. } => "down",
        }
    }
}

#[derive(Debug)]
struct HealthInner {
    status: DbStatus,
    last_error: Option<String>,
}

/// Shared, cloneable view of database readiness.
///
/// Written by the bootstrap task, read by the readiness middleware and the
/// health endpoint.
#[derive(Debug, Clone)]
pub struct DbHealth {
    inner: Arc<RwLock<HealthInner>>,
}

impl Default for DbHealth {
    fn default() -> Self {
        Self::new()
    }
}

impl DbHealth {
    /// A handle in the [`DbStatus::Initializing`] state.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HealthInner {
                status: DbStatus::Initializing,
                last_error: None,
            })),
        }
    }

    /// A handle that is already ready. Useful when the caller has set up the
    /// database itself.
    pub fn ready() -> Self {
        let health = Self::new();
        health.mark_ready();
        health
    }

    pub fn status(&self) -> DbStatus {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .status
            .clone()
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.status(), DbStatus::Ready)
    }

    /// The most recent initialization error, kept after a later success.
    pub fn last_error(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last_error
            .clone()
    }

    pub fn mark_ready(&self) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .status = DbStatus::Ready;
    }

    pub fn mark_down(&self, error: impl Into<String>) {
        let error = error.into();
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.last_error = Some(error.clone());
        inner.status = DbStatus::Down { last_error: error };
    }

    /// Remember a failed attempt without changing the status.
    pub fn record_error(&self, error: impl Into<String>) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .last_error = Some(error.into());
    }
}

// ---------------------------------------------------------------------------
// Configuration and errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// Total attempts before giving up.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub retry_delay: Duration,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("Database connection failed: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("Schema migration failed: {0}")]
    Schema(#[source] sqlx::migrate::MigrateError),

    #[error("Progress data migration failed: {0}")]
    DataMigration(#[source] sqlx::Error),

    #[error("Database initialization gave up after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },

    #[error("Database initialization cancelled")]
    Cancelled,
}

impl BootstrapError {
    /// Whether the failure looks like the database is still coming up.
    pub fn is_server_starting(&self) -> bool {
        match self {
            Self::Connect(e) | Self::DataMigration(e) => is_server_starting(e),
            Self::Schema(sqlx::migrate::MigrateError::Execute(e)) => is_server_starting(e),
            _ => false,
        }
    }
}

/// `57P03`, an I/O error, or a pool timeout: Postgres is not accepting
/// queries yet.
pub fn is_server_starting(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(PG_CANNOT_CONNECT_NOW),
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut => true,
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Sequencer
// ---------------------------------------------------------------------------

/// Bring the database to a usable state, retrying on any failure.
///
/// Marks `health` ready on success. After the last failed attempt (or on
/// cancellation) marks it down and returns the error; the status stays down
/// for the life of the process.
pub async fn initialize(
    pool: &DbPool,
    catalog: &SubjectCatalog,
    config: &BootstrapConfig,
    health: &DbHealth,
    cancel: &CancellationToken,
) -> Result<DataMigrationSummary, BootstrapError> {
    let max_attempts = config.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        tracing::info!(attempt, max_attempts, "Initializing database");

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(BootstrapError::Cancelled),
            result = try_initialize(pool, catalog) => result,
        };

        match result {
            Ok(summary) => {
                health.mark_ready();
                tracing::info!(attempt, "Database ready");
                return Ok(summary);
            }
            Err(BootstrapError::Cancelled) => {
                health.mark_down(BootstrapError::Cancelled.to_string());
                return Err(BootstrapError::Cancelled);
            }
            Err(e) => {
                health.record_error(e.to_string());
                if e.is_server_starting() {
                    tracing::warn!(attempt, error = %e, "Database is still starting");
                } else {
                    tracing::error!(attempt, error = %e, "Database initialization attempt failed");
                }
            }
        }

        if attempt < max_attempts {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    health.mark_down(BootstrapError::Cancelled.to_string());
                    return Err(BootstrapError::Cancelled);
                }
                _ = tokio::time::sleep(config.retry_delay) => {}
            }
        }
    }

    let last_error = health
        .last_error()
        .unwrap_or_else(|| "unknown error".to_string());
    health.mark_down(last_error.clone());
    tracing::error!(
        attempts = max_attempts,
        error = %last_error,
        "Database initialization failed; API will answer 503",
    );
    Err(BootstrapError::Exhausted {
        attempts: max_attempts,
        last_error,
    })
}

/// One attempt: connectivity, schema, then the progress rewrite.
async fn try_initialize(
    pool: &DbPool,
    catalog: &SubjectCatalog,
) -> Result<DataMigrationSummary, BootstrapError> {
    crate::health_check(pool)
        .await
        .map_err(BootstrapError::Connect)?;
    crate::run_migrations(pool)
        .await
        .map_err(BootstrapError::Schema)?;
    run_data_migration(pool, catalog)
        .await
        .map_err(BootstrapError::DataMigration)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
