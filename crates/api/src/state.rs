use std::sync::Arc;

use studyplan_core::study_plan::StudyPlan;
use studyplan_db::bootstrap::DbHealth;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool. Lazy: usable only once `db_health` is ready.
    pub pool: studyplan_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Readiness of the database, set by the bootstrap task.
    pub db_health: DbHealth,
    /// The study plan served to clients and used for summaries.
    pub plan: Arc<StudyPlan>,
}
