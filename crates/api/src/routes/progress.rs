//! Route definitions for the `/progress` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::progress;
use crate::state::AppState;

/// Routes mounted at `/progress`. All require auth.
///
/// ```text
/// GET  /         -> get_progress
/// PUT  /         -> put_progress
/// GET  /summary  -> get_summary
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(progress::get_progress).put(progress::put_progress))
        .route("/summary", get(progress::get_summary))
}
