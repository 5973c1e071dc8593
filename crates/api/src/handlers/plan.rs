//! Handler for the study plan.

use axum::extract::State;
use axum::Json;
use studyplan_core::study_plan::StudyPlan;

use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/plan
pub async fn get_plan(State(state): State<AppState>) -> Json<DataResponse<StudyPlan>> {
    Json(DataResponse {
        data: state.plan.as_ref().clone(),
    })
}
