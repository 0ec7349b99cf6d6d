//! POST /features/compute

use axum::{extract::State, routing::post, Json, Router};
use claimguard_common::models::Stage1Summary;

use crate::error::ApiResult;
use crate::services::run_stage1;
use crate::AppState;

/// Recompute the Stage-1 snapshot from the full claim population
pub async fn compute_features(State(state): State<AppState>) -> ApiResult<Json<Stage1Summary>> {
    // Stage-1 is not re-entrant on its output snapshot
    let _guard = state.refresh_lock.lock().await;

    match run_stage1(&state.db).await {
        Ok(summary) => Ok(Json(summary)),
        Err(err) => {
            state.record_error(format!("Stage-1 failed: {}", err)).await;
            Err(err.into())
        }
    }
}

pub fn feature_routes() -> Router<AppState> {
    Router::new().route("/features/compute", post(compute_features))
}
