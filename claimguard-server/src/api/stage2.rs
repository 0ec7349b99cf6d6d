//! Stage-2 analysis, batch evaluation and candidate listings
//!
//! GET /stage2/analyze, POST /stage2/evaluate, GET /candidates/list,
//! GET /review-queue

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use claimguard_common::models::{AnalysisOutcome, EvaluationSummary, StageTwoResult};
use claimguard_common::Error;
use serde::{Deserialize, Serialize};

use crate::db;
use crate::db::stage1::CandidateRow;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

const MAX_K: usize = 100;

#[derive(Debug, Deserialize)]
pub struct AnalyzeParams {
    pub claim_id: String,
    pub k: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CandidateList {
    pub count: usize,
    pub candidates: Vec<CandidateRow>,
}

#[derive(Debug, Serialize)]
pub struct ReviewQueueResponse {
    pub count: usize,
    pub results: Vec<StageTwoResult>,
}

fn parse_limit(limit: Option<i64>, default: i64) -> ApiResult<i64> {
    match limit {
        None => Ok(default),
        Some(n) if n >= 0 => Ok(n),
        Some(n) => Err(ApiError::BadRequest(format!("limit must be non-negative, got {}", n))),
    }
}

/// GET /stage2/analyze?claim_id=..&k=..
///
/// An unknown claim id answers 404 with the `not_found` result as body.
pub async fn analyze(State(state): State<AppState>, Query(params): Query<AnalyzeParams>) -> ApiResult<Response> {
    let k = params.k.unwrap_or(state.config.retrieval.top_k);
    if k == 0 || k > MAX_K {
        return Err(ApiError::BadRequest(format!("k must be between 1 and {}", MAX_K)));
    }

    let analyzer = state.analyzer().await;
    let outcome = analyzer.analyze_claim(&state.db, &params.claim_id, k).await?;

    let status = match outcome {
        AnalysisOutcome::Analyzed(_) => StatusCode::OK,
        AnalysisOutcome::NotFound(_) => StatusCode::NOT_FOUND,
    };
    Ok((status, Json(outcome)).into_response())
}

/// POST /stage2/evaluate
pub async fn evaluate(State(state): State<AppState>) -> ApiResult<Json<EvaluationSummary>> {
    // Review queue is replaced wholesale by each batch
    let _guard = state.refresh_lock.lock().await;

    let evaluator = state.evaluator().await;
    match evaluator.evaluate_all(&state.db).await {
        Ok(summary) => Ok(Json(summary)),
        Err(err) => {
            state.record_error(format!("Batch evaluation failed: {}", err)).await;
            Err(err.into())
        }
    }
}

/// GET /candidates/list?limit=200
pub async fn list_candidates(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> ApiResult<Json<CandidateList>> {
    let limit = parse_limit(params.limit, 200)?;

    if db::stage1::snapshot_size(&state.db).await? == 0 {
        return Err(Error::DataUnavailable("Stage-1 snapshot missing; run /features/compute".to_string()).into());
    }

    let candidates = db::stage1::list_candidates(&state.db, limit).await?;
    Ok(Json(CandidateList {
        count: candidates.len(),
        candidates,
    }))
}

/// GET /review-queue?limit=..
pub async fn review_queue(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> ApiResult<Json<ReviewQueueResponse>> {
    let limit = parse_limit(params.limit, -1)?;
    // SQLite treats a negative LIMIT as unbounded
    let results = db::review_queue::load_queue(&state.db, limit).await?;
    Ok(Json(ReviewQueueResponse {
        count: results.len(),
        results,
    }))
}

pub fn stage2_routes() -> Router<AppState> {
    Router::new()
        .route("/stage2/analyze", get(analyze))
        .route("/stage2/evaluate", post(evaluate))
        .route("/candidates/list", get(list_candidates))
        .route("/review-queue", get(review_queue))
}
