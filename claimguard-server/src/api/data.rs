//! Data generation and ingest status
//!
//! POST /data/generate, GET /ingest

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use claimguard_common::Error;
use serde::{Deserialize, Serialize};

use crate::db;
use crate::error::ApiResult;
use crate::services::{generate_synthetic_data, GenerationOptions};
use crate::AppState;

/// Body of POST /data/generate; every field is optional
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    #[serde(default = "default_n_claims")]
    pub n_claims: usize,
    pub n_providers: Option<usize>,
    pub n_users: Option<usize>,
    pub n_documents: Option<usize>,
}

fn default_n_claims() -> usize {
    1000
}

impl Default for GenerateRequest {
    fn default() -> Self {
        Self {
            n_claims: default_n_claims(),
            n_providers: None,
            n_users: None,
            n_documents: None,
        }
    }
}

impl GenerateRequest {
    fn options(&self) -> GenerationOptions {
        let defaults = GenerationOptions::default();
        GenerationOptions {
            n_claims: self.n_claims,
            n_providers: self.n_providers.unwrap_or(defaults.n_providers),
            n_users: self.n_users.unwrap_or(defaults.n_users),
            n_documents: self.n_documents.unwrap_or(defaults.n_documents),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub status: String,
    pub claims: usize,
    pub providers: usize,
    pub users: usize,
    pub documents: usize,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub status: String,
    pub claims: i64,
}

/// POST /data/generate
pub async fn generate(
    State(state): State<AppState>,
    body: Option<Json<GenerateRequest>>,
) -> ApiResult<Json<GenerateResponse>> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let options = request.options();

    let _guard = state.refresh_lock.lock().await;
    let summary = generate_synthetic_data(&state.db, &state.config.paths, options).await?;
    state.capabilities.refresh_claim_store(&state.db).await;

    Ok(Json(GenerateResponse {
        status: "generated".to_string(),
        claims: summary.claims,
        providers: summary.providers,
        users: summary.users,
        documents: summary.documents,
    }))
}

/// GET /ingest
pub async fn ingest(State(state): State<AppState>) -> ApiResult<Json<IngestResponse>> {
    let claims = db::claims::count_claims(&state.db).await?;
    if claims == 0 {
        return Err(Error::DataUnavailable("raw claims not found; call /data/generate first".to_string()).into());
    }

    Ok(Json(IngestResponse {
        status: "raw_exists".to_string(),
        claims,
    }))
}

pub fn data_routes() -> Router<AppState> {
    Router::new()
        .route("/data/generate", post(generate))
        .route("/ingest", get(ingest))
}
