//! Document preparation and the retrieval index
//!
//! POST /docs/prepare, POST /embeddings/build, GET /embeddings/info

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use claimguard_common::Error;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::services::doc_preparer::{self, PrepareSummary};
use crate::services::vector_index::{self, BuildSummary, IndexInfo};
use crate::services::IndexRetriever;
use crate::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrepareRequest {
    /// Defaults to `metadata.json` in the raw documents folder; relative
    /// paths resolve against that folder and nothing outside it is accepted
    pub metadata_path: Option<PathBuf>,
}

async fn blocking<T, F>(task: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> claimguard_common::Result<T> + Send + 'static,
{
    let result = tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| Error::Internal(format!("background task failed: {}", e)))??;
    Ok(result)
}

/// POST /docs/prepare
pub async fn prepare_docs(
    State(state): State<AppState>,
    body: Option<Json<PrepareRequest>>,
) -> ApiResult<Json<PrepareSummary>> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let paths = state.config.paths.clone();
    let metadata_path = doc_preparer::resolve_metadata_path(&paths, request.metadata_path.as_deref())?;

    let _guard = state.refresh_lock.lock().await;
    let summary = blocking(move || doc_preparer::prepare_docs(&paths, &metadata_path)).await?;
    Ok(Json(summary))
}

/// POST /embeddings/build
///
/// Builds the index and swaps the new retriever into the registry.
pub async fn build_embeddings(State(state): State<AppState>) -> ApiResult<Json<BuildSummary>> {
    let paths = state.config.paths.clone();
    let embedder = Arc::clone(&state.embedder);

    let _guard = state.refresh_lock.lock().await;
    let (summary, index) = blocking(move || {
        let summary = vector_index::build_index(&paths, embedder.as_ref())?;
        let index = vector_index::load_index(&paths, embedder.as_ref())?;
        Ok((summary, index))
    })
    .await?;

    let detail = format!("{} chunks indexed", index.len());
    state
        .capabilities
        .install_retriever(Arc::new(IndexRetriever::new(Arc::clone(&state.embedder), index)), detail)
        .await;

    Ok(Json(summary))
}

/// GET /embeddings/info
pub async fn embeddings_info(State(state): State<AppState>) -> ApiResult<Json<IndexInfo>> {
    let paths = state.config.paths.clone();
    let info = blocking(move || vector_index::index_info(&paths)).await?;
    Ok(Json(info))
}

pub fn embedding_routes() -> Router<AppState> {
    Router::new()
        .route("/docs/prepare", post(prepare_docs))
        .route("/embeddings/build", post(build_embeddings))
        .route("/embeddings/info", get(embeddings_info))
}
