//! claimguard-server library interface
//!
//! Exposes the pipeline services and the HTTP router for the binary and
//! for integration testing.

pub mod api;
pub mod capabilities;
pub mod db;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, Utc};
use claimguard_common::PipelineConfig;
use sqlx::SqlitePool;
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::CorsLayer;

use crate::capabilities::CapabilityRegistry;
use crate::services::{BatchEvaluator, ClaimAnalyzer, Embedder};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Claim store connection pool
    pub db: SqlitePool,
    /// Paths and tunables resolved at startup
    pub config: Arc<PipelineConfig>,
    pub capabilities: Arc<CapabilityRegistry>,
    pub embedder: Arc<dyn Embedder>,
    /// Serializes writers of shared snapshots (Stage-1, index, review queue)
    pub refresh_lock: Arc<Mutex<()>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        config: PipelineConfig,
        capabilities: CapabilityRegistry,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            db,
            config: Arc::new(config),
            capabilities: Arc::new(capabilities),
            embedder,
            refresh_lock: Arc::new(Mutex::new(())),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Stage-2 analyzer bound to the currently installed retriever
    pub async fn analyzer(&self) -> ClaimAnalyzer {
        ClaimAnalyzer::from_config(self.capabilities.retriever().await, &self.config)
    }

    pub async fn evaluator(&self) -> BatchEvaluator {
        BatchEvaluator::new(
            self.analyzer().await,
            self.config.paths.clone(),
            self.config.retrieval.concurrency,
            self.config.retrieval.top_k,
        )
    }

    pub async fn record_error(&self, message: impl Into<String>) {
        *self.last_error.write().await = Some(message.into());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::ui_routes())
        .merge(api::data_routes())
        .merge(api::feature_routes())
        .merge(api::embedding_routes())
        .merge(api::stage2_routes())
        .with_state(state)
        .layer(CorsLayer::permissive())
}
