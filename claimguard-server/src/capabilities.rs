//! Capability registry
//!
//! Built once at startup. Each optional collaborator records whether it is
//! usable and why; handlers consult the registry instead of probing.

use std::sync::Arc;

use claimguard_common::PipelinePaths;
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::RwLock;

use crate::db;
use crate::services::embedder::Embedder;
use crate::services::retriever::{IndexRetriever, Retriever, UnavailableRetriever};
use crate::services::vector_index;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityStatus {
    pub available: bool,
    pub detail: String,
}

impl CapabilityStatus {
    pub fn available(detail: impl Into<String>) -> Self {
        Self {
            available: true,
            detail: detail.into(),
        }
    }

    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self {
            available: false,
            detail: detail.into(),
        }
    }
}

/// Point-in-time view reported by `/health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilitySnapshot {
    pub claim_store: CapabilityStatus,
    pub retrieval: CapabilityStatus,
    pub llm: CapabilityStatus,
}

pub struct CapabilityRegistry {
    retriever: RwLock<Arc<dyn Retriever>>,
    statuses: RwLock<CapabilitySnapshot>,
}

impl CapabilityRegistry {
    /// Registry with an explicit retriever; used by tests and embedders of the library
    pub fn with_retriever(retriever: Arc<dyn Retriever>, snapshot: CapabilitySnapshot) -> Self {
        Self {
            retriever: RwLock::new(retriever),
            statuses: RwLock::new(snapshot),
        }
    }

    /// Probe every capability once
    pub async fn initialize(
        pool: &SqlitePool,
        paths: &PipelinePaths,
        embedder: Arc<dyn Embedder>,
        llm_configured: bool,
    ) -> Self {
        let claim_store = claim_store_status(pool).await;

        let (retriever, retrieval): (Arc<dyn Retriever>, CapabilityStatus) =
            match vector_index::load_index(paths, embedder.as_ref()) {
                Ok(index) => {
                    let detail = format!("{} chunks indexed", index.len());
                    (Arc::new(IndexRetriever::new(embedder, index)), CapabilityStatus::available(detail))
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Retrieval index not loaded; Stage-2 will run without documents");
                    (
                        Arc::new(UnavailableRetriever::new(err.to_string())),
                        CapabilityStatus::unavailable(err.to_string()),
                    )
                }
            };

        let llm = if llm_configured {
            CapabilityStatus::available("API key configured")
        } else {
            CapabilityStatus::unavailable("no API key configured")
        };

        Self::with_retriever(
            retriever,
            CapabilitySnapshot {
                claim_store,
                retrieval,
                llm,
            },
        )
    }

    /// Current retriever (possibly the unavailable stand-in)
    pub async fn retriever(&self) -> Arc<dyn Retriever> {
        Arc::clone(&*self.retriever.read().await)
    }

    /// Atomically swap in a freshly built retriever
    pub async fn install_retriever(&self, retriever: Arc<dyn Retriever>, detail: impl Into<String>) {
        *self.retriever.write().await = retriever;
        self.statuses.write().await.retrieval = CapabilityStatus::available(detail);
    }

    pub async fn refresh_claim_store(&self, pool: &SqlitePool) {
        let status = claim_store_status(pool).await;
        self.statuses.write().await.claim_store = status;
    }

    pub async fn snapshot(&self) -> CapabilitySnapshot {
        self.statuses.read().await.clone()
    }
}

async fn claim_store_status(pool: &SqlitePool) -> CapabilityStatus {
    match db::claims::count_claims(pool).await {
        Ok(0) => CapabilityStatus::available("connected; no claims generated yet"),
        Ok(n) => CapabilityStatus::available(format!("connected; {} claims", n)),
        Err(err) => CapabilityStatus::unavailable(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::embedder::HashingEmbedder;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_initialize_without_index() {
        let dir = TempDir::new().unwrap();
        let paths = PipelinePaths::new(dir.path());
        paths.ensure_directories().unwrap();
        let pool = db::init_database_pool(&paths.database).await.unwrap();

        let registry =
            CapabilityRegistry::initialize(&pool, &paths, Arc::new(HashingEmbedder::default()), false).await;
        let snapshot = registry.snapshot().await;

        assert!(snapshot.claim_store.available);
        assert!(!snapshot.retrieval.available);
        assert!(!snapshot.llm.available);

        let err = registry.retriever().await.retrieve("q", 3).await.unwrap_err();
        assert!(err.is_data_unavailable());
    }

    #[tokio::test]
    async fn test_install_retriever_updates_status() {
        let dir = TempDir::new().unwrap();
        let paths = PipelinePaths::new(dir.path());
        paths.ensure_directories().unwrap();
        let pool = db::init_database_pool(&paths.database).await.unwrap();
        let registry =
            CapabilityRegistry::initialize(&pool, &paths, Arc::new(HashingEmbedder::default()), true).await;

        registry
            .install_retriever(Arc::new(UnavailableRetriever::new("stub")), "3 chunks indexed")
            .await;
        let snapshot = registry.snapshot().await;
        assert!(snapshot.retrieval.available);
        assert_eq!(snapshot.retrieval.detail, "3 chunks indexed");
        assert!(snapshot.llm.available);
    }
}
