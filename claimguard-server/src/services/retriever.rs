//! Retrieval collaborator
//!
//! `retrieve(query, k)` returns up to `k` chunks in ascending distance.
//! Stage-2 never sees a retrieval error: [`ResilientRetriever`] bounds each
//! attempt with a timeout, retries transient failures with exponential
//! backoff, and finally degrades to an empty result.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use claimguard_common::models::RetrievedChunk;
use claimguard_common::{Error, RetrievalSettings, Result};

use super::embedder::Embedder;
use super::vector_index::FlatIndex;

/// Upper bound on a single backoff sleep
const MAX_BACKOFF: Duration = Duration::from_millis(1000);

#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>>;
}

/// Embeds the query and searches a loaded [`FlatIndex`]
pub struct IndexRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<FlatIndex>,
}

impl IndexRetriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: FlatIndex) -> Self {
        Self {
            embedder,
            index: Arc::new(index),
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[async_trait]
impl Retriever for IndexRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        let embedder = Arc::clone(&self.embedder);
        let index = Arc::clone(&self.index);
        let query = query.to_string();

        // Exact search is CPU-bound over every vector
        tokio::task::spawn_blocking(move || {
            let vector = embedder.embed(&query);
            index.search(&vector, k)
        })
        .await
        .map_err(|e| Error::Retrieval(format!("search task failed: {}", e)))?
    }
}

/// Stand-in used until an index has been built
#[derive(Debug, Clone)]
pub struct UnavailableRetriever {
    reason: String,
}

impl UnavailableRetriever {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Retriever for UnavailableRetriever {
    async fn retrieve(&self, _query: &str, _k: usize) -> Result<Vec<RetrievedChunk>> {
        Err(Error::DataUnavailable(self.reason.clone()))
    }
}

/// Timeout + retry + empty fallback around any [`Retriever`]
#[derive(Clone)]
pub struct ResilientRetriever {
    inner: Arc<dyn Retriever>,
    settings: RetrievalSettings,
}

impl ResilientRetriever {
    pub fn new(inner: Arc<dyn Retriever>, settings: RetrievalSettings) -> Self {
        Self { inner, settings }
    }

    /// Retrieve with bounded retries; the last error is returned
    ///
    /// DataUnavailable is not retried since it cannot clear up by waiting.
    pub async fn try_retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        let start = Instant::now();
        let mut backoff = self.settings.initial_backoff;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let outcome = match tokio::time::timeout(self.settings.timeout, self.inner.retrieve(query, k)).await {
                Ok(result) => result,
                Err(_) => Err(Error::Retrieval(format!(
                    "retrieval timed out after {} ms",
                    self.settings.timeout.as_millis()
                ))),
            };

            match outcome {
                Ok(mut chunks) => {
                    if attempt > 1 {
                        tracing::debug!(
                            attempt,
                            elapsed_ms = start.elapsed().as_millis() as u64,
                            "Retrieval succeeded after retry"
                        );
                    }
                    chunks.truncate(k);
                    return Ok(chunks);
                }
                Err(err) if err.is_data_unavailable() => return Err(err),
                Err(err) => {
                    if attempt > self.settings.max_retries {
                        return Err(err);
                    }

                    let sleep_for = backoff.min(MAX_BACKOFF);
                    tracing::warn!(
                        attempt,
                        backoff_ms = sleep_for.as_millis() as u64,
                        error = %err,
                        "Retrieval failed, will retry after backoff"
                    );
                    tokio::time::sleep(sleep_for).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
    }

    /// Retrieval failure of any kind becomes an empty result
    pub async fn retrieve_or_empty(&self, query: &str, k: usize) -> Vec<RetrievedChunk> {
        match self.try_retrieve(query, k).await {
            Ok(chunks) => chunks,
            Err(err) => {
                tracing::warn!(error = %err, "Retrieval unavailable, continuing with no documents");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyRetriever {
        failures_before_success: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Retriever for FlakyRetriever {
        async fn retrieve(&self, _query: &str, _k: usize) -> Result<Vec<RetrievedChunk>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                Err(Error::Retrieval("transient".to_string()))
            } else {
                Ok(vec![RetrievedChunk {
                    doc_id: "d1".to_string(),
                    claim_id: "C100000".to_string(),
                    text: "ok".to_string(),
                    distance: 0.2,
                }])
            }
        }
    }

    struct SlowRetriever;

    #[async_trait]
    impl Retriever for SlowRetriever {
        async fn retrieve(&self, _query: &str, _k: usize) -> Result<Vec<RetrievedChunk>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }
    }

    fn fast_settings(max_retries: u32) -> RetrievalSettings {
        RetrievalSettings {
            timeout: Duration::from_millis(50),
            max_retries,
            initial_backoff: Duration::from_millis(1),
            ..RetrievalSettings::default()
        }
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let inner = Arc::new(FlakyRetriever {
            failures_before_success: 2,
            calls: AtomicUsize::new(0),
        });
        let resilient = ResilientRetriever::new(inner.clone(), fast_settings(2));

        let chunks = resilient.try_retrieve("q", 5).await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let inner = Arc::new(FlakyRetriever {
            failures_before_success: 10,
            calls: AtomicUsize::new(0),
        });
        let resilient = ResilientRetriever::new(inner.clone(), fast_settings(1));

        assert!(resilient.retrieve_or_empty("q", 5).await.is_empty());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_timeout_falls_back_to_empty() {
        let resilient = ResilientRetriever::new(Arc::new(SlowRetriever), fast_settings(0));
        let start = Instant::now();
        assert!(resilient.retrieve_or_empty("q", 5).await.is_empty());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_unavailable_is_not_retried() {
        let resilient = ResilientRetriever::new(
            Arc::new(UnavailableRetriever::new("index not built")),
            fast_settings(3),
        );
        let err = resilient.try_retrieve("q", 5).await.unwrap_err();
        assert!(err.is_data_unavailable());
    }
}
