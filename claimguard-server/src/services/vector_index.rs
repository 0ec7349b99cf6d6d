//! Flat vector index over document chunks
//!
//! Vectors are persisted as JSON next to the chunk list; the two files are
//! aligned by position and tied together by a digest of the chunk list.
//! Search is exact squared-L2 over every vector.

use std::fs;
use std::path::Path;

use claimguard_common::models::{DocumentChunk, RetrievedChunk};
use claimguard_common::{Error, PipelinePaths, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::embedder::Embedder;

/// On-disk vector file layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedEmbeddings {
    pub dimensions: usize,
    pub embedder: String,
    /// `chunks_digest` of the chunk list the vectors were built from
    #[serde(default)]
    pub chunks_digest: String,
    pub vectors: Vec<Vec<f32>>,
}

/// Result of `build_index`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildSummary {
    pub chunks: usize,
    pub dimensions: usize,
    pub embeddings_saved: String,
}

/// Result of `index_info`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub chunks: usize,
    pub dimensions: usize,
    pub embedder: String,
    pub chunks_path: String,
    pub embeddings_path: String,
}

/// Exact nearest-neighbour index
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimensions: usize,
    chunks: Vec<DocumentChunk>,
    vectors: Vec<Vec<f32>>,
}

impl FlatIndex {
    pub fn new(dimensions: usize, chunks: Vec<DocumentChunk>, vectors: Vec<Vec<f32>>) -> Result<Self> {
        if chunks.len() != vectors.len() {
            return Err(Error::Schema(format!(
                "index has {} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }
        if let Some(bad) = vectors.iter().position(|v| v.len() != dimensions) {
            return Err(Error::Schema(format!(
                "vector {} has {} dimensions, expected {}",
                bad,
                vectors[bad].len(),
                dimensions
            )));
        }

        Ok(Self {
            dimensions,
            chunks,
            vectors,
        })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Up to `k` chunks nearest to `query`, ascending squared-L2 distance
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        if query.len() != self.dimensions {
            return Err(Error::InvalidInput(format!(
                "query has {} dimensions, index has {}",
                query.len(),
                self.dimensions
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, squared_l2(query, v)))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, distance)| {
                let chunk = &self.chunks[i];
                RetrievedChunk {
                    doc_id: chunk.doc_id.clone(),
                    claim_id: chunk.claim_id.clone(),
                    text: chunk.text.clone(),
                    distance: distance.max(0.0) as f64,
                }
            })
            .collect())
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Read the prepared chunk list
pub fn load_chunks(path: &Path) -> Result<Vec<DocumentChunk>> {
    if !path.exists() {
        return Err(Error::DataUnavailable(format!(
            "chunk metadata missing at {}; run document preparation first",
            path.display()
        )));
    }
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// SHA-256 over every chunk's id and text, hex encoded
pub fn chunks_digest(chunks: &[DocumentChunk]) -> String {
    let mut hasher = Sha256::new();
    for chunk in chunks {
        hasher.update(chunk.doc_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(chunk.text.as_bytes());
        hasher.update([0u8]);
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn load_embeddings(path: &Path) -> Result<PersistedEmbeddings> {
    if !path.exists() {
        return Err(Error::DataUnavailable(format!(
            "embeddings missing at {}; build the index first",
            path.display()
        )));
    }
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Embed every prepared chunk and persist the vectors
pub fn build_index(paths: &PipelinePaths, embedder: &dyn Embedder) -> Result<BuildSummary> {
    let chunks = load_chunks(&paths.chunks_json())?;
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embedder.embed_batch(&texts);

    let persisted = PersistedEmbeddings {
        dimensions: embedder.dimensions(),
        embedder: embedder.name().to_string(),
        chunks_digest: chunks_digest(&chunks),
        vectors,
    };

    let target = paths.embeddings_json();
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&target, serde_json::to_string(&persisted)?)?;

    tracing::info!(
        chunks = chunks.len(),
        dimensions = persisted.dimensions,
        path = %target.display(),
        "Embedding index built"
    );

    Ok(BuildSummary {
        chunks: chunks.len(),
        dimensions: persisted.dimensions,
        embeddings_saved: target.display().to_string(),
    })
}

/// Load the persisted index; fails if it was built by a different embedder
pub fn load_index(paths: &PipelinePaths, embedder: &dyn Embedder) -> Result<FlatIndex> {
    let embeddings = load_embeddings(&paths.embeddings_json())?;
    let chunks = load_chunks(&paths.chunks_json())?;

    if embeddings.dimensions != embedder.dimensions() || embeddings.embedder != embedder.name() {
        return Err(Error::Schema(format!(
            "index built with {} ({} dims), current embedder is {} ({} dims); rebuild the index",
            embeddings.embedder,
            embeddings.dimensions,
            embedder.name(),
            embedder.dimensions()
        )));
    }

    if embeddings.chunks_digest != chunks_digest(&chunks) {
        return Err(Error::Schema(format!(
            "chunk list at {} changed since the index was built; rebuild the index",
            paths.chunks_json().display()
        )));
    }

    FlatIndex::new(embeddings.dimensions, chunks, embeddings.vectors)
}

pub fn index_info(paths: &PipelinePaths) -> Result<IndexInfo> {
    let chunks_path = paths.chunks_json();
    let embeddings_path = paths.embeddings_json();
    let embeddings = load_embeddings(&embeddings_path)?;
    let chunks = load_chunks(&chunks_path)?;

    Ok(IndexInfo {
        chunks: chunks.len(),
        dimensions: embeddings.dimensions,
        embedder: embeddings.embedder,
        chunks_path: chunks_path.display().to_string(),
        embeddings_path: embeddings_path.display().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::embedder::HashingEmbedder;
    use tempfile::TempDir;

    fn chunk(id: &str, claim: &str, text: &str) -> DocumentChunk {
        DocumentChunk {
            doc_id: id.to_string(),
            claim_id: claim.to_string(),
            provider_id: None,
            text: text.to_string(),
        }
    }

    fn write_chunks(paths: &PipelinePaths, chunks: &[DocumentChunk]) {
        paths.ensure_directories().unwrap();
        fs::write(paths.chunks_json(), serde_json::to_string(chunks).unwrap()).unwrap();
    }

    #[test]
    fn test_search_orders_by_distance() {
        let index = FlatIndex::new(
            2,
            vec![chunk("a", "C1", "a"), chunk("b", "C2", "b"), chunk("c", "C3", "c")],
            vec![vec![3.0, 0.0], vec![1.0, 0.0], vec![0.0, 2.0]],
        )
        .unwrap();

        let results = index.search(&[0.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].doc_id, "b");
        assert_eq!(results[0].distance, 1.0);
        assert_eq!(results[1].doc_id, "c");
        assert_eq!(results[1].distance, 4.0);
    }

    #[test]
    fn test_search_k_larger_than_index() {
        let index = FlatIndex::new(1, vec![chunk("a", "C1", "a")], vec![vec![1.0]]).unwrap();
        assert_eq!(index.search(&[0.0], 10).unwrap().len(), 1);
        assert!(index.search(&[0.0, 1.0], 1).is_err());
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let err = FlatIndex::new(1, vec![chunk("a", "C1", "a")], vec![]).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn test_build_then_load_and_info() {
        let dir = TempDir::new().unwrap();
        let paths = PipelinePaths::new(dir.path());
        write_chunks(
            &paths,
            &[
                chunk("C100000_doc.txt_chunk0", "C100000", "provider has invalid license"),
                chunk("C100001_doc.txt_chunk0", "C100001", "routine follow-up visit"),
            ],
        );

        let embedder = HashingEmbedder::default();
        let summary = build_index(&paths, &embedder).unwrap();
        assert_eq!(summary.chunks, 2);
        assert_eq!(summary.dimensions, 384);

        let index = load_index(&paths, &embedder).unwrap();
        assert_eq!(index.len(), 2);

        // Identical text is the nearest neighbour at distance ~0
        let results = index.search(&embedder.embed("provider has invalid license"), 1).unwrap();
        assert_eq!(results[0].claim_id, "C100000");
        assert!(results[0].distance < 1e-6);

        let info = index_info(&paths).unwrap();
        assert_eq!(info.chunks, 2);
        assert_eq!(info.embedder, HashingEmbedder::NAME);
    }

    #[test]
    fn test_missing_inputs_are_data_unavailable() {
        let dir = TempDir::new().unwrap();
        let paths = PipelinePaths::new(dir.path());
        let embedder = HashingEmbedder::default();

        assert!(build_index(&paths, &embedder).unwrap_err().is_data_unavailable());
        assert!(index_info(&paths).unwrap_err().is_data_unavailable());
        assert!(load_index(&paths, &embedder).unwrap_err().is_data_unavailable());
    }

    #[test]
    fn test_embedder_mismatch_requires_rebuild() {
        let dir = TempDir::new().unwrap();
        let paths = PipelinePaths::new(dir.path());
        write_chunks(&paths, &[chunk("x", "C1", "text")]);
        build_index(&paths, &HashingEmbedder::new(8)).unwrap();

        let err = load_index(&paths, &HashingEmbedder::default()).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn test_rewritten_chunks_require_rebuild() {
        let dir = TempDir::new().unwrap();
        let paths = PipelinePaths::new(dir.path());
        let embedder = HashingEmbedder::default();
        write_chunks(
            &paths,
            &[
                chunk("x", "C100000", "provider holds an invalid license"),
                chunk("y", "C100001", "routine follow-up visit"),
            ],
        );
        build_index(&paths, &embedder).unwrap();

        // Same ids and count, different text
        write_chunks(
            &paths,
            &[
                chunk("x", "C100000", "payment processed per standard schedule"),
                chunk("y", "C100001", "routine follow-up visit"),
            ],
        );
        let err = load_index(&paths, &embedder).unwrap_err();
        assert!(matches!(err, Error::Schema(ref msg) if msg.contains("rebuild the index")));

        build_index(&paths, &embedder).unwrap();
        let index = load_index(&paths, &embedder).unwrap();
        let results = index
            .search(&embedder.embed("payment processed per standard schedule"), 1)
            .unwrap();
        assert_eq!(results[0].doc_id, "x");
        assert!(results[0].distance < 1e-6);
    }

    #[test]
    fn test_chunks_digest_tracks_content() {
        let a = [chunk("x", "C1", "ab")];
        let b = [chunk("xa", "C1", "b")];
        assert_ne!(chunks_digest(&a), chunks_digest(&b));
        assert_eq!(chunks_digest(&a), chunks_digest(&[chunk("x", "C2", "ab")]));
        assert_eq!(chunks_digest(&a).len(), 64);
    }
}
