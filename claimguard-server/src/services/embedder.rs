//! Text embedders for the document index
//!
//! [`HashingEmbedder`] is a deterministic feature-hashing embedder: each
//! lower-cased alphanumeric token is hashed with SHA-256, the digest picks a
//! bucket and a sign, and the resulting vector is L2-normalised. The same
//! text always maps to the same vector on every platform and process.

use sha2::{Digest, Sha256};

/// Default embedding width
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Maps text to a fixed-width vector
pub trait Embedder: Send + Sync {
    /// Short identifier persisted alongside the index
    fn name(&self) -> &str;

    fn dimensions(&self) -> usize;

    fn embed(&self, text: &str) -> Vec<f32>;

    fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// SHA-256 feature-hashing embedder
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub const NAME: &'static str = "sha256-feature-hashing";

    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

impl Embedder for HashingEmbedder {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        for token in Self::tokens(text) {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimensions as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        vector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_output() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed("Invoice for claim C100000 amount 1200.5 procedure PROC_A");
        let b = embedder.embed("Invoice for claim C100000 amount 1200.5 procedure PROC_A");
        assert_eq!(a, b);
        assert_eq!(a.len(), DEFAULT_DIMENSIONS);
    }

    #[test]
    fn test_unit_norm() {
        let embedder = HashingEmbedder::default();
        let v = embedder.embed("provider has an invalid license");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_case_and_punctuation_insensitive() {
        let embedder = HashingEmbedder::new(64);
        assert_eq!(embedder.embed("Duplicate, CHARGE!"), embedder.embed("duplicate charge"));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(16);
        assert!(embedder.embed("  ...  ").iter().all(|v| *v == 0.0));
    }
}
