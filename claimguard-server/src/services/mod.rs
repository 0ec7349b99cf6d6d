//! Pipeline services
//!
//! Stage-1 features, Stage-2 analysis and batch evaluation, plus the
//! concrete collaborators they consume: synthetic data, document chunks,
//! embeddings and retrieval.

pub mod claim_analyzer;
pub mod doc_preparer;
pub mod embedder;
pub mod evaluator;
pub mod feature_engine;
pub mod keyword_scanner;
pub mod retriever;
pub mod stats;
pub mod synthetic_generator;
pub mod vector_index;

pub use claim_analyzer::{ClaimAnalyzer, Population};
pub use embedder::{Embedder, HashingEmbedder};
pub use evaluator::BatchEvaluator;
pub use feature_engine::{compute_stage1, run_stage1};
pub use keyword_scanner::KeywordScanner;
pub use retriever::{IndexRetriever, ResilientRetriever, Retriever, UnavailableRetriever};
pub use synthetic_generator::{generate_synthetic_data, GenerationOptions, GenerationSummary};
