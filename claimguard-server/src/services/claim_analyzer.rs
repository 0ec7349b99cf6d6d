//! Stage-2 Claim Analyzer
//!
//! Combines four signals into a bounded suspicion score for one claim:
//! - Stage-1 score (0.25 per flag)
//! - procedure-level amount outlier, re-derived from the current snapshot (+0.45)
//! - suspicious keywords in retrieved chunks (+0.35)
//! - distance bonus from the closest retrieved chunk (up to +0.15)
//!
//! Analysis never mutates shared data and is safe to run concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use claimguard_common::models::{
    AnalysisOutcome, DocPreview, NotFoundResult, RetrievedChunk, Stage1Record, StageTwoResult,
    Verdict,
};
use claimguard_common::{PipelineConfig, RetrievalSettings, Result};
use sqlx::SqlitePool;

use super::keyword_scanner::KeywordScanner;
use super::retriever::{ResilientRetriever, Retriever};
use super::stats::{procedure_quartiles, QuartileStats};
use crate::db;

pub const STAGE1_WEIGHT: f64 = 0.25;
pub const AMOUNT_OUTLIER_WEIGHT: f64 = 0.45;
pub const KEYWORD_WEIGHT: f64 = 0.35;
pub const EMBED_BONUS_WEIGHT: f64 = 0.15;
/// Bonuses at or below this are not reported
pub const EMBED_BONUS_MIN: f64 = 0.001;

/// Stage-1 snapshot plus the procedure statistics Stage-2 derives from it
#[derive(Debug, Clone, Default)]
pub struct Population {
    records: Vec<Stage1Record>,
    by_claim_id: HashMap<String, usize>,
    quartiles: HashMap<String, QuartileStats>,
}

impl Population {
    pub fn from_snapshot(records: Vec<Stage1Record>) -> Self {
        let mut by_claim_id = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            // First occurrence wins for repeated ids
            by_claim_id.entry(record.claim.claim_id.clone()).or_insert(i);
        }

        let quartiles = procedure_quartiles(
            records
                .iter()
                .map(|r| (r.claim.procedure_code.as_str(), r.claim.amount)),
        );

        Self {
            records,
            by_claim_id,
            quartiles,
        }
    }

    pub async fn load(pool: &SqlitePool) -> Result<Self> {
        Ok(Self::from_snapshot(db::stage1::load_snapshot(pool).await?))
    }

    pub fn get(&self, claim_id: &str) -> Option<&Stage1Record> {
        self.by_claim_id.get(claim_id).map(|&i| &self.records[i])
    }

    pub fn quartiles(&self, procedure_code: &str) -> Option<&QuartileStats> {
        self.quartiles.get(procedure_code)
    }

    pub fn records(&self) -> &[Stage1Record] {
        &self.records
    }

    pub fn candidates(&self) -> impl Iterator<Item = &Stage1Record> {
        self.records.iter().filter(|r| r.is_candidate())
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Retrieval query for a claim
pub fn build_query(record: &Stage1Record) -> String {
    format!(
        "Invoice for claim {} amount {} procedure {}",
        record.claim.claim_id, record.claim.amount, record.claim.procedure_code
    )
}

/// `max(0, 0.15 * (1 - d / (d + 1)))`; closer chunks give a larger bonus
pub fn embedding_bonus(distance: f64) -> f64 {
    let d = distance.max(0.0);
    (EMBED_BONUS_WEIGHT * (1.0 - d / (d + 1.0))).max(0.0)
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Combine all Stage-2 signals for one claim
pub fn score_claim(
    record: &Stage1Record,
    stats: Option<&QuartileStats>,
    chunks: &[RetrievedChunk],
    scanner: &KeywordScanner,
) -> StageTwoResult {
    let claim = &record.claim;
    let mut score = record.stage1_score as f64 * STAGE1_WEIGHT;
    let mut reasons = Vec::new();

    let is_amount_outlier = stats.is_some_and(|s| s.is_outlier(claim.amount));
    if is_amount_outlier {
        score += AMOUNT_OUTLIER_WEIGHT;
        reasons.push("amount_outlier".to_string());
    }

    let keyword_matches = scanner.count_matches(chunks);
    if keyword_matches > 0 {
        score += KEYWORD_WEIGHT * (keyword_matches as f64).min(1.0);
        reasons.push(format!("keyword_matches:{}", keyword_matches));
    }

    let closest = chunks
        .iter()
        .map(|c| c.distance)
        .filter(|d| d.is_finite())
        .min_by(|a, b| a.total_cmp(b));
    if let Some(distance) = closest {
        let bonus = embedding_bonus(distance);
        if bonus > EMBED_BONUS_MIN {
            score += bonus;
            reasons.push(format!("embed_bonus:{}", round3(bonus)));
        }
    }

    let score = score.clamp(0.0, 1.0);

    StageTwoResult {
        claim_id: claim.claim_id.clone(),
        provider_id: claim.provider_id.clone(),
        amount: claim.amount,
        stage1_score: record.stage1_score,
        is_fraud_label: claim.is_fraud_label,
        is_amount_outlier,
        keyword_matches,
        score,
        verdict: Verdict::from_score(score),
        reasons,
        retrieved_docs: chunks.iter().map(DocPreview::from_chunk).collect(),
    }
}

/// Stage-2 analysis entry point
#[derive(Clone)]
pub struct ClaimAnalyzer {
    retriever: ResilientRetriever,
    scanner: KeywordScanner,
}

impl ClaimAnalyzer {
    pub fn new(retriever: Arc<dyn Retriever>, retrieval: RetrievalSettings, scanner: KeywordScanner) -> Self {
        Self {
            retriever: ResilientRetriever::new(retriever, retrieval),
            scanner,
        }
    }

    pub fn from_config(retriever: Arc<dyn Retriever>, config: &PipelineConfig) -> Self {
        Self::new(
            retriever,
            config.retrieval.clone(),
            KeywordScanner::from_settings(&config.scoring),
        )
    }

    /// Analyze one claim against the current Stage-1 snapshot
    pub async fn analyze_claim(&self, pool: &SqlitePool, claim_id: &str, k: usize) -> Result<AnalysisOutcome> {
        let population = Population::load(pool).await?;
        Ok(self.analyze_in_population(&population, claim_id, k).await)
    }

    /// Analyze one claim against an already-loaded population
    pub async fn analyze_in_population(&self, population: &Population, claim_id: &str, k: usize) -> AnalysisOutcome {
        let Some(record) = population.get(claim_id) else {
            tracing::debug!(claim_id, "Claim not in Stage-1 population");
            return AnalysisOutcome::NotFound(NotFoundResult::new(claim_id));
        };

        let query = build_query(record);
        let chunks = self.retriever.retrieve_or_empty(&query, k).await;

        let result = score_claim(
            record,
            population.quartiles(&record.claim.procedure_code),
            &chunks,
            &self.scanner,
        );

        tracing::debug!(
            claim_id,
            score = result.score,
            verdict = %result.verdict,
            retrieved = chunks.len(),
            "Stage-2 analysis complete"
        );

        AnalysisOutcome::Analyzed(result)
    }
}
