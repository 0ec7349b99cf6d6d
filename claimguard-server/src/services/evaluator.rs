//! Batch Evaluator
//!
//! Runs Stage-2 over every Stage-1 candidate, persists the Review Queue
//! (SQLite table and JSON file) and scores the verdicts against the
//! synthetic fraud labels.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use claimguard_common::models::{
    AnalysisOutcome, EvaluationMetrics, EvaluationSummary, StageTwoResult,
};
use claimguard_common::{PipelinePaths, Result};
use futures::stream::{self, StreamExt};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::claim_analyzer::{ClaimAnalyzer, Population};
use crate::db;

/// Precision/recall/F1 with zero for any undefined ratio
///
/// Each pair is `(label, predicted)`; the confusion matrix is `[[tn, fp], [fn, tp]]`.
pub fn classification_metrics(pairs: impl IntoIterator<Item = (bool, bool)>) -> EvaluationMetrics {
    let (mut tn, mut fp, mut fn_, mut tp) = (0u64, 0u64, 0u64, 0u64);
    for (label, predicted) in pairs {
        match (label, predicted) {
            (false, false) => tn += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (true, true) => tp += 1,
        }
    }

    let ratio = |num: u64, den: u64| if den == 0 { 0.0 } else { num as f64 / den as f64 };

    EvaluationMetrics {
        precision: ratio(tp, tp + fp),
        recall: ratio(tp, tp + fn_),
        f1: ratio(2 * tp, 2 * tp + fp + fn_),
        confusion_matrix: [[tn, fp], [fn_, tp]],
    }
}

fn write_queue_json(path: &Path, results: &[StageTwoResult]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(results)?)?;
    Ok(())
}

/// Stage-2 over all candidates of the current snapshot
pub struct BatchEvaluator {
    analyzer: ClaimAnalyzer,
    paths: PipelinePaths,
    concurrency: usize,
    top_k: usize,
}

impl BatchEvaluator {
    pub fn new(analyzer: ClaimAnalyzer, paths: PipelinePaths, concurrency: usize, top_k: usize) -> Self {
        Self {
            analyzer,
            paths,
            concurrency: concurrency.max(1),
            top_k: top_k.max(1),
        }
    }

    pub async fn evaluate_all(&self, pool: &SqlitePool) -> Result<EvaluationSummary> {
        let population = Arc::new(Population::load(pool).await?);

        let candidate_ids: Vec<String> = population
            .candidates()
            .map(|r| r.claim.claim_id.clone())
            .collect();

        if candidate_ids.is_empty() {
            tracing::info!("No Stage-1 candidates; nothing to evaluate");
            return Ok(EvaluationSummary::empty());
        }

        let run_id = Uuid::new_v4().to_string();
        let total = candidate_ids.len();
        let start = Instant::now();

        tracing::info!(run_id = %run_id, candidates = total, concurrency = self.concurrency, "Batch evaluation started");

        let processed = Arc::new(AtomicUsize::new(0));

        // Order-preserving so the queue follows the snapshot order
        let outcomes: Vec<AnalysisOutcome> = stream::iter(candidate_ids)
            .map(|claim_id| {
                let analyzer = self.analyzer.clone();
                let population = Arc::clone(&population);
                let processed = Arc::clone(&processed);
                let k = self.top_k;

                async move {
                    let outcome = analyzer.analyze_in_population(&population, &claim_id, k).await;

                    let current = processed.fetch_add(1, Ordering::Relaxed) + 1;
                    if current % 10 == 0 || current == total {
                        tracing::info!(progress = format!("{}/{}", current, total), "Batch evaluation progress");
                    }

                    outcome
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let results: Vec<StageTwoResult> = outcomes
            .into_iter()
            .filter_map(AnalysisOutcome::into_result)
            .collect();

        let duration_seconds = start.elapsed().as_secs_f64();

        db::review_queue::replace_queue(pool, &run_id, &results).await?;
        let json_path = self.paths.review_queue_json();
        write_queue_json(&json_path, &results)?;

        let metrics = classification_metrics(
            results
                .iter()
                .map(|r| (r.is_fraud_label, r.verdict.is_flagged())),
        );

        tracing::info!(
            run_id = %run_id,
            processed = results.len(),
            duration_s = format!("{:.2}", duration_seconds),
            precision = format!("{:.3}", metrics.precision),
            recall = format!("{:.3}", metrics.recall),
            f1 = format!("{:.3}", metrics.f1),
            confusion_matrix = ?metrics.confusion_matrix,
            "Batch evaluation complete"
        );

        Ok(EvaluationSummary {
            candidates_processed: results.len(),
            results_saved: true,
            run_id: Some(run_id),
            metrics: Some(metrics),
            duration_seconds,
            review_queue_json: Some(json_path.display().to_string()),
        })
    }
}
