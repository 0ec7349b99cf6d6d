//! Stage-1 Feature Engine
//!
//! Computes per-claim statistical features over the full claim population:
//! provider volume and mean amount, procedure-level quartiles, and three
//! boolean red flags whose sum is the `stage1_score`.
//!
//! The snapshot is always recomputed from the whole population. Concurrent
//! refreshes are serialized by the caller (last writer wins on the stored
//! snapshot).

use std::collections::HashMap;
use std::time::Instant;

use claimguard_common::models::{Claim, Stage1Record, Stage1Summary};
use claimguard_common::Result;
use sqlx::SqlitePool;

use super::stats::{mean, median, procedure_quartiles, QuartileStats};
use crate::db;

/// Provider volume above this multiple of the median flags the claim
pub const HIGH_VOLUME_MEDIAN_MULTIPLIER: f64 = 2.0;

/// Exact identity of a claim for duplicate detection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DuplicateKey<'a> {
    patient_id: &'a str,
    provider_id: &'a str,
    amount_bits: u64,
    claim_date: chrono::NaiveDate,
}

impl<'a> DuplicateKey<'a> {
    fn of(claim: &'a Claim) -> Self {
        Self {
            patient_id: &claim.patient_id,
            provider_id: &claim.provider_id,
            // +0.0 folds -0.0 into 0.0 so equal amounts hash equally
            amount_bits: (claim.amount + 0.0).to_bits(),
            claim_date: claim.claim_date,
        }
    }
}

#[derive(Debug, Default, Clone)]
struct ProviderAggregate {
    count: u64,
    amounts: Vec<f64>,
}

/// Compute Stage-1 records for `claims`, one per input claim, in input order
pub fn compute_stage1(claims: &[Claim]) -> Vec<Stage1Record> {
    if claims.is_empty() {
        return Vec::new();
    }

    // Provider aggregates
    let mut providers: HashMap<&str, ProviderAggregate> = HashMap::new();
    for claim in claims {
        let entry = providers.entry(claim.provider_id.as_str()).or_default();
        entry.count += 1;
        entry.amounts.push(claim.amount);
    }
    let provider_means: HashMap<&str, f64> = providers
        .iter()
        .map(|(id, agg)| (*id, mean(&agg.amounts).unwrap_or(0.0)))
        .collect();

    // Procedure quartiles
    let quartiles = procedure_quartiles(
        claims
            .iter()
            .map(|c| (c.procedure_code.as_str(), c.amount)),
    );

    // Duplicate groups
    let mut duplicate_counts: HashMap<DuplicateKey<'_>, usize> = HashMap::new();
    for claim in claims {
        *duplicate_counts.entry(DuplicateKey::of(claim)).or_insert(0) += 1;
    }

    // Median over the per-row provider counts, so large providers weigh more
    let per_row_counts: Vec<f64> = claims
        .iter()
        .map(|c| providers[c.provider_id.as_str()].count as f64)
        .collect();
    let volume_threshold =
        median(&per_row_counts).unwrap_or(f64::INFINITY) * HIGH_VOLUME_MEDIAN_MULTIPLIER;

    claims
        .iter()
        .map(|claim| {
            let provider_total_claims = providers[claim.provider_id.as_str()].count;
            let stats = quartiles
                .get(&claim.procedure_code)
                .copied()
                .unwrap_or(QuartileStats {
                    q1: f64::NAN,
                    q3: f64::NAN,
                    iqr: f64::NAN,
                });

            let is_amount_outlier = stats.is_outlier(claim.amount);
            let is_duplicate = duplicate_counts
                .get(&DuplicateKey::of(claim))
                .is_some_and(|n| *n > 1);
            let provider_high_volume = provider_total_claims as f64 > volume_threshold;

            let stage1_score =
                is_amount_outlier as u8 + is_duplicate as u8 + provider_high_volume as u8;

            Stage1Record {
                claim: claim.clone(),
                provider_total_claims,
                provider_mean_amount: provider_means[claim.provider_id.as_str()],
                q3: stats.q3,
                iqr: stats.iqr,
                is_amount_outlier,
                is_duplicate,
                provider_high_volume,
                stage1_score,
            }
        })
        .collect()
}

/// Count of records with `stage1_score >= 1`
pub fn count_candidates(records: &[Stage1Record]) -> usize {
    records.iter().filter(|r| r.is_candidate()).count()
}

/// Recompute and persist the Stage-1 snapshot from the Claim Store
///
/// The population is read in a single query before any statistic is
/// computed, so quartiles never see a partial population.
pub async fn run_stage1(pool: &SqlitePool) -> Result<Stage1Summary> {
    let start = Instant::now();

    let claims = db::claims::load_claims(pool).await?;

    let records = tokio::task::spawn_blocking(move || compute_stage1(&claims))
        .await
        .map_err(|e| claimguard_common::Error::Internal(format!("Stage-1 task failed: {}", e)))?;

    db::stage1::replace_snapshot(pool, &records).await?;

    let summary = Stage1Summary {
        rows: records.len(),
        candidates: count_candidates(&records),
    };

    tracing::info!(
        rows = summary.rows,
        candidates = summary.candidates,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Stage-1 features computed"
    );

    Ok(summary)
}
