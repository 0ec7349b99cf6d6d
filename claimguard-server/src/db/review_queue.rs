//! Review queue: tabular form of the latest batch of Stage-2 results

use chrono::Utc;
use claimguard_common::models::{DocPreview, StageTwoResult, Verdict};
use claimguard_common::Result;
use sqlx::{Row, SqlitePool};

use super::schema::require_columns;

/// Replace the queue with `results`, preserving their order
pub async fn replace_queue(pool: &SqlitePool, run_id: &str, results: &[StageTwoResult]) -> Result<()> {
    let created_at = Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM review_queue").execute(&mut *tx).await?;

    for (position, result) in results.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO review_queue (
                position, run_id, claim_id, provider_id, amount, stage1_score,
                is_fraud_label, is_amount_outlier, keyword_matches, score, verdict,
                reasons, retrieved_docs, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(position as i64)
        .bind(run_id)
        .bind(&result.claim_id)
        .bind(&result.provider_id)
        .bind(result.amount)
        .bind(result.stage1_score as i64)
        .bind(result.is_fraud_label as i64)
        .bind(result.is_amount_outlier as i64)
        .bind(result.keyword_matches as i64)
        .bind(result.score)
        .bind(result.verdict.as_str())
        .bind(serde_json::to_string(&result.reasons)?)
        .bind(serde_json::to_string(&result.retrieved_docs)?)
        .bind(&created_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::debug!(run_id, rows = results.len(), "Review queue table replaced");
    Ok(())
}

/// Load up to `limit` queue entries in batch order
pub async fn load_queue(pool: &SqlitePool, limit: i64) -> Result<Vec<StageTwoResult>> {
    require_columns(pool, "review_queue", &["position", "claim_id", "verdict"]).await?;

    let rows = sqlx::query("SELECT * FROM review_queue ORDER BY position LIMIT ?")
        .bind(limit)
        .fetch_all(pool)
        .await?;

    rows.iter()
        .map(|row| -> Result<StageTwoResult> {
            let reasons: String = row.try_get("reasons")?;
            let docs: String = row.try_get("retrieved_docs")?;
            let verdict: String = row.try_get("verdict")?;

            Ok(StageTwoResult {
                claim_id: row.try_get("claim_id")?,
                provider_id: row.try_get("provider_id")?,
                amount: row.try_get("amount")?,
                stage1_score: row.try_get::<i64, _>("stage1_score")?.clamp(0, 3) as u8,
                is_fraud_label: row.try_get::<i64, _>("is_fraud_label")? != 0,
                is_amount_outlier: row.try_get::<i64, _>("is_amount_outlier")? != 0,
                keyword_matches: row.try_get::<i64, _>("keyword_matches")?.max(0) as usize,
                score: row.try_get("score")?,
                verdict: verdict.parse::<Verdict>()?,
                reasons: serde_json::from_str::<Vec<String>>(&reasons)?,
                retrieved_docs: serde_json::from_str::<Vec<DocPreview>>(&docs)?,
            })
        })
        .collect()
}
