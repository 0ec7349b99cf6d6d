//! Stage-1 candidate snapshot persistence
//!
//! Each Stage-1 run replaces the whole snapshot inside one transaction, so
//! readers see either the previous or the new population, never a mix.

use chrono::NaiveDate;
use claimguard_common::models::{Claim, ClaimStatus, Stage1Record};
use claimguard_common::{Error, Result};
use serde::Serialize;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use super::schema::require_columns;

/// Every column `load_snapshot` reads
const SNAPSHOT_COLUMNS: [&str; 17] = [
    "row_index",
    "claim_id",
    "patient_id",
    "provider_id",
    "procedure_code",
    "amount",
    "claim_date",
    "status",
    "is_fraud_label",
    "provider_total_claims",
    "provider_mean_amount",
    "q3",
    "iqr",
    "is_amount_outlier",
    "is_duplicate",
    "provider_high_volume",
    "stage1_score",
];

const CANDIDATE_COLUMNS: [&str; 4] = ["claim_id", "stage1_score", "provider_id", "amount"];

/// Candidate listing row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateRow {
    pub claim_id: String,
    pub stage1_score: u8,
    pub provider_id: String,
    pub amount: f64,
}

/// Replace the snapshot with `records` (last writer wins)
pub async fn replace_snapshot(pool: &SqlitePool, records: &[Stage1Record]) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM claims_stage1").execute(&mut *tx).await?;

    for (index, record) in records.iter().enumerate() {
        let claim = &record.claim;
        sqlx::query(
            r#"
            INSERT INTO claims_stage1 (
                row_index, claim_id, patient_id, provider_id, procedure_code, amount,
                claim_date, status, is_fraud_label, provider_total_claims,
                provider_mean_amount, q3, iqr, is_amount_outlier, is_duplicate,
                provider_high_volume, stage1_score
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(index as i64)
        .bind(&claim.claim_id)
        .bind(&claim.patient_id)
        .bind(&claim.provider_id)
        .bind(&claim.procedure_code)
        .bind(claim.amount)
        .bind(claim.claim_date.format("%Y-%m-%d").to_string())
        .bind(claim.status.as_str())
        .bind(claim.is_fraud_label as i64)
        .bind(record.provider_total_claims as i64)
        .bind(record.provider_mean_amount)
        .bind(record.q3)
        .bind(record.iqr)
        .bind(record.is_amount_outlier as i64)
        .bind(record.is_duplicate as i64)
        .bind(record.provider_high_volume as i64)
        .bind(record.stage1_score as i64)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Load the full Stage-1 population in snapshot order (empty if never computed)
pub async fn load_snapshot(pool: &SqlitePool) -> Result<Vec<Stage1Record>> {
    require_columns(pool, "claims_stage1", &SNAPSHOT_COLUMNS).await?;

    let rows = sqlx::query("SELECT * FROM claims_stage1 ORDER BY row_index")
        .fetch_all(pool)
        .await?;

    rows.iter().map(record_from_row).collect()
}

/// Highest-scoring claims first
pub async fn list_candidates(pool: &SqlitePool, limit: i64) -> Result<Vec<CandidateRow>> {
    require_columns(pool, "claims_stage1", &CANDIDATE_COLUMNS).await?;

    let rows = sqlx::query(
        r#"
        SELECT claim_id, stage1_score, provider_id, amount
        FROM claims_stage1
        ORDER BY stage1_score DESC, claim_id ASC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<CandidateRow> {
            Ok(CandidateRow {
                claim_id: row.try_get("claim_id")?,
                stage1_score: score_from_i64(row.try_get("stage1_score")?)?,
                provider_id: row.try_get("provider_id")?,
                amount: row.try_get("amount")?,
            })
        })
        .collect()
}

/// Number of rows in the current snapshot
pub async fn snapshot_size(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM claims_stage1")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

fn record_from_row(row: &SqliteRow) -> Result<Stage1Record> {
    let claim_id: String = row.try_get("claim_id")?;
    let date_text: String = row.try_get("claim_date")?;
    let claim_date = NaiveDate::parse_from_str(&date_text, "%Y-%m-%d").map_err(|_| {
        Error::Schema(format!(
            "claims_stage1.claim_date '{}' for {} is not a YYYY-MM-DD date",
            date_text, claim_id
        ))
    })?;
    let status: String = row.try_get("status")?;

    Ok(Stage1Record {
        claim: Claim {
            patient_id: row.try_get("patient_id")?,
            provider_id: row.try_get("provider_id")?,
            procedure_code: row.try_get("procedure_code")?,
            amount: row.try_get("amount")?,
            claim_date,
            status: status.parse::<ClaimStatus>()?,
            is_fraud_label: row.try_get::<i64, _>("is_fraud_label")? != 0,
            claim_id,
        },
        provider_total_claims: row.try_get::<i64, _>("provider_total_claims")?.max(0) as u64,
        provider_mean_amount: row.try_get("provider_mean_amount")?,
        q3: row.try_get("q3")?,
        iqr: row.try_get("iqr")?,
        is_amount_outlier: row.try_get::<i64, _>("is_amount_outlier")? != 0,
        is_duplicate: row.try_get::<i64, _>("is_duplicate")? != 0,
        provider_high_volume: row.try_get::<i64, _>("provider_high_volume")? != 0,
        stage1_score: score_from_i64(row.try_get("stage1_score")?)?,
    })
}

fn score_from_i64(value: i64) -> Result<u8> {
    if (0..=3).contains(&value) {
        Ok(value as u8)
    } else {
        Err(Error::Schema(format!(
            "claims_stage1.stage1_score {} outside 0-3",
            value
        )))
    }
}
