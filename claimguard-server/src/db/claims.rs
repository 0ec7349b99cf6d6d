//! Claim store: raw claim population plus providers and patients

use chrono::NaiveDate;
use claimguard_common::models::{Claim, ClaimStatus, Patient, Provider};
use claimguard_common::{Error, Result};
use sqlx::{Row, SqlitePool};

use super::schema::require_columns;

/// Columns Stage-1 cannot run without
pub const REQUIRED_CLAIM_COLUMNS: [&str; 6] = [
    "claim_id",
    "patient_id",
    "provider_id",
    "procedure_code",
    "amount",
    "claim_date",
];

/// Replace the whole population atomically
pub async fn replace_population(
    pool: &SqlitePool,
    providers: &[Provider],
    patients: &[Patient],
    claims: &[Claim],
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM claims").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM providers").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM patients").execute(&mut *tx).await?;

    for provider in providers {
        sqlx::query(
            "INSERT INTO providers (provider_id, provider_name, registration_year, license_number) VALUES (?, ?, ?, ?)",
        )
        .bind(&provider.provider_id)
        .bind(&provider.provider_name)
        .bind(provider.registration_year)
        .bind(&provider.license_number)
        .execute(&mut *tx)
        .await?;
    }

    for patient in patients {
        sqlx::query("INSERT INTO patients (patient_id, age, gender) VALUES (?, ?, ?)")
            .bind(&patient.patient_id)
            .bind(patient.age as i64)
            .bind(&patient.gender)
            .execute(&mut *tx)
            .await?;
    }

    for claim in claims {
        insert_claim(&mut tx, claim).await?;
    }

    tx.commit().await?;

    tracing::info!(
        providers = providers.len(),
        patients = patients.len(),
        claims = claims.len(),
        "Claim population replaced"
    );

    Ok(())
}

async fn insert_claim(tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>, claim: &Claim) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO claims (claim_id, patient_id, provider_id, procedure_code, amount, claim_date, status, is_fraud_label)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&claim.claim_id)
    .bind(&claim.patient_id)
    .bind(&claim.provider_id)
    .bind(&claim.procedure_code)
    .bind(claim.amount)
    .bind(claim.claim_date.format("%Y-%m-%d").to_string())
    .bind(claim.status.as_str())
    .bind(claim.is_fraud_label as i64)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Number of raw claims currently stored
pub async fn count_claims(pool: &SqlitePool) -> Result<i64> {
    require_columns(pool, "claims", &["claim_id"]).await?;
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM claims")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Read the full claim population in one query
///
/// Amounts that are not numeric are coerced to 0. `status` and
/// `is_fraud_label` are optional columns defaulting to `submitted` / false.
pub async fn load_claims(pool: &SqlitePool) -> Result<Vec<Claim>> {
    let columns = require_columns(pool, "claims", &REQUIRED_CLAIM_COLUMNS).await?;

    let status_expr = if columns.contains("status") {
        "status"
    } else {
        "'submitted' AS status"
    };
    let label_expr = if columns.contains("is_fraud_label") {
        "CAST(is_fraud_label AS INTEGER) AS is_fraud_label"
    } else {
        "0 AS is_fraud_label"
    };

    let query = format!(
        "SELECT claim_id, patient_id, provider_id, procedure_code, \
         CAST(amount AS TEXT) AS amount_text, claim_date, {}, {} \
         FROM claims ORDER BY rowid",
        status_expr, label_expr
    );

    let rows = sqlx::query(&query).fetch_all(pool).await?;
    if rows.is_empty() {
        return Err(Error::DataUnavailable(
            "claim store is empty; generate or import claims first".to_string(),
        ));
    }

    rows.iter()
        .map(|row| -> Result<Claim> {
            let claim_id: String = row.try_get("claim_id")?;
            let date_text: String = row.try_get("claim_date")?;
            let claim_date = parse_claim_date(&date_text).ok_or_else(|| {
                Error::Schema(format!(
                    "claims.claim_date '{}' for {} is not a YYYY-MM-DD date",
                    date_text, claim_id
                ))
            })?;
            let status: Option<String> = row.try_get("status")?;
            let status = match status {
                Some(s) => s.parse::<ClaimStatus>()?,
                None => ClaimStatus::Submitted,
            };
            let label: Option<i64> = row.try_get("is_fraud_label")?;

            Ok(Claim {
                patient_id: row.try_get("patient_id")?,
                provider_id: row.try_get("provider_id")?,
                procedure_code: row.try_get("procedure_code")?,
                amount: coerce_amount(row.try_get::<Option<String>, _>("amount_text")?.as_deref()),
                claim_date,
                status,
                is_fraud_label: label.unwrap_or(0) != 0,
                claim_id,
            })
        })
        .collect()
}

/// Numeric coercion; anything unparsable or non-finite becomes 0
pub fn coerce_amount(raw: Option<&str>) -> f64 {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time part
fn parse_claim_date(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}
