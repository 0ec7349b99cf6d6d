//! SQLite-backed claim store, Stage-1 snapshot and review queue

pub mod claims;
pub mod review_queue;
pub mod schema;
pub mod stage1;

use claimguard_common::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;

/// Open (creating if needed) the pipeline database and its tables
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::debug!("Connecting to database: {}", db_path.display());

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Create pipeline tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS providers (
            provider_id TEXT PRIMARY KEY,
            provider_name TEXT NOT NULL,
            registration_year INTEGER NOT NULL,
            license_number TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS patients (
            patient_id TEXT PRIMARY KEY,
            age INTEGER NOT NULL,
            gender TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // amount is declared without affinity so malformed imports survive
    // until Stage-1 coerces them
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS claims (
            claim_id TEXT PRIMARY KEY,
            patient_id TEXT NOT NULL,
            provider_id TEXT NOT NULL,
            procedure_code TEXT NOT NULL,
            amount,
            claim_date TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'submitted',
            is_fraud_label INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS claims_stage1 (
            row_index INTEGER PRIMARY KEY,
            claim_id TEXT NOT NULL,
            patient_id TEXT NOT NULL,
            provider_id TEXT NOT NULL,
            procedure_code TEXT NOT NULL,
            amount REAL NOT NULL,
            claim_date TEXT NOT NULL,
            status TEXT NOT NULL,
            is_fraud_label INTEGER NOT NULL,
            provider_total_claims INTEGER NOT NULL,
            provider_mean_amount REAL NOT NULL,
            q3 REAL NOT NULL,
            iqr REAL NOT NULL,
            is_amount_outlier INTEGER NOT NULL,
            is_duplicate INTEGER NOT NULL,
            provider_high_volume INTEGER NOT NULL,
            stage1_score INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS review_queue (
            position INTEGER PRIMARY KEY,
            run_id TEXT NOT NULL,
            claim_id TEXT NOT NULL,
            provider_id TEXT NOT NULL,
            amount REAL NOT NULL,
            stage1_score INTEGER NOT NULL,
            is_fraud_label INTEGER NOT NULL,
            is_amount_outlier INTEGER NOT NULL,
            keyword_matches INTEGER NOT NULL,
            score REAL NOT NULL,
            verdict TEXT NOT NULL,
            reasons TEXT NOT NULL DEFAULT '[]',
            retrieved_docs TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (providers, patients, claims, claims_stage1, review_queue)");

    Ok(())
}
