//! Table/column presence checks for stored data

use claimguard_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;

/// Column names of `table`; empty when the table does not exist
pub async fn table_columns(pool: &SqlitePool, table: &str) -> Result<HashSet<String>> {
    // PRAGMA arguments cannot be bound
    let rows = sqlx::query(&format!("PRAGMA table_info(\"{}\")", table.replace('"', "")))
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| row.get::<String, _>("name"))
        .collect())
}

/// Fail with DataUnavailable if `table` is absent, SchemaError if any of
/// `required` is missing. Returns the full column set.
pub async fn require_columns(
    pool: &SqlitePool,
    table: &str,
    required: &[&str],
) -> Result<HashSet<String>> {
    let columns = table_columns(pool, table).await?;
    if columns.is_empty() {
        return Err(Error::DataUnavailable(format!("table '{}' does not exist", table)));
    }

    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|c| !columns.contains(*c))
        .collect();
    if !missing.is_empty() {
        return Err(Error::Schema(format!(
            "table '{}' is missing required column(s): {}",
            table,
            missing.join(", ")
        )));
    }

    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn pool(dir: &TempDir) -> SqlitePool {
        crate::db::init_database_pool(&dir.path().join("test.db"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_table_is_data_unavailable() {
        let dir = TempDir::new().unwrap();
        let pool = pool(&dir).await;
        let err = require_columns(&pool, "nope", &["a"]).await.unwrap_err();
        assert!(matches!(err, Error::DataUnavailable(_)));
    }

    #[tokio::test]
    async fn test_missing_column_is_schema_error() {
        let dir = TempDir::new().unwrap();
        let pool = pool(&dir).await;
        let err = require_columns(&pool, "claims", &["claim_id", "procedure_code", "nonexistent"])
            .await
            .unwrap_err();
        match err {
            Error::Schema(msg) => assert!(msg.contains("nonexistent")),
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_present_columns_returned() {
        let dir = TempDir::new().unwrap();
        let pool = pool(&dir).await;
        let columns = require_columns(&pool, "claims", &["amount"]).await.unwrap();
        assert!(columns.contains("status"));
    }
}
