//! Schema reconciliation between the results and history tables
//!
//! Columns are fetched once, then both tables are read again right before the
//! relay. The two reads are not wrapped in a transaction and no lock is taken:
//! DDL landing between the re-validation and the relay statement is not
//! caught here, and the statement itself fails in that case.

use tracing::{debug, error, info};

use crate::{ColumnCatalog, ColumnSet, RelayError, TableRef};

/// Fetch the column set of `table` in catalog order.
///
/// Fails with [`RelayError::Metadata`] if the catalog query fails, returns a
/// malformed row, or reports no columns at all.
pub async fn fetch_columns<C>(catalog: &C, table: &TableRef) -> Result<ColumnSet, RelayError>
where
    C: ColumnCatalog + ?Sized,
{
    let names = catalog.column_names(table).await.map_err(|source| {
        error!("Failed to fetch columns of {}: {:#}", table, source);
        RelayError::Metadata {
            table: table.clone(),
            source,
        }
    })?;

    if names.is_empty() {
        error!("Catalog reported no columns for {}", table);
        return Err(RelayError::Metadata {
            table: table.clone(),
            source: anyhow::anyhow!("table does not exist or has no visible columns"),
        });
    }

    debug!("Fetched columns of {}: {:?}", table, names);
    ColumnSet::new(names)
}

/// Re-check that `history` can still take every column of `results`.
///
/// Both tables are read again from the catalog. Validation fails when the
/// history table lacks a column of the current results table, or when either
/// table lacks a column of the previously fetched `columns`. History may carry
/// extra columns.
pub async fn validate_history_compatible<C>(
    catalog: &C,
    results: &TableRef,
    history: &TableRef,
    columns: &ColumnSet,
) -> Result<(), RelayError>
where
    C: ColumnCatalog + ?Sized,
{
    let current = fetch_columns(catalog, results).await?;
    let history_columns = fetch_columns(catalog, history).await?;

    let mut missing_in_history: Vec<String> = Vec::new();
    for name in current.missing_from(history_columns.names()) {
        missing_in_history.push(name.to_string());
    }
    for name in columns.missing_from(history_columns.names()) {
        if !missing_in_history.iter().any(|m| m == name) {
            missing_in_history.push(name.to_string());
        }
    }

    let missing_in_results: Vec<String> = columns
        .missing_from(current.names())
        .into_iter()
        .map(str::to_string)
        .collect();

    if !missing_in_history.is_empty() || !missing_in_results.is_empty() {
        error!(
            "History table {} is incompatible with {}: missing in history {:?}, missing in results {:?}",
            history, results, missing_in_history, missing_in_results
        );
        return Err(RelayError::SchemaIncompatible {
            results: results.clone(),
            history: history.clone(),
            missing_in_history,
            missing_in_results,
        });
    }

    info!("Validated history table {} against {}", history, results);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryBackend;

    const COLUMNS: [&str; 5] = ["run_id", "table_name", "chunk_id", "checksum", "ts"];

    fn results() -> TableRef {
        TableRef::new("infodba_schema", "checksum")
    }

    fn history() -> TableRef {
        TableRef::new("infodba_schema", "checksum_history")
    }

    fn column_set(names: &[&str]) -> ColumnSet {
        ColumnSet::new(names.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_columns_preserves_catalog_order() {
        let backend = MemoryBackend::new();
        backend.create_table(&results(), &["ts", "checksum", "run_id"], &["run_id"]);

        let columns = fetch_columns(&backend, &results()).await.unwrap();
        assert_eq!(columns.names(), ["ts", "checksum", "run_id"]);
    }

    #[tokio::test]
    async fn test_fetch_columns_of_unknown_table_is_metadata_error() {
        let backend = MemoryBackend::new();

        let err = fetch_columns(&backend, &results()).await.unwrap_err();
        match err {
            RelayError::Metadata { table, .. } => assert_eq!(table, results()),
            other => panic!("Expected Metadata error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_columns_catalog_failure_is_metadata_error() {
        let backend = MemoryBackend::new();
        backend.create_table(&results(), &COLUMNS, &["run_id"]);
        backend.fail_catalog("SELECT command denied to user 'checker'");

        let err = fetch_columns(&backend, &results()).await.unwrap_err();
        assert!(matches!(err, RelayError::Metadata { .. }));
        assert!(err.to_string().contains("SELECT command denied"));
    }

    #[tokio::test]
    async fn test_validate_accepts_identical_tables() {
        let backend = MemoryBackend::new();
        backend.create_table(&results(), &COLUMNS, &["run_id", "table_name", "chunk_id"]);
        backend.create_table(&history(), &COLUMNS, &["run_id", "table_name", "chunk_id"]);

        validate_history_compatible(&backend, &results(), &history(), &column_set(&COLUMNS))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_validate_accepts_history_superset() {
        let backend = MemoryBackend::new();
        backend.create_table(&results(), &COLUMNS, &["run_id"]);
        backend.create_table(
            &history(),
            &["run_id", "table_name", "chunk_id", "checksum", "ts", "archived_at"],
            &["run_id"],
        );

        validate_history_compatible(&backend, &results(), &history(), &column_set(&COLUMNS))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_validate_rejects_history_missing_column() {
        let backend = MemoryBackend::new();
        backend.create_table(&results(), &COLUMNS, &["run_id"]);
        backend.create_table(
            &history(),
            &["run_id", "table_name", "checksum", "ts"],
            &["run_id"],
        );

        let err =
            validate_history_compatible(&backend, &results(), &history(), &column_set(&COLUMNS))
                .await
                .unwrap_err();
        match err {
            RelayError::SchemaIncompatible {
                missing_in_history,
                missing_in_results,
                ..
            } => {
                assert_eq!(missing_in_history, vec!["chunk_id".to_string()]);
                assert!(missing_in_results.is_empty());
            }
            other => panic!("Expected SchemaIncompatible, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_validate_detects_results_drift_since_fetch() {
        let backend = MemoryBackend::new();
        // The results table lost `chunk_id` after the columns were fetched
        backend.create_table(&results(), &["run_id", "table_name", "checksum", "ts"], &["run_id"]);
        backend.create_table(&history(), &COLUMNS, &["run_id"]);

        let err =
            validate_history_compatible(&backend, &results(), &history(), &column_set(&COLUMNS))
                .await
                .unwrap_err();
        match err {
            RelayError::SchemaIncompatible {
                missing_in_history,
                missing_in_results,
                ..
            } => {
                assert!(missing_in_history.is_empty());
                assert_eq!(missing_in_results, vec!["chunk_id".to_string()]);
            }
            other => panic!("Expected SchemaIncompatible, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_validate_missing_history_table_is_metadata_error() {
        let backend = MemoryBackend::new();
        backend.create_table(&results(), &COLUMNS, &["run_id"]);

        let err =
            validate_history_compatible(&backend, &results(), &history(), &column_set(&COLUMNS))
                .await
                .unwrap_err();
        match err {
            RelayError::Metadata { table, .. } => assert_eq!(table, history()),
            other => panic!("Expected Metadata error, got {other:?}"),
        }
    }
}
