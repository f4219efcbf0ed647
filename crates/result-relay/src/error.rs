//! Error types for the result relay.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::TableRef;

/// Errors that abort a relay run.
///
/// Every variant is fatal to the run. Nothing here is retried locally.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Column introspection failed, returned a malformed row, or found no columns.
    #[error("Failed to read columns of {table} from the catalog: {source:#}")]
    Metadata {
        table: TableRef,
        #[source]
        source: anyhow::Error,
    },

    /// The history table no longer matches the results table.
    #[error(
        "History table {history} is incompatible with {results}: \
         missing in history {missing_in_history:?}, missing in results {missing_in_results:?}"
    )]
    SchemaIncompatible {
        results: TableRef,
        history: TableRef,
        missing_in_history: Vec<String>,
        missing_in_results: Vec<String>,
    },

    /// The relay statement (or the session setup preceding it) failed.
    #[error("Failed to relay results into {history}: {source:#}")]
    RelayExecution {
        history: TableRef,
        #[source]
        source: anyhow::Error,
    },

    /// The run-start timestamp cannot be bound as a MySQL `DATETIME`.
    #[error("Run window start {start_ts} is not a valid DATETIME: {source:#}")]
    InvalidWindow {
        start_ts: NaiveDateTime,
        #[source]
        source: anyhow::Error,
    },

    /// A column set must name at least one column.
    #[error("Column set is empty")]
    EmptyColumnSet,
}

impl RelayError {
    /// Whether this error was raised before any data-modifying statement ran.
    pub fn is_pre_mutation(&self) -> bool {
        !matches!(self, RelayError::RelayExecution { .. })
    }
}
