//! Result relay for table-checksum runs
//!
//! A checksum run writes its per-chunk outcomes into a live results table on the
//! primary. This crate moves the rows produced by the current run into the
//! history table with a single `REPLACE ... SELECT` executed on the primary, so
//! that statement-based replication hands every replica an equivalent append.
//!
//! ## Flow
//!
//! ```text
//! fetch columns (catalog) → re-validate history (catalog) → REPLACE ... SELECT (executor)
//! ```
//!
//! Rows never leave the server; only column names are materialized here.
//! The catalog read and the mutating statement go through separate seams
//! ([`ColumnCatalog`] and [`StatementExecutor`]) so that session settings can be
//! applied to the mutating connection alone.

mod catalog;
mod client;
mod columns;
mod error;
mod executor;
mod relay;
mod schema;
mod session;
mod statement;
pub mod testing;

use std::fmt;

use chrono::NaiveDateTime;

pub use catalog::{ColumnCatalog, MySQLCatalog, COLUMNS_QUERY};
pub use client::{mysql_opts, new_mysql_pool, sanitize_connection_string};
pub use columns::{quote_identifier, ColumnSet};
pub use error::RelayError;
pub use executor::{MySQLExecutor, StatementExecutor};
pub use relay::{relay, RelayPhase, RelayReport, RelayRun, ResultRelay};
pub use schema::{fetch_columns, validate_history_compatible};
pub use session::{BinlogFormat, IsolationLevel, SessionSettings};
pub use statement::{RelayStatement, DATETIME_YEARS};

/// A schema-qualified table name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableRef {
    pub database: String,
    pub table: String,
}

impl TableRef {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
        }
    }

    /// Renders `` `database`.`table` `` for use in generated SQL.
    pub fn qualified(&self) -> String {
        format!(
            "{}.{}",
            quote_identifier(&self.database),
            quote_identifier(&self.table)
        )
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.table)
    }
}

/// The run window: rows with `ts >= start_ts` belong to the current run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunWindow {
    pub start_ts: NaiveDateTime,
}

impl RunWindow {
    pub fn new(start_ts: NaiveDateTime) -> Self {
        Self { start_ts }
    }

    /// Fail unless `start_ts` can be bound as a MySQL `DATETIME`.
    ///
    /// Years outside 1000..=9999 and leap seconds are rejected instead of
    /// being silently shifted to another window.
    pub fn check(&self) -> Result<(), RelayError> {
        statement::check_datetime(self.start_ts)
            .map(|_| ())
            .map_err(|source| RelayError::InvalidWindow {
                start_ts: self.start_ts,
                source,
            })
    }

    /// Whether a row stamped `ts` falls inside the window.
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        ts >= self.start_ts
    }
}

/// Relay options (non-connection related)
#[derive(Clone, Debug)]
pub struct RelayOpts {
    /// Schema holding both the results and the history table
    pub result_db: String,
    /// Live results table written by the checksum run
    pub result_table: String,
    /// Append-only history table carried to replicas
    pub history_table: String,
    /// Validate and render the statement without executing it
    pub dry_run: bool,
}

impl RelayOpts {
    pub fn results(&self) -> TableRef {
        TableRef::new(&self.result_db, &self.result_table)
    }

    pub fn history(&self) -> TableRef {
        TableRef::new(&self.result_db, &self.history_table)
    }
}
