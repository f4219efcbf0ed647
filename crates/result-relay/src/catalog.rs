//! Catalog access for column introspection

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use mysql_async::{prelude::*, Pool, Row};
use tracing::debug;

use crate::TableRef;

/// Column names of one table, in ordinal order.
pub const COLUMNS_QUERY: &str = "SELECT COLUMN_NAME FROM information_schema.COLUMNS \
     WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? \
     ORDER BY ORDINAL_POSITION";

/// Read-only access to the server catalog.
#[async_trait]
pub trait ColumnCatalog: Send + Sync {
    /// Column names of `table` in catalog order.
    ///
    /// An unknown table yields an empty list rather than an error.
    async fn column_names(&self, table: &TableRef) -> Result<Vec<String>>;
}

/// Catalog reader backed by `information_schema` on a MySQL pool.
///
/// Each call takes its own connection, so introspection never shares session
/// state with the connection running the relay statement.
#[derive(Clone)]
pub struct MySQLCatalog {
    pool: Pool,
}

impl MySQLCatalog {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ColumnCatalog for MySQLCatalog {
    async fn column_names(&self, table: &TableRef) -> Result<Vec<String>> {
        let mut conn = self
            .pool
            .get_conn()
            .await
            .context("Failed to get MySQL connection for catalog query")?;

        let rows: Vec<Row> = conn
            .exec(COLUMNS_QUERY, (table.database.as_str(), table.table.as_str()))
            .await
            .context("Failed to query information_schema.COLUMNS")?;

        let mut columns = Vec::with_capacity(rows.len());
        for (idx, row) in rows.into_iter().enumerate() {
            let name: String = match row.get_opt(0) {
                Some(Ok(name)) => name,
                Some(Err(e)) => {
                    return Err(anyhow!("Malformed COLUMN_NAME in catalog row {idx}: {e}"))
                }
                None => return Err(anyhow!("Missing COLUMN_NAME in catalog row {idx}")),
            };
            columns.push(name);
        }

        debug!("Catalog reported {} columns for {}", columns.len(), table);
        Ok(columns)
    }
}
