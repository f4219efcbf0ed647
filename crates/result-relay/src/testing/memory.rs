//! In-memory backend for exercising the relay without a server
//!
//! Implements both [`ColumnCatalog`] and [`StatementExecutor`]. Tables keep
//! their columns in declaration order and an optional unique key; executing a
//! [`RelayStatement`] follows MySQL `REPLACE ... SELECT` semantics, including
//! the affected-row count (a replaced row counts twice).

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::statement::TS_COLUMN;
use crate::{ColumnCatalog, RelayStatement, StatementExecutor, TableRef};

/// A row: the `ts` value plus the remaining cells by column name.
///
/// A column without a cell holds NULL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryRow {
    pub ts: NaiveDateTime,
    pub cells: BTreeMap<String, String>,
}

impl MemoryRow {
    pub fn new(ts: NaiveDateTime) -> Self {
        Self {
            ts,
            cells: BTreeMap::new(),
        }
    }

    pub fn with(mut self, column: &str, value: &str) -> Self {
        self.cells.insert(column.to_string(), value.to_string());
        self
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells.get(column).map(String::as_str)
    }

    fn key_part(&self, column: &str) -> Option<String> {
        if column == TS_COLUMN {
            Some(self.ts.to_string())
        } else {
            self.cells.get(column).cloned()
        }
    }
}

#[derive(Clone, Debug, Default)]
struct MemoryTable {
    columns: Vec<String>,
    unique_key: Vec<String>,
    rows: Vec<MemoryRow>,
}

impl MemoryTable {
    fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    fn conflicts(&self, row: &MemoryRow) -> Vec<usize> {
        if self.unique_key.is_empty() {
            return Vec::new();
        }
        let key: Vec<Option<String>> = self.unique_key.iter().map(|c| row.key_part(c)).collect();
        // NULLs never collide in a unique index
        if key.iter().any(Option::is_none) {
            return Vec::new();
        }
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, existing)| {
                self.unique_key
                    .iter()
                    .zip(&key)
                    .all(|(c, k)| existing.key_part(c).as_ref() == k.as_ref())
            })
            .map(|(idx, _)| idx)
            .collect()
    }

    /// REPLACE one row, returning the affected-row count.
    fn replace(&mut self, row: MemoryRow) -> u64 {
        let conflicts = self.conflicts(&row);
        match conflicts.split_first() {
            None => {
                self.rows.push(row);
                1
            }
            Some((&first, rest)) => {
                for &idx in rest.iter().rev() {
                    self.rows.remove(idx);
                }
                self.rows[first] = row;
                conflicts.len() as u64 + 1
            }
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: BTreeMap<TableRef, MemoryTable>,
    catalog_failure: Option<String>,
    execute_failure: Option<String>,
    catalog_reads: usize,
    pending_drops: Vec<(usize, TableRef, String)>,
    executed: Vec<RelayStatement>,
}

impl MemoryState {
    fn apply_pending_drops(&mut self) {
        let reads = self.catalog_reads;
        let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending_drops)
            .into_iter()
            .partition(|(after, _, _)| *after <= reads);
        self.pending_drops = pending;

        for (_, table, column) in due {
            if let Some(t) = self.tables.get_mut(&table) {
                t.columns.retain(|c| c != &column);
                for row in &mut t.rows {
                    row.cells.remove(&column);
                }
            }
        }
    }

    fn table(&self, table: &TableRef) -> Result<&MemoryTable> {
        self.tables
            .get(table)
            .ok_or_else(|| anyhow!("Table '{table}' doesn't exist"))
    }
}

/// Shared in-memory catalog and executor. Clones share state.
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().expect("memory backend lock poisoned")
    }

    /// Create (or recreate, empty) a table with `columns` and a unique key.
    pub fn create_table(&self, table: &TableRef, columns: &[&str], unique_key: &[&str]) {
        self.lock().tables.insert(
            table.clone(),
            MemoryTable {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                unique_key: unique_key.iter().map(|c| c.to_string()).collect(),
                rows: Vec::new(),
            },
        );
    }

    /// Append a row without any key check, as the checksum run would.
    pub fn insert(&self, table: &TableRef, row: MemoryRow) {
        if let Some(t) = self.lock().tables.get_mut(table) {
            t.rows.push(row);
        }
    }

    pub fn rows(&self, table: &TableRef) -> Vec<MemoryRow> {
        self.lock()
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Make every following catalog query fail with `message`.
    pub fn fail_catalog(&self, message: &str) {
        self.lock().catalog_failure = Some(message.to_string());
    }

    /// Make every following statement fail with `message`.
    pub fn fail_execute(&self, message: &str) {
        self.lock().execute_failure = Some(message.to_string());
    }

    /// Drop `column` from `table` once `after_reads` catalog queries were served.
    pub fn drop_column_after_reads(&self, table: &TableRef, column: &str, after_reads: usize) {
        self.lock()
            .pending_drops
            .push((after_reads, table.clone(), column.to_string()));
    }

    /// Every statement handed to the executor, failed ones included.
    pub fn executed(&self) -> Vec<RelayStatement> {
        self.lock().executed.clone()
    }
}

#[async_trait]
impl ColumnCatalog for MemoryBackend {
    async fn column_names(&self, table: &TableRef) -> Result<Vec<String>> {
        let mut state = self.lock();
        state.apply_pending_drops();
        state.catalog_reads += 1;

        if let Some(message) = &state.catalog_failure {
            bail!("{message}");
        }
        Ok(state
            .tables
            .get(table)
            .map(|t| t.columns.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl StatementExecutor for MemoryBackend {
    async fn execute(&self, statement: &RelayStatement) -> Result<u64> {
        let mut state = self.lock();
        state.executed.push(statement.clone());

        if let Some(message) = &state.execute_failure {
            bail!("{message}");
        }

        let source = state.table(&statement.results)?;
        let target = state.table(&statement.history)?;
        for column in &statement.columns {
            if !source.has_column(column) {
                bail!("Unknown column '{column}' in '{}'", statement.results);
            }
            if !target.has_column(column) {
                bail!("Unknown column '{column}' in '{}'", statement.history);
            }
        }
        if !source.has_column(TS_COLUMN) {
            bail!("Unknown column '{TS_COLUMN}' in 'where clause'");
        }

        let selected: Vec<MemoryRow> = source
            .rows
            .iter()
            .filter(|row| statement.window.contains(row.ts))
            .map(|row| {
                let mut projected = MemoryRow::new(if statement.columns.contains(TS_COLUMN) {
                    row.ts
                } else {
                    NaiveDateTime::default()
                });
                for column in &statement.columns {
                    if let Some(value) = row.cells.get(column) {
                        projected.cells.insert(column.clone(), value.clone());
                    }
                }
                projected
            })
            .collect();

        let target = state
            .tables
            .get_mut(&statement.history)
            .ok_or_else(|| anyhow!("Table '{}' doesn't exist", statement.history))?;
        let affected: u64 = selected.into_iter().map(|row| target.replace(row)).sum();
        Ok(affected)
    }
}
