//! Execution of the mutating relay statement

use anyhow::{Context, Result};
use async_trait::async_trait;
use mysql_async::{prelude::*, Pool};
use tracing::{debug, info};

use crate::{RelayStatement, SessionSettings};

/// Runs the relay statement against the primary.
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    /// Execute `statement` once and return the affected-row count.
    async fn execute(&self, statement: &RelayStatement) -> Result<u64>;
}

/// Executor running on a dedicated connection taken from a MySQL pool.
///
/// The connection is acquired, configured with [`SessionSettings`], used for
/// the single statement and handed back to the pool when dropped at the end of
/// [`StatementExecutor::execute`], on success and on error alike.
#[derive(Clone)]
pub struct MySQLExecutor {
    pool: Pool,
    session: SessionSettings,
}

impl MySQLExecutor {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            session: SessionSettings::default(),
        }
    }

    pub fn with_session(mut self, session: SessionSettings) -> Self {
        self.session = session;
        self
    }

    pub fn session(&self) -> &SessionSettings {
        &self.session
    }
}

#[async_trait]
impl StatementExecutor for MySQLExecutor {
    async fn execute(&self, statement: &RelayStatement) -> Result<u64> {
        let params = statement.params()?;
        let mut conn = self
            .pool
            .get_conn()
            .await
            .context("Failed to get MySQL connection for relay")?;

        for stmt in self.session.statements() {
            debug!("Applying session setting: {}", stmt);
            conn.query_drop(stmt.as_str())
                .await
                .with_context(|| format!("Failed to apply session setting '{stmt}'"))?;
        }

        let sql = statement.sql();
        debug!("Executing relay statement: {}", sql);
        conn.exec_drop(&sql, params)
            .await
            .context("Relay statement failed")?;

        let affected = conn.affected_rows();
        info!(
            "Relayed into {}: {} rows affected",
            statement.history, affected
        );
        Ok(affected)
    }
}
