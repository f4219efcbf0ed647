//! Session settings for the connection that runs the relay statement.
//!
//! Nothing is applied by default. When set, the statements returned by
//! [`SessionSettings::statements`] run on the mutating connection only, right
//! before the relay statement. The pool built by [`crate::new_mysql_pool`]
//! resets every connection when it is returned, which clears these session
//! variables before the connection is handed out again.

use std::fmt;
use std::str::FromStr;

/// `SET SESSION TRANSACTION ISOLATION LEVEL ...`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for IsolationLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        match normalized.as_str() {
            "read-uncommitted" => Ok(IsolationLevel::ReadUncommitted),
            "read-committed" => Ok(IsolationLevel::ReadCommitted),
            "repeatable-read" => Ok(IsolationLevel::RepeatableRead),
            "serializable" => Ok(IsolationLevel::Serializable),
            _ => anyhow::bail!("Unknown isolation level: '{s}'"),
        }
    }
}

/// `SET SESSION binlog_format = ...`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinlogFormat {
    Statement,
    Row,
    Mixed,
}

impl BinlogFormat {
    fn as_sql(&self) -> &'static str {
        match self {
            BinlogFormat::Statement => "STATEMENT",
            BinlogFormat::Row => "ROW",
            BinlogFormat::Mixed => "MIXED",
        }
    }
}

impl fmt::Display for BinlogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for BinlogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "statement" => Ok(BinlogFormat::Statement),
            "row" => Ok(BinlogFormat::Row),
            "mixed" => Ok(BinlogFormat::Mixed),
            _ => anyhow::bail!("Unknown binlog format: '{s}'"),
        }
    }
}

/// Per-connection overrides for the mutating session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionSettings {
    pub isolation_level: Option<IsolationLevel>,
    pub binlog_format: Option<BinlogFormat>,
}

impl SessionSettings {
    pub fn is_empty(&self) -> bool {
        self.isolation_level.is_none() && self.binlog_format.is_none()
    }

    /// SQL statements applying these settings, in execution order.
    pub fn statements(&self) -> Vec<String> {
        let mut stmts = Vec::new();
        if let Some(level) = self.isolation_level {
            stmts.push(format!("SET SESSION TRANSACTION ISOLATION LEVEL {level}"));
        }
        if let Some(format) = self.binlog_format {
            stmts.push(format!("SET SESSION binlog_format = '{format}'"));
        }
        stmts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_apply_nothing() {
        let settings = SessionSettings::default();
        assert!(settings.is_empty());
        assert!(settings.statements().is_empty());
    }

    #[test]
    fn test_statements_order() {
        let settings = SessionSettings {
            isolation_level: Some(IsolationLevel::RepeatableRead),
            binlog_format: Some(BinlogFormat::Statement),
        };

        assert_eq!(
            settings.statements(),
            vec![
                "SET SESSION TRANSACTION ISOLATION LEVEL REPEATABLE READ".to_string(),
                "SET SESSION binlog_format = 'STATEMENT'".to_string(),
            ]
        );
    }

    #[test]
    fn test_parse_isolation_level() {
        assert_eq!(
            "repeatable-read".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::RepeatableRead
        );
        assert_eq!(
            "READ COMMITTED".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::ReadCommitted
        );
        assert_eq!(
            "read_uncommitted".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::ReadUncommitted
        );
        assert!("snapshot".parse::<IsolationLevel>().is_err());
    }

    #[test]
    fn test_parse_binlog_format() {
        assert_eq!(
            "Statement".parse::<BinlogFormat>().unwrap(),
            BinlogFormat::Statement
        );
        assert_eq!("row".parse::<BinlogFormat>().unwrap(), BinlogFormat::Row);
        assert!("binary".parse::<BinlogFormat>().is_err());
    }
}
