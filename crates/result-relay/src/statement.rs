//! The relay statement.

use std::ops::RangeInclusive;

use anyhow::{anyhow, bail, Result};
use chrono::{Datelike, NaiveDateTime, Timelike};
use mysql_async::{Params, Value};

use crate::{ColumnSet, RunWindow, TableRef};

/// Column selecting the run window in the results table.
pub const TS_COLUMN: &str = "ts";

/// Years a MySQL `DATETIME` can hold.
pub const DATETIME_YEARS: RangeInclusive<u16> = 1000..=9999;

/// `REPLACE INTO <history> (<cols>) SELECT <cols> FROM <results> WHERE ts >= ?`
///
/// Both tables are schema-qualified so the statement does not depend on the
/// session's default database. REPLACE makes a re-run over the same window
/// converge on the same history rows, given a unique key on result identity.
#[derive(Clone, Debug, PartialEq)]
pub struct RelayStatement {
    pub results: TableRef,
    pub history: TableRef,
    pub columns: ColumnSet,
    pub window: RunWindow,
}

impl RelayStatement {
    pub fn new(results: TableRef, history: TableRef, columns: ColumnSet, window: RunWindow) -> Self {
        Self {
            results,
            history,
            columns,
            window,
        }
    }

    pub fn sql(&self) -> String {
        self.render("?")
    }

    /// The statement with `start_ts` inlined as a literal, runnable as-is.
    pub fn sql_with_window(&self) -> Result<String> {
        check_datetime(self.window.start_ts)?;
        Ok(self.render(&format!(
            "'{}'",
            self.window.start_ts.format("%Y-%m-%d %H:%M:%S%.6f")
        )))
    }

    fn render(&self, start_ts: &str) -> String {
        let columns = self.columns.to_sql_list();
        format!(
            "REPLACE INTO {} ({}) SELECT {} FROM {} WHERE `{}` >= {}",
            self.history.qualified(),
            columns,
            columns,
            self.results.qualified(),
            TS_COLUMN,
            start_ts,
        )
    }

    /// Positional parameters; fails if `start_ts` is not a storable `DATETIME`.
    pub fn params(&self) -> Result<Params> {
        Ok(Params::Positional(vec![datetime_value(self.window.start_ts)?]))
    }
}

/// Reject timestamps a MySQL `DATETIME` cannot represent.
pub(crate) fn check_datetime(ts: NaiveDateTime) -> Result<u16> {
    let year = u16::try_from(ts.year())
        .ok()
        .filter(|year| DATETIME_YEARS.contains(year))
        .ok_or_else(|| {
            anyhow!(
                "Year {} of {} is outside the DATETIME range {}..={}",
                ts.year(),
                ts,
                DATETIME_YEARS.start(),
                DATETIME_YEARS.end()
            )
        })?;
    if ts.nanosecond() >= 1_000_000_000 {
        bail!("Leap second {ts} cannot be stored as DATETIME");
    }
    Ok(year)
}

/// Encode a naive timestamp as a MySQL `DATETIME` value.
pub(crate) fn datetime_value(ts: NaiveDateTime) -> Result<Value> {
    let year = check_datetime(ts)?;
    Ok(Value::Date(
        year,
        ts.month() as u8,
        ts.day() as u8,
        ts.hour() as u8,
        ts.minute() as u8,
        ts.second() as u8,
        ts.nanosecond() / 1_000,
    ))
}
