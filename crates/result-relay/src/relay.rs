//! Relay of the current run's results into the history table
//!
//! Doing the move on the primary, rather than on every replica, is what lets
//! statement-based replication carry it: replicas replay the same
//! `REPLACE ... SELECT` against their own results table and end up with
//! history rows holding their own checksums.

use std::fmt;

use tracing::{error, info, warn};

use crate::schema::{fetch_columns, validate_history_compatible};
use crate::{
    ColumnCatalog, ColumnSet, RelayError, RelayOpts, RelayStatement, RunWindow,
    StatementExecutor, TableRef,
};

/// Execute the relay statement for `window` once.
///
/// A `window` that cannot be bound as a `DATETIME` fails with
/// [`RelayError::InvalidWindow`] before anything is executed. Otherwise
/// returns the affected-row count reported by the server. An empty selection
/// is a success with zero rows. There is no retry.
pub async fn relay<E>(
    executor: &E,
    results: &TableRef,
    history: &TableRef,
    columns: &ColumnSet,
    window: RunWindow,
) -> Result<u64, RelayError>
where
    E: StatementExecutor + ?Sized,
{
    window.check()?;
    let statement = RelayStatement::new(results.clone(), history.clone(), columns.clone(), window);

    info!("Relaying results of {} from {}", results, window.start_ts);

    executor.execute(&statement).await.map_err(|source| {
        error!("Failed to relay {} into {}: {:#}", results, history, source);
        RelayError::RelayExecution {
            history: history.clone(),
            source,
        }
    })
}

/// Progress of a relay run.
///
/// `Relayed` and `Aborted` are terminal. A new run always starts from `Start`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelayPhase {
    Start,
    ColumnsFetched,
    HistoryValidated,
    Relayed,
    Aborted,
}

impl fmt::Display for RelayPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RelayPhase::Start => "start",
            RelayPhase::ColumnsFetched => "columns-fetched",
            RelayPhase::HistoryValidated => "history-validated",
            RelayPhase::Relayed => "relayed",
            RelayPhase::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful run.
#[derive(Clone, Debug, PartialEq)]
pub struct RelayReport {
    pub columns: ColumnSet,
    pub rows_affected: u64,
    /// `Relayed`, or `HistoryValidated` for a dry run.
    pub phase: RelayPhase,
    pub statement: RelayStatement,
}

/// A finished run with its terminal phase.
#[derive(Debug)]
pub struct RelayRun {
    /// `Relayed`, `HistoryValidated` for a dry run, or `Aborted`.
    pub phase: RelayPhase,
    /// For an aborted run, the last phase reached before the failure.
    pub aborted_after: Option<RelayPhase>,
    pub result: Result<RelayReport, RelayError>,
}

/// One relay run: fetch columns, re-validate history, relay.
pub struct ResultRelay<C, E> {
    catalog: C,
    executor: E,
    results: TableRef,
    history: TableRef,
    dry_run: bool,
}

impl<C, E> ResultRelay<C, E>
where
    C: ColumnCatalog,
    E: StatementExecutor,
{
    pub fn new(catalog: C, executor: E, opts: &RelayOpts) -> Self {
        Self {
            catalog,
            executor,
            results: opts.results(),
            history: opts.history(),
            dry_run: opts.dry_run,
        }
    }

    pub fn results(&self) -> &TableRef {
        &self.results
    }

    pub fn history(&self) -> &TableRef {
        &self.history
    }

    /// Run the whole sequence for `window`.
    ///
    /// Any failure aborts the run and is returned unchanged. Failures before
    /// the relay statement leave both tables untouched.
    pub async fn run(&self, window: RunWindow) -> Result<RelayReport, RelayError> {
        self.run_tracked(window).await.result
    }

    /// Like [`ResultRelay::run`], also reporting the terminal phase and, for
    /// an aborted run, the last phase reached before the failure.
    pub async fn run_tracked(&self, window: RunWindow) -> RelayRun {
        let mut phase = RelayPhase::Start;
        match self.advance(window, &mut phase).await {
            Ok(report) => RelayRun {
                phase: report.phase,
                aborted_after: None,
                result: Ok(report),
            },
            Err(e) => {
                let aborted_after = phase;
                phase = RelayPhase::Aborted;
                warn!(
                    "Relay of {} into {} {} after phase '{}': {}",
                    self.results, self.history, phase, aborted_after, e
                );
                RelayRun {
                    phase,
                    aborted_after: Some(aborted_after),
                    result: Err(e),
                }
            }
        }
    }

    async fn advance(
        &self,
        window: RunWindow,
        phase: &mut RelayPhase,
    ) -> Result<RelayReport, RelayError> {
        window.check()?;
        let columns = fetch_columns(&self.catalog, &self.results).await?;
        *phase = RelayPhase::ColumnsFetched;
        info!("Fetched {} columns of {}", columns.len(), self.results);

        validate_history_compatible(&self.catalog, &self.results, &self.history, &columns).await?;
        *phase = RelayPhase::HistoryValidated;
        info!("Validated history table {} again", self.history);

        let statement = RelayStatement::new(
            self.results.clone(),
            self.history.clone(),
            columns.clone(),
            window,
        );

        if self.dry_run {
            info!(
                "Dry run, not executing: {} (start_ts = {})",
                statement.sql(),
                window.start_ts
            );
            return Ok(RelayReport {
                columns,
                rows_affected: 0,
                phase: RelayPhase::HistoryValidated,
                statement,
            });
        }

        let rows_affected = relay(
            &self.executor,
            &self.results,
            &self.history,
            &columns,
            window,
        )
        .await?;
        *phase = RelayPhase::Relayed;

        Ok(RelayReport {
            columns,
            rows_affected,
            phase: RelayPhase::Relayed,
            statement,
        })
    }
}
