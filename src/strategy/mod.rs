//! Processing strategy module for ledger replays
//!
//! A replay loads an optional account snapshot, admits every request of a
//! request file, then writes a report. The strategy decides how requests are
//! admitted: one at a time through the optimistic engine, or in batches
//! through the row-locking engine. Both must leave the ledger in the same
//! state for the same input.

use crate::cli::StrategyType;
use crate::config::LedgerConfig;
use crate::core::{DateRange, LedgerView, StatementReader};
use crate::io::csv_format::{write_accounts_csv, write_statement_csv};
use crate::types::{Account, AccountNumber, Actor, LedgerError, Transaction, TransactionRecord};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use sync::SyncProcessingStrategy;

/// Report written once every request has been replayed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    /// Every account, sorted by number
    Accounts,

    /// One account's statement restricted to a date range
    Statement {
        account: AccountNumber,
        range: DateRange,
    },
}

/// Input files and report of one replay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayJob {
    /// Request CSV
    pub input: PathBuf,

    /// Account snapshot CSV loaded before any request
    pub accounts: Option<PathBuf>,

    pub report: Report,
}

impl ReplayJob {
    /// Replay `input` against an empty ledger and report all accounts
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            accounts: None,
            report: Report::Accounts,
        }
    }

    pub fn with_accounts(mut self, accounts: impl Into<PathBuf>) -> Self {
        self.accounts = Some(accounts.into());
        self
    }

    pub fn with_report(mut self, report: Report) -> Self {
        self.report = report;
        self
    }
}

/// Processing strategy trait for complete replay pipelines
pub trait ProcessingStrategy: Send + Sync {
    /// Replay `job` and write its report to `output`
    ///
    /// # Returns
    ///
    /// * `Ok(())` if the replay completed, even when some rows or requests
    ///   were skipped
    /// * `Err(LedgerError)` on a fatal error: a missing or unreadable input
    ///   file, an unknown statement account, or an output failure
    ///
    /// Malformed rows, snapshot rows the store refuses, and refused requests
    /// are logged with `warn!` and do not stop the replay.
    fn process(&self, job: &ReplayJob, output: &mut dyn Write) -> Result<(), LedgerError>;
}

/// Create a processing strategy based on the specified strategy type
///
/// # Arguments
///
/// * `strategy_type` - Sync (optimistic engine) or Async (row-locking engine)
/// * `ledger` - Engine configuration shared by both strategies
/// * `batch` - Batch configuration for the async strategy (ignored for sync)
pub fn create_strategy(
    strategy_type: StrategyType,
    ledger: LedgerConfig,
    batch: Option<BatchConfig>,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy::new(ledger)),
        StrategyType::Async => Box::new(AsyncProcessingStrategy::new(
            ledger,
            batch.unwrap_or_default(),
        )),
    }
}

/// Import one snapshot row, logging a refusal
pub(crate) fn import_logged(
    result: Result<Account, LedgerError>,
    import: impl FnOnce(Account) -> Result<(), LedgerError>,
) -> bool {
    let outcome = result.and_then(|account| {
        let number = account.number;
        import(account).map(|()| number)
    });
    match outcome {
        Ok(number) => {
            debug!(account = number, "account imported");
            true
        }
        Err(e) => {
            warn!(error = %e, "skipping account row");
            false
        }
    }
}

/// Log the outcome of one replayed request
pub(crate) fn log_outcome(
    record: &TransactionRecord,
    result: &Result<Transaction, LedgerError>,
) {
    if let Err(e) = result {
        warn!(
            kind = %record.request.transaction_type,
            origin = record.request.origin,
            actor = record.actor.id,
            error = %e,
            "request refused"
        );
    }
}

/// Write the job's report from the committed state of `view`
///
/// Statements are read with administrator rights.
pub(crate) fn write_report<V: LedgerView>(
    view: Arc<V>,
    report: Report,
    output: &mut dyn Write,
) -> Result<(), LedgerError> {
    match report {
        Report::Accounts => write_accounts_csv(&view.accounts()?, output),
        Report::Statement { account, range } => {
            let statement = StatementReader::new(view).statement(&Actor::admin(0), account, range)?;
            info!(
                account,
                transactions = statement.transactions.len(),
                "statement generated"
            );
            write_statement_csv(&statement, output)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_job_builder() {
        let job = ReplayJob::new("requests.csv")
            .with_accounts("accounts.csv")
            .with_report(Report::Statement {
                account: 3,
                range: DateRange::default(),
            });

        assert_eq!(job.input, PathBuf::from("requests.csv"));
        assert_eq!(job.accounts, Some(PathBuf::from("accounts.csv")));
        assert!(matches!(job.report, Report::Statement { account: 3, .. }));
    }

    #[test]
    fn test_create_strategy_both_types() {
        let sync = create_strategy(StrategyType::Sync, LedgerConfig::default(), None);
        let batched = create_strategy(
            StrategyType::Async,
            LedgerConfig::default(),
            Some(BatchConfig::new(10, 2)),
        );

        // Both refuse a missing input the same way
        let job = ReplayJob::new("does-not-exist.csv");
        let mut output = Vec::new();
        assert!(matches!(
            sync.process(&job, &mut output),
            Err(LedgerError::FileNotFound { .. })
        ));
        assert!(matches!(
            batched.process(&job, &mut output),
            Err(LedgerError::FileNotFound { .. })
        ));
    }
}
