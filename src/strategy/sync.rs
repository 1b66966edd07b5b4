//! Synchronous processing strategy
//!
//! Replays requests one at a time through the optimistic `LedgerEngine`.
//!
//! # Design
//!
//! The strategy only orchestrates:
//! - CSV parsing goes to `SyncReader` (iterator interface)
//! - Admission goes to `LedgerEngine` (business rules, version checks)
//! - Output goes to the shared report writer
//!
//! Requests are streamed; memory grows with accounts and committed
//! transactions, not with the size of the request file.

use crate::config::LedgerConfig;
use crate::core::LedgerEngine;
use crate::io::csv_format::{CsvAccount, CsvRequest};
use crate::io::sync_reader::SyncReader;
use crate::strategy::{import_logged, log_outcome, write_report, ProcessingStrategy, ReplayJob};
use crate::types::LedgerError;
use std::io::Write;
use tracing::{info, warn};

/// Synchronous processing strategy
///
/// # Examples
///
/// ```no_run
/// use ledger_engine::config::LedgerConfig;
/// use ledger_engine::strategy::{ProcessingStrategy, ReplayJob, SyncProcessingStrategy};
/// use std::io;
///
/// let strategy = SyncProcessingStrategy::new(LedgerConfig::default());
/// let mut output = io::stdout();
///
/// strategy
///     .process(&ReplayJob::new("requests.csv"), &mut output)
///     .expect("Replay failed");
/// ```
#[derive(Debug, Clone, Default)]
pub struct SyncProcessingStrategy {
    config: LedgerConfig,
}

impl SyncProcessingStrategy {
    pub fn new(config: LedgerConfig) -> Self {
        Self { config }
    }
}

impl ProcessingStrategy for SyncProcessingStrategy {
    /// Replay the job through a fresh optimistic engine
    ///
    /// 1. Import the account snapshot, if any
    /// 2. Admit each request in file order, as of its timestamp when present
    /// 3. Write the report from the committed state
    fn process(&self, job: &ReplayJob, output: &mut dyn Write) -> Result<(), LedgerError> {
        let engine = LedgerEngine::in_memory(&self.config);

        if let Some(path) = &job.accounts {
            let imported = SyncReader::<CsvAccount>::new(path)?
                .map(|row| import_logged(row, |account| engine.import_account(account)))
                .filter(|imported| *imported)
                .count();
            info!(imported, "account snapshot loaded");
        }

        let mut admitted = 0usize;
        let mut refused = 0usize;
        for row in SyncReader::<CsvRequest>::new(&job.input)? {
            let record = match row {
                Ok(record) => record,
                Err(e) => {
                    warn!(error = %e, "skipping malformed request row");
                    continue;
                }
            };

            let result = match record.timestamp {
                Some(at) => engine.admit_at(&record.request, &record.actor, at),
                None => engine.admit(&record.request, &record.actor),
            };
            log_outcome(&record, &result);
            if result.is_ok() {
                admitted += 1;
            } else {
                refused += 1;
            }
        }
        info!(admitted, refused, "replay finished");

        write_report(engine.store().clone(), job.report, output)
    }
}
