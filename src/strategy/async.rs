//! Asynchronous batch processing strategy
//!
//! Replays requests in batches through the row-locking `AsyncLedgerEngine`.
//!
//! # Architecture
//!
//! ```text
//! AsyncProcessingStrategy
//!     ├── BatchConfig (batch_size, max_concurrent_batches)
//!     ├── AsyncReader (batch CSV reading)
//!     ├── BatchProcessor (account-group partitioning + tasks)
//!     └── AsyncLedgerEngine (row locks with timeout)
//!         └── AsyncAccountStore (rows, locks, transaction log)
//! ```
//!
//! # Ordering
//!
//! Batches are processed one after another. Inside a batch, requests that
//! share an account (directly or through a transfer chain) run sequentially
//! in file order; unrelated groups run in parallel on the runtime's workers.
//! The resulting ledger matches a sequential replay of the same file.

use crate::config::LedgerConfig;
use crate::core::r#async::{AsyncLedgerEngine, BatchProcessor};
use crate::io::async_reader::AsyncReader;
use crate::io::csv_format::{CsvAccount, CsvRequest};
use crate::strategy::{import_logged, log_outcome, write_report, ProcessingStrategy, ReplayJob};
use crate::types::LedgerError;
use std::io::Write;
use std::path::Path;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};
use tracing::{info, warn};

/// Configuration for batch processing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchConfig {
    /// Number of requests per batch
    pub batch_size: usize,
    /// Number of runtime worker threads
    pub max_concurrent_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a new BatchConfig, replacing zero values with the defaults
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                batch_size,
                default = default.batch_size,
                "invalid batch size, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            warn!(
                max_concurrent_batches,
                default = default.max_concurrent_batches,
                "invalid concurrency, using default"
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
        }
    }
}

/// Asynchronous batch processing strategy
#[derive(Debug, Clone)]
pub struct AsyncProcessingStrategy {
    ledger: LedgerConfig,
    config: BatchConfig,
}

async fn open(path: &Path) -> Result<Compat<tokio::fs::File>, LedgerError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| LedgerError::open_failed(path, e))?;

    // csv-async reads futures::io, tokio::fs reads tokio::io
    Ok(file.compat())
}

impl AsyncProcessingStrategy {
    /// Create a new AsyncProcessingStrategy
    ///
    /// # Arguments
    ///
    /// * `ledger` - Engine configuration (lock timeout, default limits)
    /// * `config` - Batch size and worker thread count
    pub fn new(ledger: LedgerConfig, config: BatchConfig) -> Self {
        Self { ledger, config }
    }

    async fn replay(&self, job: &ReplayJob, output: &mut dyn Write) -> Result<(), LedgerError> {
        let engine = AsyncLedgerEngine::in_memory(&self.ledger);

        if let Some(path) = &job.accounts {
            let mut reader: AsyncReader<_, CsvAccount> = AsyncReader::new(open(path).await?);
            let imported = reader
                .read_all()
                .await
                .into_iter()
                .map(|account| import_logged(Ok(account), |a| engine.import_account(a)))
                .filter(|imported| *imported)
                .count();
            info!(imported, "account snapshot loaded");
        }

        let processor = BatchProcessor::new(engine.clone());
        let mut reader: AsyncReader<_, CsvRequest> = AsyncReader::new(open(&job.input).await?);

        let mut admitted = 0usize;
        let mut refused = 0usize;
        loop {
            let batch = reader.read_batch(self.config.batch_size).await;
            if batch.is_empty() {
                break;
            }

            // Finish the batch before reading the next one so an account's
            // requests keep file order across batch boundaries.
            for outcome in processor.process_batch(batch).await {
                log_outcome(&outcome.record, &outcome.result);
                if outcome.result.is_ok() {
                    admitted += 1;
                } else {
                    refused += 1;
                }
            }
        }
        info!(admitted, refused, "replay finished");

        write_report(engine.store().clone(), job.report, output)
    }
}

impl ProcessingStrategy for AsyncProcessingStrategy {
    /// Replay the job on a dedicated multi-threaded runtime
    fn process(&self, job: &ReplayJob, output: &mut dyn Write) -> Result<(), LedgerError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent_batches)
            .enable_time()
            .build()
            .map_err(|e| LedgerError::IoError {
                message: format!("Failed to create tokio runtime: {}", e),
            })?;

        runtime.block_on(self.replay(job, output))
    }
}
