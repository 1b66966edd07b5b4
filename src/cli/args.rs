use crate::core::DateRange;
use crate::strategy::{BatchConfig, ReplayJob, Report};
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Replay deposit, withdrawal and transfer requests against a ledger
#[derive(Parser, Debug)]
#[command(name = "ledger-engine")]
#[command(about = "Replay deposit, withdrawal and transfer requests against a ledger", long_about = None)]
pub struct CliArgs {
    /// Request CSV file
    #[arg(value_name = "REQUESTS", help = "Path to the request CSV file")]
    pub input_file: PathBuf,

    /// Account snapshot loaded before the first request
    #[arg(
        long = "accounts",
        value_name = "ACCOUNTS",
        help = "Path to an account snapshot CSV file"
    )]
    pub accounts_file: Option<PathBuf>,

    /// Processing strategy
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "async",
        help = "Processing strategy: 'sync' (optimistic engine) or 'async' (row-locking engine)"
    )]
    pub strategy: StrategyType,

    /// Number of requests per batch (async mode only)
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of requests per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Number of worker threads (async mode only)
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Number of worker threads (default: CPU cores)"
    )]
    pub max_concurrent_batches: Option<usize>,

    /// TOML configuration file
    #[arg(
        long = "config",
        value_name = "FILE",
        help = "Path to a TOML configuration file (LEDGER__* variables override it)"
    )]
    pub config_file: Option<PathBuf>,

    /// Print this account's statement instead of the account table
    #[arg(long = "statement", value_name = "ACCOUNT")]
    pub statement: Option<u32>,

    /// First day of the statement (inclusive)
    #[arg(long = "from", value_name = "YYYY-MM-DD", requires = "statement")]
    pub from: Option<NaiveDate>,

    /// Last day of the statement (inclusive)
    #[arg(long = "to", value_name = "YYYY-MM-DD", requires = "statement")]
    pub to: Option<NaiveDate>,
}

/// Available processing strategies
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

impl CliArgs {
    /// Create a BatchConfig from CLI arguments
    ///
    /// Missing values fall back to the defaults; zero values are replaced
    /// with a warning by `BatchConfig::new`.
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.max_concurrent_batches.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_concurrent_batches
                    .unwrap_or(default.max_concurrent_batches),
            )
        } else {
            BatchConfig::default()
        }
    }

    /// The replay described by the arguments
    pub fn to_job(&self) -> ReplayJob {
        let report = match self.statement {
            Some(account) => Report::Statement {
                account,
                range: DateRange::new(self.from, self.to),
            },
            None => Report::Accounts,
        };

        ReplayJob {
            input: self.input_file.clone(),
            accounts: self.accounts_file.clone(),
            report,
        }
    }
}
