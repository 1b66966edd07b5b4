//! Ledger Engine CLI
//!
//! Replays deposit, withdrawal and transfer requests from a CSV file against
//! an in-memory ledger.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- requests.csv > accounts.csv
//! cargo run -- --accounts accounts.csv --strategy sync requests.csv
//! cargo run -- --strategy async --batch-size 2000 --max-concurrent 8 requests.csv
//! cargo run -- --accounts accounts.csv --statement 1 --from 2024-01-01 --to 2024-01-31 requests.csv
//! ```
//!
//! CSV output goes to stdout; logs go to stderr (`RUST_LOG` overrides the
//! default `info` level).
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (invalid configuration, file not found, unknown statement account, etc.)

use ledger_engine::cli;
use ledger_engine::config::LedgerConfig;
use ledger_engine::logging;
use ledger_engine::strategy;
use std::process;
use tracing::error;

fn main() {
    logging::init("info");

    let args = cli::parse_args();

    let config = match LedgerConfig::load(args.config_file.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            process::exit(1);
        }
    };

    let strategy = {
        let batch = match args.strategy {
            cli::StrategyType::Async => Some(args.to_batch_config()),
            cli::StrategyType::Sync => None,
        };
        strategy::create_strategy(args.strategy, config, batch)
    };

    let mut output = std::io::stdout();
    if let Err(e) = strategy.process(&args.to_job(), &mut output) {
        error!(error = %e, "replay failed");
        process::exit(1);
    }
}
