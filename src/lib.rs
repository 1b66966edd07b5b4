//! Ledger Engine Library
//! # Overview
//!
//! An in-memory banking ledger that admits deposits, withdrawals and
//! transfers against accounts with a daily withdrawal count and a special
//! (overdraft) allowance. Admission is atomic under concurrent callers, with
//! an optimistic (versioned rows, bounded retry) and a pessimistic (ordered
//! row locks with timeout) engine.
//!
//! # Architecture
//!
//! - [`types`] - Accounts, requests, transactions, actors and errors
//! - [`config`] - `LedgerConfig` loaded from TOML and `LEDGER__*` variables
//! - [`core`] - Business logic components:
//!   - [`core::admission`] - Pure admission rules and row mutations
//!   - [`core::engine`] - Optimistic engine over an `AccountStore`
//!   - `core::r#async` - Row-locking engine and batch processor
//!   - [`core::statement`] - Statements and listings
//! - [`io`] - CSV input and output
//! - [`strategy`] - Replay pipelines selected at runtime
//! - [`cli`] - CLI argument parsing
//! - [`logging`] - tracing subscriber setup
//!
//! # Admission Rules
//!
//! - **Deposit**: credits the origin; never repays used allowance
//! - **Withdrawal**: counts toward the daily limit; drains the balance first,
//!   then the special allowance
//! - **Transfer**: debits the origin like a withdrawal (without counting
//!   toward the daily limit) and credits the destination
//!
//! A refused request writes nothing.

pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod logging;
pub mod strategy;
pub mod types;

pub use config::LedgerConfig;
pub use core::{AsyncLedgerEngine, InMemoryAccountStore, LedgerEngine, StatementReader};
pub use io::{write_accounts_csv, write_statement_csv};
pub use types::{
    Account, AccountNumber, AccountType, Actor, LedgerError, RejectReason, Transaction,
    TransactionId, TransactionRecord, TransactionRequest, TransactionType,
};
