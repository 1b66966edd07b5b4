//! Core business logic module
//!
//! This module contains the ledger components:
//! - `admission` - Pure admission rules shared by both engines
//! - `traits` - Store abstractions (`LedgerView`, `AccountStore`)
//! - `account_store` - In-memory store with optimistic version checks
//! - `transaction_store` - Append-only transaction log
//! - `engine` - Synchronous engine with bounded conflict retry
//! - `statement` - Statement reader and listings
//! - `async` - Row-locking store, async engine and batch processor

pub mod account_store;
pub mod admission;
pub mod r#async;
pub mod engine;
pub mod statement;
pub mod traits;
pub mod transaction_store;

pub use account_store::InMemoryAccountStore;
pub use admission::{DailyWindow, LimitsUpdate};
pub use engine::LedgerEngine;
pub use r#async::{AsyncAccountStore, AsyncLedgerEngine, BatchProcessor};
pub use statement::{AccountFilter, DateRange, Statement, StatementReader, TransactionFilter};
pub use traits::{AccountStore, LedgerView, Versioned};
pub use transaction_store::TransactionStore;
