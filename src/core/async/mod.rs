//! Asynchronous, lock-based implementations of the core components
//!
//! - **AsyncAccountStore**: account rows guarded by per-row `tokio::sync::Mutex` locks
//! - **AsyncLedgerEngine**: admits requests while holding the touched rows' locks
//! - **BatchProcessor**: replays batches with one task per group of related accounts
//!
//! # Thread Safety
//!
//! Locks are always taken in ascending account number order, so requests over
//! overlapping accounts (including transfers in opposite directions) cannot
//! deadlock. Requests over disjoint accounts proceed in parallel.

pub mod account_store;
pub mod batch_processor;
pub mod engine;

pub use account_store::{AsyncAccountStore, RowLocks};
pub use batch_processor::{BatchProcessor, ProcessingResult};
pub use engine::AsyncLedgerEngine;
