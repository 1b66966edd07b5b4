//! Types module
//!
//! Contains core data structures used throughout the application:
//! - `account`: Account rows and identifiers
//! - `actor`: The authenticated caller and its role
//! - `transaction`: Requests, committed transactions and replay records
//! - `error`: Error types for the ledger

pub mod account;
pub mod actor;
pub mod error;
pub mod transaction;

pub use account::{Account, AccountLimits, AccountNumber, AccountType, OwnerId};
pub use actor::{Actor, Role};
pub use error::{LedgerError, RejectReason, StoreError};
pub use transaction::{
    Transaction, TransactionId, TransactionRecord, TransactionRequest, TransactionType,
};
