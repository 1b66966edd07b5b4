//! Error types for the Ledger Engine
//!
//! This module defines every error that can surface from the engine, the
//! statement reader and the CSV replay tool.
//!
//! # Error Categories
//!
//! - **Admission outcomes**: `NotFound`, `Forbidden`, `Rejected` and `Transient`.
//!   `Rejected` is deterministic and never retried; `Transient` may succeed
//!   if the caller tries again.
//! - **File I/O and CSV errors**: reported by the replay tool.
//! - **Store conflicts**: `StoreError` stays inside the engine, which retries
//!   or turns it into `Transient`.

use crate::types::{AccountNumber, OwnerId, TransactionId};
use thiserror::Error;

/// Reason a request was deterministically refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("account inactive")]
    AccountInactive,

    #[error("destination required")]
    DestinationRequired,

    #[error("cannot transfer to the same account")]
    SameAccount,

    #[error("daily limit exceeded")]
    DailyLimitExceeded,

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("value must be positive")]
    NonPositiveValue,

    #[error("balance overflow")]
    BalanceOverflow,

    #[error("special withdrawal limit below used allowance")]
    LimitBelowUsed,

    #[error("account already exists")]
    DuplicateAccount,

    #[error("invalid account state")]
    InvalidAccountState,
}

/// Main error type for the ledger
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// Referenced account does not exist
    #[error("Account {account} not found")]
    NotFound {
        /// The missing account number
        account: AccountNumber,
    },

    /// Referenced transaction does not exist
    #[error("Transaction {id} not found")]
    TransactionNotFound {
        /// The missing transaction id
        id: TransactionId,
    },

    /// Actor is neither the owner nor an administrator
    ///
    /// `account` is `None` for operations reserved to administrators.
    #[error("Actor {actor} is not allowed to {}", account.map(|a| format!("access account {}", a)).unwrap_or_else(|| "perform administrative operations".to_string()))]
    Forbidden {
        /// The actor that was refused
        actor: OwnerId,
        /// The account the actor tried to reach, if any
        account: Option<AccountNumber>,
    },

    /// Business rule refused the request; nothing was written
    #[error("Request on account {account} rejected: {reason}")]
    Rejected {
        /// Account whose rule refused the request
        account: AccountNumber,
        /// Why the request was refused
        reason: RejectReason,
    },

    /// Conflict retries exhausted, lock timeout or an unusable store
    ///
    /// Safe to retry. Nothing was written.
    #[error("Transient failure: {message}")]
    Transient {
        /// Description of the failure
        message: String,
    },

    /// File not found at the specified path
    #[error("File not found: {path}")]
    FileNotFound {
        /// The path that was not found
        path: String,
    },

    /// I/O error while reading or writing files
    #[error("I/O error: {message}")]
    IoError {
        /// Description of the I/O error
        message: String,
    },

    /// CSV parsing error; the row is skipped
    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError {
        /// Line number where the error occurred (if available)
        line: Option<u64>,
        /// Description of the parsing error
        message: String,
    },

    /// Row parsed as CSV but does not describe a valid request or account
    #[error("Invalid record: {message}")]
    InvalidRecord {
        /// Description of the problem
        message: String,
    },

    /// Configuration could not be loaded or is out of range
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem
        message: String,
    },
}

/// Failure of a store commit
///
/// Never leaves the engine: conflicts are retried, and both variants turn into
/// `LedgerError::Transient` once they surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A touched row changed since it was read
    #[error("version conflict on account {account}")]
    Conflict {
        /// First account whose version no longer matched
        account: AccountNumber,
    },

    /// The store cannot serve the request (poisoned or missing lock)
    #[error("store unavailable: {message}")]
    Unavailable {
        /// Description of the failure
        message: String,
    },
}

impl From<StoreError> for LedgerError {
    fn from(error: StoreError) -> Self {
        LedgerError::Transient {
            message: error.to_string(),
        }
    }
}

// Conversion from io::Error to LedgerError
impl From<std::io::Error> for LedgerError {
    fn from(error: std::io::Error) -> Self {
        LedgerError::IoError {
            message: error.to_string(),
        }
    }
}

// Conversion from csv::Error to LedgerError
impl From<csv::Error> for LedgerError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        LedgerError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

impl From<config::ConfigError> for LedgerError {
    fn from(error: config::ConfigError) -> Self {
        LedgerError::Config {
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl LedgerError {
    /// Create a NotFound error
    pub fn not_found(account: AccountNumber) -> Self {
        LedgerError::NotFound { account }
    }

    /// Create a Forbidden error for an account the actor may not touch
    pub fn forbidden(actor: OwnerId, account: AccountNumber) -> Self {
        LedgerError::Forbidden {
            actor,
            account: Some(account),
        }
    }

    /// Create a Forbidden error for an administrator-only operation
    pub fn admin_required(actor: OwnerId) -> Self {
        LedgerError::Forbidden {
            actor,
            account: None,
        }
    }

    /// Create a Rejected error
    pub fn rejected(account: AccountNumber, reason: RejectReason) -> Self {
        LedgerError::Rejected { account, reason }
    }

    /// Create a Transient error
    pub fn transient(message: impl Into<String>) -> Self {
        LedgerError::Transient {
            message: message.into(),
        }
    }

    /// Create an InvalidRecord error
    pub fn invalid_record(message: impl Into<String>) -> Self {
        LedgerError::InvalidRecord {
            message: message.into(),
        }
    }

    /// Map a failure to open `path`
    pub fn open_failed(path: &std::path::Path, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => LedgerError::FileNotFound {
                path: path.display().to_string(),
            },
            _ => LedgerError::IoError {
                message: format!("Failed to open file '{}': {}", path.display(), error),
            },
        }
    }

    /// Whether retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Transient { .. })
    }

    /// The reject reason, if this is a `Rejected` outcome
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            LedgerError::Rejected { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}
