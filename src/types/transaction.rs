//! Transaction-related types for the Ledger Engine
//!
//! This module defines the request submitted to the engine, the immutable
//! transaction record it produces on success, and the replay record read
//! from CSV input.

use super::account::AccountNumber;
use super::actor::Actor;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Transaction identifier
pub type TransactionId = Uuid;

/// Transaction types supported by the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Credit funds to the origin account
    ///
    /// Always admitted for an active account. Does not repay overdraft usage.
    Deposit,

    /// Debit funds from the origin account
    ///
    /// Subject to the daily withdrawal count and the available funds
    /// (balance plus remaining special allowance).
    Withdrawal,

    /// Debit the origin and credit the destination in one unit
    ///
    /// The origin side follows the withdrawal rules.
    Transfer,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::Transfer => "transfer",
        };
        f.write_str(name)
    }
}

/// A request to move money, as submitted to `admit`
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRequest {
    pub transaction_type: TransactionType,

    /// Amount to move; must be strictly positive
    pub value: Decimal,

    /// Account debited (withdrawal, transfer) or credited (deposit)
    pub origin: AccountNumber,

    /// Credited account; required for transfers, ignored otherwise
    pub destination: Option<AccountNumber>,
}

impl TransactionRequest {
    pub fn deposit(origin: AccountNumber, value: Decimal) -> Self {
        Self {
            transaction_type: TransactionType::Deposit,
            value,
            origin,
            destination: None,
        }
    }

    pub fn withdrawal(origin: AccountNumber, value: Decimal) -> Self {
        Self {
            transaction_type: TransactionType::Withdrawal,
            value,
            origin,
            destination: None,
        }
    }

    pub fn transfer(origin: AccountNumber, destination: AccountNumber, value: Decimal) -> Self {
        Self {
            transaction_type: TransactionType::Transfer,
            value,
            origin,
            destination: Some(destination),
        }
    }

    /// Every account number this request touches, ascending and without duplicates
    ///
    /// This is the lock order used by the pessimistic store.
    pub fn touched_accounts(&self) -> Vec<AccountNumber> {
        let mut accounts = vec![self.origin];
        if self.transaction_type == TransactionType::Transfer {
            if let Some(destination) = self.destination {
                accounts.push(destination);
            }
        }
        accounts.sort_unstable();
        accounts.dedup();
        accounts
    }
}

/// Committed transaction row
///
/// Rows are append-only: once admitted, a transaction is never updated or removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub value: Decimal,
    pub transaction_type: TransactionType,
    pub origin: AccountNumber,
    pub destination: Option<AccountNumber>,

    /// Admission instant; orders statements and places withdrawals in a day
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Build the record for an admitted request with a fresh id
    pub fn admitted(request: &TransactionRequest, created_at: DateTime<Utc>) -> Self {
        let destination = match request.transaction_type {
            TransactionType::Transfer => request.destination,
            TransactionType::Deposit | TransactionType::Withdrawal => None,
        };

        Transaction {
            id: Uuid::new_v4(),
            value: request.value,
            transaction_type: request.transaction_type,
            origin: request.origin,
            destination,
            created_at,
        }
    }
}

/// Replay record read from the request CSV
///
/// Couples the request with the actor submitting it and, optionally, the
/// historical instant at which it should be admitted.
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    pub actor: Actor,
    pub request: TransactionRequest,

    /// Admission instant; `None` admits at the current time
    pub timestamp: Option<DateTime<Utc>>,
}
