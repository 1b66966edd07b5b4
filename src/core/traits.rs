//! Core traits for account storage
//!
//! `LedgerView` is the read-only surface used by the statement reader; both
//! the optimistic and the pessimistic store implement it. `AccountStore` adds
//! the optimistic write protocol used by the synchronous engine: read a
//! versioned row, evaluate, then commit against the versions that were read.

use crate::core::admission::DailyWindow;
use crate::types::{
    Account, AccountNumber, AccountType, LedgerError, OwnerId, StoreError, Transaction,
    TransactionId,
};
use chrono::{DateTime, Utc};

/// A row together with the version it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: u64,
}

/// Read-only access to committed accounts and transactions
pub trait LedgerView: Send + Sync {
    /// Current committed state of an account
    ///
    /// `NotFound` for an unknown number, `Transient` if the row cannot be read.
    fn account(&self, number: AccountNumber) -> Result<Account, LedgerError>;

    /// Every account, in no particular order
    ///
    /// The rows form one consistent cut: no commit is visible on one row and
    /// missing from another.
    fn accounts(&self) -> Result<Vec<Account>, LedgerError>;

    /// A committed transaction by id
    fn transaction(&self, id: TransactionId) -> Option<Transaction>;

    /// Transactions touching `number` as origin or destination, newest first
    fn transactions_for(&self, number: AccountNumber) -> Vec<Transaction>;

    /// Every committed transaction, newest first
    fn transactions(&self) -> Vec<Transaction>;
}

/// Versioned account storage with atomic commits
///
/// Every committed change to a row bumps its version. A commit names the
/// version each written row was read at and fails with
/// `StoreError::Conflict` if any of them moved in the meantime.
pub trait AccountStore: LedgerView {
    /// Read an account with its current version
    fn read_account(&self, number: AccountNumber) -> Result<Versioned<Account>, LedgerError>;

    /// Withdrawals committed on `number` inside `window`
    fn count_withdrawals(&self, number: AccountNumber, window: &DailyWindow) -> usize;

    /// Write `rows` and append `record` as one atomic unit
    ///
    /// Each row's `version` is the version it was read at. Either every row is
    /// written and the record appended, or nothing changes.
    fn commit(
        &self,
        rows: Vec<Versioned<Account>>,
        record: Transaction,
    ) -> Result<Transaction, StoreError>;

    /// Apply a pure transition to one row under its lock
    fn update_account<F>(&self, number: AccountNumber, f: F) -> Result<Account, LedgerError>
    where
        F: FnOnce(&Account) -> Result<Account, LedgerError>;

    /// Create an account with a freshly assigned number and default limits
    fn open_account(
        &self,
        owner: OwnerId,
        account_type: AccountType,
        created_at: DateTime<Utc>,
    ) -> Account;

    /// Load an existing row, keeping its number
    fn insert_account(&self, account: Account) -> Result<(), LedgerError>;
}
