//! Account store with pessimistic row locks for async processing
//!
//! This module provides the `AsyncAccountStore`, which pairs committed rows
//! with a table of per-row `tokio::sync::Mutex` locks. A caller acquires the
//! locks of every row it will touch (in ascending account number order),
//! then reads, evaluates and writes while holding them, much like
//! `SELECT ... FOR UPDATE` in a relational store.
//!
//! # Design
//!
//! - `rows` holds the committed state. Readers never take a row lock, so
//!   statements never queue behind a unit of work that is still evaluating.
//! - `locks` holds one async mutex per account. Rows are written only by a
//!   holder of that account's lock, via `RowLocks`.
//! - `publish` is held for writing while a commit writes its rows and appends
//!   its record, and for reading while a reader copies rows out. A reader
//!   therefore sees every row of a commit or none of them. The record is
//!   appended last, so it is never visible before its rows.
//! - Writes to rows and the append to the transaction log are plain
//!   synchronous calls, so a commit never contains a suspension point.

use crate::config::LedgerConfig;
use crate::core::admission::DailyWindow;
use crate::core::traits::LedgerView;
use crate::core::transaction_store::TransactionStore;
use crate::types::{
    Account, AccountLimits, AccountNumber, AccountType, LedgerError, OwnerId, RejectReason,
    StoreError, Transaction, TransactionId,
};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Row locks held by one unit of work
///
/// Dropping the value releases every lock.
#[derive(Debug)]
pub struct RowLocks {
    /// Locked account numbers, ascending
    numbers: Vec<AccountNumber>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl RowLocks {
    pub fn holds(&self, number: AccountNumber) -> bool {
        self.numbers.binary_search(&number).is_ok()
    }
}

/// Account store guarded by async row locks
#[derive(Debug)]
pub struct AsyncAccountStore {
    /// Committed account rows by number
    rows: DashMap<AccountNumber, Account>,

    /// One lock per account
    locks: DashMap<AccountNumber, Arc<Mutex<()>>>,

    /// Write side held while a commit publishes its rows and record
    publish: RwLock<()>,

    /// Append-only transaction log
    transactions: TransactionStore,

    /// Next number handed out by `open_account`
    next_number: AtomicU32,

    /// Limits for accounts opened through the store
    limits: AccountLimits,
}

impl AsyncAccountStore {
    /// Create an empty store
    ///
    /// # Arguments
    ///
    /// * `config` - Supplies the default limits for newly opened accounts
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            rows: DashMap::new(),
            locks: DashMap::new(),
            publish: RwLock::new(()),
            transactions: TransactionStore::new(),
            next_number: AtomicU32::new(1),
            limits: config.account_limits(),
        }
    }

    /// Acquire the locks of `numbers` in ascending order
    ///
    /// Unknown accounts have no lock and are skipped; reading them later
    /// reports `NotFound`. The future may be dropped at any point, releasing
    /// whatever it acquired so far.
    pub async fn lock_rows(&self, numbers: &[AccountNumber]) -> RowLocks {
        let mut sorted = numbers.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        // Clone the handles out first: no DashMap reference may live across an await.
        let handles: Vec<(AccountNumber, Arc<Mutex<()>>)> = sorted
            .iter()
            .filter_map(|number| {
                self.locks
                    .get(number)
                    .map(|lock| (*number, Arc::clone(lock.value())))
            })
            .collect();

        let mut held = Vec::with_capacity(handles.len());
        let mut guards = Vec::with_capacity(handles.len());
        for (number, lock) in handles {
            guards.push(lock.lock_owned().await);
            held.push(number);
        }

        RowLocks {
            numbers: held,
            _guards: guards,
        }
    }

    /// Read a row whose lock is held
    pub fn read_locked(
        &self,
        locks: &RowLocks,
        number: AccountNumber,
    ) -> Result<Account, LedgerError> {
        if !locks.holds(number) {
            if self.rows.contains_key(&number) {
                return Err(StoreError::Unavailable {
                    message: format!("row lock for account {} not held", number),
                }
                .into());
            }
            return Err(LedgerError::not_found(number));
        }

        self.rows
            .get(&number)
            .map(|row| row.value().clone())
            .ok_or_else(|| LedgerError::not_found(number))
    }

    /// Withdrawals committed on `number` inside `window`
    pub fn count_withdrawals(&self, number: AccountNumber, window: &DailyWindow) -> usize {
        self.transactions.count_withdrawals(number, window)
    }

    /// Write `rows` and append `record` under held locks
    ///
    /// Fails without writing anything if any row's lock is not held.
    pub fn commit_locked(
        &self,
        locks: &RowLocks,
        rows: Vec<Account>,
        record: Transaction,
    ) -> Result<Transaction, LedgerError> {
        if let Some(row) = rows.iter().find(|row| !locks.holds(row.number)) {
            return Err(StoreError::Unavailable {
                message: format!("row lock for account {} not held", row.number),
            }
            .into());
        }

        let _published = self.publish_guard()?;
        for row in rows {
            self.rows.insert(row.number, row);
        }
        self.transactions.append(record.clone());

        Ok(record)
    }

    /// Overwrite one row under its held lock
    pub fn write_locked(&self, locks: &RowLocks, account: Account) -> Result<Account, LedgerError> {
        if !locks.holds(account.number) {
            return Err(StoreError::Unavailable {
                message: format!("row lock for account {} not held", account.number),
            }
            .into());
        }

        let _published = self.publish_guard()?;
        self.rows.insert(account.number, account.clone());
        Ok(account)
    }

    /// Create an account with a freshly assigned number and default limits
    pub fn open_account(
        &self,
        owner: OwnerId,
        account_type: AccountType,
        created_at: DateTime<Utc>,
    ) -> Account {
        loop {
            let number = self.next_number.fetch_add(1, Ordering::SeqCst);
            if self.claim(number) {
                let account = Account::open(number, owner, account_type, self.limits, created_at);
                self.rows.insert(number, account.clone());
                return account;
            }
        }
    }

    /// Load an existing row, keeping its number
    pub fn insert_account(&self, account: Account) -> Result<(), LedgerError> {
        if !account.is_consistent() {
            return Err(LedgerError::rejected(
                account.number,
                RejectReason::InvalidAccountState,
            ));
        }
        if !self.claim(account.number) {
            return Err(LedgerError::rejected(
                account.number,
                RejectReason::DuplicateAccount,
            ));
        }

        self.next_number
            .fetch_max(account.number.saturating_add(1), Ordering::SeqCst);
        self.rows.insert(account.number, account);
        Ok(())
    }

    /// Number of committed transactions
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    fn publish_guard(&self) -> Result<RwLockWriteGuard<'_, ()>, StoreError> {
        self.publish.write().map_err(|_| StoreError::Unavailable {
            message: "commit section poisoned".to_string(),
        })
    }

    fn read_guard(&self) -> Result<RwLockReadGuard<'_, ()>, StoreError> {
        self.publish.read().map_err(|_| StoreError::Unavailable {
            message: "commit section poisoned".to_string(),
        })
    }

    /// Reserve `number` by creating its lock; false if it already exists
    fn claim(&self, number: AccountNumber) -> bool {
        match self.locks.entry(number) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(())));
                true
            }
        }
    }
}

impl LedgerView for AsyncAccountStore {
    fn account(&self, number: AccountNumber) -> Result<Account, LedgerError> {
        let _reading = self.read_guard()?;
        self.rows
            .get(&number)
            .map(|row| row.value().clone())
            .ok_or_else(|| LedgerError::not_found(number))
    }

    fn accounts(&self) -> Result<Vec<Account>, LedgerError> {
        let _reading = self.read_guard()?;
        Ok(self.rows.iter().map(|row| row.value().clone()).collect())
    }

    fn transaction(&self, id: TransactionId) -> Option<Transaction> {
        self.transactions.get(id)
    }

    fn transactions_for(&self, number: AccountNumber) -> Vec<Transaction> {
        self.transactions.for_account(number)
    }

    fn transactions(&self) -> Vec<Transaction> {
        self.transactions.all()
    }
}
