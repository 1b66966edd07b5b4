//! In-memory account store with optimistic concurrency
//!
//! Rows live in a `DashMap` of per-row mutexes. Reads copy a row out together
//! with its version; commits lock every touched row in ascending account
//! number order, verify the versions, write the rows and append the
//! transaction before releasing any lock.
//!
//! # Invariants
//!
//! - A row's version increases by one on every committed change.
//! - A transaction is appended while the rows it touches are locked, so a
//!   withdrawal can never be committed without bumping its origin's version.
//!   This is what makes a version check cover the daily withdrawal count.

use crate::config::LedgerConfig;
use crate::core::admission::DailyWindow;
use crate::core::traits::{AccountStore, LedgerView, Versioned};
use crate::core::transaction_store::TransactionStore;
use crate::types::{
    Account, AccountLimits, AccountNumber, AccountType, LedgerError, OwnerId, RejectReason,
    StoreError, Transaction, TransactionId,
};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

type Row = Arc<Mutex<Versioned<Account>>>;

/// Optimistic in-memory account store
#[derive(Debug)]
pub struct InMemoryAccountStore {
    /// Account rows by number
    rows: DashMap<AccountNumber, Row>,

    /// Append-only transaction log
    transactions: TransactionStore,

    /// Next number handed out by `open_account`
    next_number: AtomicU32,

    /// Limits for accounts opened through the store
    limits: AccountLimits,
}

impl InMemoryAccountStore {
    /// Create an empty store
    ///
    /// # Arguments
    ///
    /// * `config` - Supplies the default limits for newly opened accounts
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            rows: DashMap::new(),
            transactions: TransactionStore::new(),
            next_number: AtomicU32::new(1),
            limits: config.account_limits(),
        }
    }

    fn row(&self, number: AccountNumber) -> Option<Row> {
        self.rows.get(&number).map(|row| Arc::clone(row.value()))
    }

    /// Number of committed transactions
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }
}

fn lock_row(
    row: &Mutex<Versioned<Account>>,
    number: AccountNumber,
) -> Result<MutexGuard<'_, Versioned<Account>>, StoreError> {
    row.lock().map_err(|_| StoreError::Unavailable {
        message: format!("row lock for account {} poisoned", number),
    })
}

impl LedgerView for InMemoryAccountStore {
    fn account(&self, number: AccountNumber) -> Result<Account, LedgerError> {
        let row = self.row(number).ok_or_else(|| LedgerError::not_found(number))?;
        let guard = lock_row(&row, number)?;
        Ok(guard.value.clone())
    }

    fn accounts(&self) -> Result<Vec<Account>, LedgerError> {
        let mut handles: Vec<(AccountNumber, Row)> = self
            .rows
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();
        handles.sort_unstable_by_key(|(number, _)| *number);

        // Hold every row at once, in commit order, for a consistent cut.
        let guards = handles
            .iter()
            .map(|(number, row)| lock_row(row, *number))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(guards.iter().map(|guard| guard.value.clone()).collect())
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

impl AccountStore for InMemoryAccountStore {
    fn read_account(&self, number: AccountNumber) -> Result<Versioned<Account>, LedgerError> {
        let row = self.row(number).ok_or_else(|| LedgerError::not_found(number))?;
        let guard = lock_row(&row, number)?;
        Ok(guard.clone())
    }

    fn count_withdrawals(&self, number: AccountNumber, window: &DailyWindow) -> usize {
        self.transactions.count_withdrawals(number, window)
    }

    fn commit(
        &self,
        mut rows: Vec<Versioned<Account>>,
        record: Transaction,
    ) -> Result<Transaction, StoreError> {
        rows.sort_by_key(|row| row.value.number);
        if rows
            .windows(2)
            .any(|pair| pair[0].value.number == pair[1].value.number)
        {
            return Err(StoreError::Unavailable {
                message: "commit names the same account twice".to_string(),
            });
        }

        let handles = rows
            .iter()
            .map(|row| {
                let number = row.value.number;
                self.row(number)
                    .ok_or(StoreError::Conflict { account: number })
            })
            .collect::<Result<Vec<_>, _>>()?;

        // Ascending order: two commits over overlapping rows cannot deadlock.
        let mut guards = Vec::with_capacity(handles.len());
        for (handle, row) in handles.iter().zip(&rows) {
            guards.push(lock_row(handle, row.value.number)?);
        }

        for (guard, row) in guards.iter().zip(&rows) {
            if guard.version != row.version {
                debug!(
                    account = row.value.number,
                    read = row.version,
                    current = guard.version,
                    "version conflict"
                );
                return Err(StoreError::Conflict {
                    account: row.value.number,
                });
            }
        }

        for (guard, row) in guards.iter_mut().zip(rows) {
            guard.value = row.value;
            guard.version += 1;
        }
        self.transactions.append(record.clone());

        Ok(record)
    }

    fn update_account<F>(&self, number: AccountNumber, f: F) -> Result<Account, LedgerError>
    where
        F: FnOnce(&Account) -> Result<Account, LedgerError>,
    {
        let row = self.row(number).ok_or_else(|| LedgerError::not_found(number))?;
        let mut guard = lock_row(&row, number)?;

        let next = f(&guard.value)?;
        guard.value = next.clone();
        guard.version += 1;
        Ok(next)
    }

    fn open_account(
        &self,
        owner: OwnerId,
        account_type: AccountType,
        created_at: DateTime<Utc>,
    ) -> Account {
        loop {
            let number = self.next_number.fetch_add(1, Ordering::SeqCst);
            if let Entry::Vacant(slot) = self.rows.entry(number) {
                let account = Account::open(number, owner, account_type, self.limits, created_at);
                slot.insert(Arc::new(Mutex::new(Versioned {
                    value: account.clone(),
                    version: 0,
                })));
                return account;
            }
        }
    }

    fn insert_account(&self, account: Account) -> Result<(), LedgerError> {
        if !account.is_consistent() {
            return Err(LedgerError::rejected(
                account.number,
                RejectReason::InvalidAccountState,
            ));
        }

        let number = account.number;
        match self.rows.entry(number) {
            Entry::Occupied(_) => Err(LedgerError::rejected(
                number,
                RejectReason::DuplicateAccount,
            )),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(Versioned {
                    value: account,
                    version: 0,
                })));
                self.next_number
                    .fetch_max(number.saturating_add(1), Ordering::SeqCst);
                Ok(())
            }
        }
    }
}
