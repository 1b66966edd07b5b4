//! Append-only transaction log
//!
//! This module provides the `TransactionStore` shared by both account stores.
//! Rows are inserted once and never updated or removed. Besides lookup by id,
//! the store keeps a per-account index so statements and the daily withdrawal
//! count only scan the transactions that touch one account.
//!
//! # Ordering
//!
//! Every append receives a commit sequence number. Listings are ordered by
//! `created_at` descending, and rows with the same instant are ordered by
//! descending commit sequence.
//!
//! # Thread Safety
//!
//! Backed by `DashMap`. Callers append while holding the row locks of every
//! account the transaction touches, so appends to one account are serialized
//! by the account store rather than by this log.

use crate::core::admission::DailyWindow;
use crate::types::{AccountNumber, Transaction, TransactionId, TransactionType};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone)]
struct Entry {
    sequence: u64,
    transaction: Transaction,
}

/// Append-only store of committed transactions
#[derive(Debug, Default)]
pub struct TransactionStore {
    /// Committed rows by id
    transactions: DashMap<TransactionId, Entry>,

    /// Ids of the rows touching each account, in commit order
    by_account: DashMap<AccountNumber, Vec<TransactionId>>,

    /// Next commit sequence number
    sequence: AtomicU64,
}

impl TransactionStore {
    /// Create a new empty transaction store
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a committed transaction
    ///
    /// The row is indexed under its origin and, for transfers, its destination.
    ///
    /// # Returns
    ///
    /// The commit sequence number assigned to the row.
    pub fn append(&self, transaction: Transaction) -> u64 {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let id = transaction.id;
        let origin = transaction.origin;
        let destination = transaction.destination.filter(|d| *d != origin);

        self.transactions.insert(
            id,
            Entry {
                sequence,
                transaction,
            },
        );

        self.by_account.entry(origin).or_default().push(id);
        if let Some(destination) = destination {
            self.by_account.entry(destination).or_default().push(id);
        }

        sequence
    }

    /// Get a transaction by id
    pub fn get(&self, id: TransactionId) -> Option<Transaction> {
        self.transactions
            .get(&id)
            .map(|entry| entry.transaction.clone())
    }

    /// Transactions where `account` is origin or destination, newest first
    pub fn for_account(&self, account: AccountNumber) -> Vec<Transaction> {
        let mut entries = self.entries_for(account);
        sort_newest_first(&mut entries);
        entries.into_iter().map(|e| e.transaction).collect()
    }

    /// Every committed transaction, newest first
    pub fn all(&self) -> Vec<Transaction> {
        let mut entries: Vec<Entry> = self
            .transactions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        sort_newest_first(&mut entries);
        entries.into_iter().map(|e| e.transaction).collect()
    }

    /// Number of withdrawals debited from `account` inside `window`
    ///
    /// Only rows of type withdrawal count; transfers and deposits do not.
    pub fn count_withdrawals(&self, account: AccountNumber, window: &DailyWindow) -> usize {
        self.entries_for(account)
            .iter()
            .filter(|entry| {
                let tx = &entry.transaction;
                tx.transaction_type == TransactionType::Withdrawal
                    && tx.origin == account
                    && window.contains(tx.created_at)
            })
            .count()
    }

    /// Total number of committed transactions
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    fn entries_for(&self, account: AccountNumber) -> Vec<Entry> {
        let ids = match self.by_account.get(&account) {
            Some(ids) => ids.value().clone(),
            None => return Vec::new(),
        };

        ids.iter()
            .filter_map(|id| self.transactions.get(id).map(|e| e.value().clone()))
            .collect()
    }
}

fn sort_newest_first(entries: &mut [Entry]) {
    entries.sort_by(|a, b| {
        b.transaction
            .created_at
            .cmp(&a.transaction.created_at)
            .then(b.sequence.cmp(&a.sequence))
    });
}
