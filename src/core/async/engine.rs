//! Ledger engine (pessimistic concurrency)
//!
//! This module provides the `AsyncLedgerEngine`, the async counterpart of
//! `LedgerEngine`. Instead of version checks it holds row locks across the
//! whole read-check-write sequence:
//!
//! 1. Lock every touched row in ascending account number order, bounded by
//!    the configured lock timeout.
//! 2. Read rows, count today's withdrawals, evaluate the admission rules.
//! 3. Write rows and append the transaction, then release the locks.
//!
//! Steps 2 and 3 contain no `.await`. Cancelling `admit` while it waits for a
//! lock leaves no trace; once the locks are held the call runs to completion
//! without yielding.
//!
//! # Thread Safety
//!
//! The engine is `Clone` and shares its store through an `Arc`, so it can be
//! moved into spawned tasks freely.

use super::account_store::{AsyncAccountStore, RowLocks};
use crate::config::LedgerConfig;
use crate::core::admission::{self, DailyWindow, LimitsUpdate};
use crate::types::{
    Account, AccountNumber, AccountType, Actor, LedgerError, Transaction, TransactionRequest,
    TransactionType,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Ledger engine over the row-locking store
#[derive(Debug, Clone)]
pub struct AsyncLedgerEngine {
    store: Arc<AsyncAccountStore>,
    lock_timeout: Duration,
}

impl AsyncLedgerEngine {
    /// Create a new AsyncLedgerEngine
    ///
    /// # Arguments
    ///
    /// * `store` - Shared row-locking store
    /// * `config` - Supplies the lock timeout
    pub fn new(store: Arc<AsyncAccountStore>, config: &LedgerConfig) -> Self {
        Self {
            store,
            lock_timeout: config.lock_timeout(),
        }
    }

    /// Create an engine over a fresh store
    pub fn in_memory(config: &LedgerConfig) -> Self {
        Self::new(Arc::new(AsyncAccountStore::new(config)), config)
    }

    /// The store this engine writes to
    pub fn store(&self) -> &Arc<AsyncAccountStore> {
        &self.store
    }

    async fn lock(&self, numbers: &[AccountNumber]) -> Result<RowLocks, LedgerError> {
        tokio::time::timeout(self.lock_timeout, self.store.lock_rows(numbers))
            .await
            .map_err(|_| {
                warn!(accounts = ?numbers, timeout = ?self.lock_timeout, "row lock timeout");
                LedgerError::transient(format!(
                    "timed out after {:?} waiting for row locks on {:?}",
                    self.lock_timeout, numbers
                ))
            })
    }

    /// Admit a request at the current instant
    ///
    /// The clock is read once the row locks are held, so records on one
    /// account are stamped in commit order.
    ///
    /// # Returns
    ///
    /// * `Ok(Transaction)` - The committed record
    /// * `Err(LedgerError)` - `NotFound`, `Forbidden`, `Rejected`, or
    ///   `Transient` on lock timeout; no row or transaction was written
    pub async fn admit(
        &self,
        request: &TransactionRequest,
        actor: &Actor,
    ) -> Result<Transaction, LedgerError> {
        self.admit_with(request, actor, Utc::now).await
    }

    /// Admit a request as of `now`
    pub async fn admit_at(
        &self,
        request: &TransactionRequest,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Transaction, LedgerError> {
        self.admit_with(request, actor, || now).await
    }

    async fn admit_with(
        &self,
        request: &TransactionRequest,
        actor: &Actor,
        clock: impl FnOnce() -> DateTime<Utc>,
    ) -> Result<Transaction, LedgerError> {
        admission::validate_value(request)?;

        let locks = self.lock(&request.touched_accounts()).await?;

        // No suspension point from here until the locks drop.
        let now = clock();
        let origin = self.store.read_locked(&locks, request.origin)?;
        let destination = match admission::check_origin(request, actor, &origin)? {
            Some(number) => Some(self.store.read_locked(&locks, number)?),
            None => None,
        };

        let withdrawals_today = match request.transaction_type {
            TransactionType::Deposit => 0,
            TransactionType::Withdrawal | TransactionType::Transfer => self
                .store
                .count_withdrawals(request.origin, &DailyWindow::containing(now)),
        };

        let effect =
            admission::evaluate(request, &origin, destination.as_ref(), withdrawals_today)?;
        let record = self.store.commit_locked(
            &locks,
            effect.into_rows(),
            Transaction::admitted(request, now),
        )?;

        debug!(
            id = %record.id,
            kind = %record.transaction_type,
            origin = record.origin,
            value = %record.value,
            "transaction admitted"
        );
        Ok(record)
    }

    /// Open an account owned by `actor` with the configured default limits
    pub fn open_account(&self, actor: &Actor, account_type: AccountType) -> Account {
        let account = self.store.open_account(actor.id, account_type, Utc::now());
        info!(
            account = account.number,
            owner = account.owner,
            kind = %account.account_type,
            "account opened"
        );
        account
    }

    /// Change an account's withdrawal limits (administrators only)
    pub async fn update_limits(
        &self,
        actor: &Actor,
        number: AccountNumber,
        update: LimitsUpdate,
    ) -> Result<Account, LedgerError> {
        admission::require_admin(actor)?;
        let locks = self.lock(&[number]).await?;

        let current = self.store.read_locked(&locks, number)?;
        let account = self
            .store
            .write_locked(&locks, admission::apply_limits(&current, update)?)?;
        info!(
            account = number,
            daily = account.daily_withdrawal_limit,
            special = %account.special_withdrawal_limit,
            "limits updated"
        );
        Ok(account)
    }

    /// Activate or deactivate an account (administrators only)
    pub async fn set_active(
        &self,
        actor: &Actor,
        number: AccountNumber,
        active: bool,
    ) -> Result<Account, LedgerError> {
        admission::require_admin(actor)?;
        let locks = self.lock(&[number]).await?;

        let current = self.store.read_locked(&locks, number)?;
        let account = self
            .store
            .write_locked(&locks, admission::apply_active(&current, active))?;
        info!(account = number, active, "activation changed");
        Ok(account)
    }

    /// Load an existing account row, keeping its number and balances
    pub fn import_account(&self, account: Account) -> Result<(), LedgerError> {
        self.store.insert_account(account)
    }
}
