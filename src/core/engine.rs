//! Ledger engine (optimistic concurrency)
//!
//! This module provides the `LedgerEngine`, which admits deposits, withdrawals
//! and transfers against an `AccountStore`. The engine holds no account state:
//! every call re-reads the rows it needs, evaluates the admission rules, and
//! commits against the versions it read.
//!
//! The engine enforces:
//! - Precondition order: not found, forbidden, inactive, then destination checks
//! - The daily withdrawal count and available funds for withdrawals and transfers
//! - All-or-nothing commits: a rejected or failed request writes nothing
//!
//! A version conflict means another request committed a touched row in the
//! meantime. The engine re-reads and re-evaluates, up to `max_retries`
//! attempts, then reports `LedgerError::Transient`.

use crate::config::LedgerConfig;
use crate::core::account_store::InMemoryAccountStore;
use crate::core::admission::{self, DailyWindow, LimitsUpdate};
use crate::core::traits::{AccountStore, Versioned};
use crate::types::{
    Account, AccountNumber, AccountType, Actor, LedgerError, StoreError, Transaction,
    TransactionRequest, TransactionType,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of a single admission attempt
enum Attempt {
    Conflict(AccountNumber),
    Failed(LedgerError),
}

impl From<LedgerError> for Attempt {
    fn from(error: LedgerError) -> Self {
        Attempt::Failed(error)
    }
}

impl From<StoreError> for Attempt {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict { account } => Attempt::Conflict(account),
            other => Attempt::Failed(other.into()),
        }
    }
}

/// Ledger engine over an optimistic account store
///
/// Cheap to clone; clones share the same store.
#[derive(Debug)]
pub struct LedgerEngine<S = InMemoryAccountStore> {
    store: Arc<S>,
    max_retries: u32,
}

impl<S> Clone for LedgerEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            max_retries: self.max_retries,
        }
    }
}

impl LedgerEngine<InMemoryAccountStore> {
    /// Create an engine over a fresh in-memory store
    pub fn in_memory(config: &LedgerConfig) -> Self {
        Self::new(Arc::new(InMemoryAccountStore::new(config)), config)
    }
}

impl<S: AccountStore> LedgerEngine<S> {
    /// Create a new LedgerEngine
    ///
    /// # Arguments
    ///
    /// * `store` - Shared account store
    /// * `config` - Supplies the retry budget
    pub fn new(store: Arc<S>, config: &LedgerConfig) -> Self {
        Self {
            store,
            max_retries: config.max_retries.max(1),
        }
    }

    /// The store this engine writes to
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Admit a request at the current instant
    ///
    /// The clock is read on every attempt, so a request that lost a conflict
    /// is stamped after the commit that beat it.
    ///
    /// # Returns
    ///
    /// * `Ok(Transaction)` - The committed record
    /// * `Err(LedgerError)` - `NotFound`, `Forbidden`, `Rejected` or `Transient`;
    ///   no row or transaction was written
    pub fn admit(
        &self,
        request: &TransactionRequest,
        actor: &Actor,
    ) -> Result<Transaction, LedgerError> {
        self.admit_with(request, actor, Utc::now)
    }

    /// Admit a request as of `now`
    ///
    /// `now` becomes the record's `created_at` and selects the UTC day used
    /// for the daily withdrawal count.
    pub fn admit_at(
        &self,
        request: &TransactionRequest,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Transaction, LedgerError> {
        self.admit_with(request, actor, || now)
    }

    fn admit_with(
        &self,
        request: &TransactionRequest,
        actor: &Actor,
        clock: impl Fn() -> DateTime<Utc>,
    ) -> Result<Transaction, LedgerError> {
        admission::validate_value(request)?;

        let mut conflicting = request.origin;
        for attempt in 1..=self.max_retries {
            match self.try_admit(request, actor, clock()) {
                Ok(record) => {
                    debug!(
                        id = %record.id,
                        kind = %record.transaction_type,
                        origin = record.origin,
                        value = %record.value,
                        attempt,
                        "transaction admitted"
                    );
                    return Ok(record);
                }
                Err(Attempt::Failed(error)) => return Err(error),
                Err(Attempt::Conflict(account)) => {
                    debug!(account, attempt, "commit conflict, re-evaluating");
                    conflicting = account;
                }
            }
        }

        warn!(
            account = conflicting,
            attempts = self.max_retries,
            "giving up after repeated conflicts"
        );
        Err(LedgerError::transient(format!(
            "conflict on account {} persisted after {} attempts",
            conflicting, self.max_retries
        )))
    }

    fn try_admit(
        &self,
        request: &TransactionRequest,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Transaction, Attempt> {
        let origin = self.store.read_account(request.origin)?;
        let destination = match admission::check_origin(request, actor, &origin.value)? {
            Some(number) => Some(self.store.read_account(number)?),
            None => None,
        };

        let withdrawals_today = match request.transaction_type {
            TransactionType::Deposit => 0,
            TransactionType::Withdrawal | TransactionType::Transfer => self
                .store
                .count_withdrawals(request.origin, &DailyWindow::containing(now)),
        };

        let effect = admission::evaluate(
            request,
            &origin.value,
            destination.as_ref().map(|d| &d.value),
            withdrawals_today,
        )?;

        let mut rows = vec![Versioned {
            value: effect.origin,
            version: origin.version,
        }];
        if let (Some(next), Some(read)) = (effect.destination, destination) {
            rows.push(Versioned {
                value: next,
                version: read.version,
            });
        }

        let record = Transaction::admitted(request, now);
        Ok(self.store.commit(rows, record)?)
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
    pub fn update_limits(
        &self,
        actor: &Actor,
        number: AccountNumber,
        update: LimitsUpdate,
    ) -> Result<Account, LedgerError> {
        admission::require_admin(actor)?;
        let account = self
            .store
            .update_account(number, |a| admission::apply_limits(a, update))?;
        info!(
            account = number,
            daily = account.daily_withdrawal_limit,
            special = %account.special_withdrawal_limit,
            "limits updated"
        );
        Ok(account)
    }

    /// Activate or deactivate an account (administrators only)
    pub fn set_active(
        &self,
        actor: &Actor,
        number: AccountNumber,
        active: bool,
    ) -> Result<Account, LedgerError> {
        admission::require_admin(actor)?;
        let account = self
            .store
            .update_account(number, |a| Ok(admission::apply_active(a, active)))?;
        info!(account = number, active, "activation changed");
        Ok(account)
    }

    /// Load an existing account row, keeping its number and balances
    pub fn import_account(&self, account: Account) -> Result<(), LedgerError> {
        self.store.insert_account(account)
    }
}
