//! Statement reader
//!
//! Read-only projections over committed accounts and transactions: the
//! per-account statement with an inclusive date range, plus the owner and
//! administrator listings. Works over any `LedgerView`, so both the
//! optimistic and the pessimistic store can be read the same way.

use crate::core::traits::LedgerView;
use crate::types::{
    Account, AccountNumber, AccountType, Actor, LedgerError, Transaction, TransactionId,
    TransactionType,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;

/// Inclusive range of UTC calendar days
///
/// `initial_date` starts at 00:00:00 and `final_date` runs through
/// 23:59:59.999999. A missing bound leaves that side open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub initial_date: Option<NaiveDate>,
    pub final_date: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(initial_date: Option<NaiveDate>, final_date: Option<NaiveDate>) -> Self {
        Self {
            initial_date,
            final_date,
        }
    }

    pub fn lower_bound(&self) -> Option<DateTime<Utc>> {
        self.initial_date
            .map(|date| date.and_time(NaiveTime::MIN).and_utc())
    }

    pub fn upper_bound(&self) -> Option<DateTime<Utc>> {
        self.final_date
            .and_then(|date| date.and_hms_micro_opt(23, 59, 59, 999_999))
            .map(|datetime| datetime.and_utc())
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.lower_bound().map_or(true, |lower| instant >= lower)
            && self.upper_bound().map_or(true, |upper| instant <= upper)
    }
}

/// Filter for transaction listings
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TransactionFilter {
    /// Keep transactions with `value >= min_value`
    pub min_value: Option<Decimal>,
    pub transaction_type: Option<TransactionType>,
}

impl TransactionFilter {
    pub fn matches(&self, transaction: &Transaction) -> bool {
        self.min_value.map_or(true, |min| transaction.value >= min)
            && self
                .transaction_type
                .map_or(true, |kind| transaction.transaction_type == kind)
    }
}

/// Filter for account listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountFilter {
    pub is_active: Option<bool>,
    pub account_type: Option<AccountType>,
}

impl AccountFilter {
    pub fn matches(&self, account: &Account) -> bool {
        self.is_active.map_or(true, |active| account.is_active == active)
            && self
                .account_type
                .map_or(true, |kind| account.account_type == kind)
    }
}

/// Balance and transaction history of one account
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub account: AccountNumber,
    pub balance: Decimal,
    pub used_special_withdrawal: Decimal,
    pub special_withdrawal_limit: Decimal,

    /// Transactions touching the account inside the range, newest first
    pub transactions: Vec<Transaction>,
}

/// Read-only access to statements and listings
#[derive(Debug)]
pub struct StatementReader<V> {
    view: Arc<V>,
}

impl<V> Clone for StatementReader<V> {
    fn clone(&self) -> Self {
        Self {
            view: Arc::clone(&self.view),
        }
    }
}

impl<V: LedgerView> StatementReader<V> {
    pub fn new(view: Arc<V>) -> Self {
        Self { view }
    }

    /// Statement of `number` restricted to `range`
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown account, `Forbidden` unless the actor owns
    /// the account or is an administrator, `Transient` if the row cannot be
    /// read.
    pub fn statement(
        &self,
        actor: &Actor,
        number: AccountNumber,
        range: DateRange,
    ) -> Result<Statement, LedgerError> {
        let account = self.view.account(number)?;
        if !actor.can_access(&account) {
            return Err(LedgerError::forbidden(actor.id, number));
        }

        let transactions = self
            .view
            .transactions_for(number)
            .into_iter()
            .filter(|tx| range.contains(tx.created_at))
            .collect();

        Ok(Statement {
            account: number,
            balance: account.balance,
            used_special_withdrawal: account.used_special_withdrawal,
            special_withdrawal_limit: account.special_withdrawal_limit,
            transactions,
        })
    }

    /// A single transaction, visible to administrators and to the owner of
    /// either account it touches
    pub fn transaction(&self, actor: &Actor, id: TransactionId) -> Result<Transaction, LedgerError> {
        let transaction = self
            .view
            .transaction(id)
            .ok_or(LedgerError::TransactionNotFound { id })?;

        if actor.is_admin() {
            return Ok(transaction);
        }

        for number in [Some(transaction.origin), transaction.destination]
            .into_iter()
            .flatten()
        {
            match self.view.account(number) {
                Ok(account) if actor.can_access(&account) => return Ok(transaction),
                Ok(_) | Err(LedgerError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        Err(LedgerError::forbidden(actor.id, transaction.origin))
    }

    /// Transactions originating from any account the actor owns, newest first
    pub fn transactions_for_owner(
        &self,
        actor: &Actor,
        filter: TransactionFilter,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let owned: HashSet<AccountNumber> = self
            .view
            .accounts()?
            .into_iter()
            .filter(|account| account.owner == actor.id)
            .map(|account| account.number)
            .collect();

        Ok(self
            .view
            .transactions()
            .into_iter()
            .filter(|tx| owned.contains(&tx.origin) && filter.matches(tx))
            .collect())
    }

    /// Every transaction, newest first (administrators only)
    pub fn all_transactions(
        &self,
        actor: &Actor,
        filter: TransactionFilter,
    ) -> Result<Vec<Transaction>, LedgerError> {
        if !actor.is_admin() {
            return Err(LedgerError::admin_required(actor.id));
        }

        Ok(self
            .view
            .transactions()
            .into_iter()
            .filter(|tx| filter.matches(tx))
            .collect())
    }

    /// The actor's accounts, newest first
    pub fn accounts_for_owner(
        &self,
        actor: &Actor,
        filter: AccountFilter,
    ) -> Result<Vec<Account>, LedgerError> {
        let mut accounts: Vec<Account> = self
            .view
            .accounts()?
            .into_iter()
            .filter(|account| account.owner == actor.id && filter.matches(account))
            .collect();
        sort_accounts_newest_first(&mut accounts);
        Ok(accounts)
    }

    /// Every account, newest first (administrators only)
    pub fn all_accounts(
        &self,
        actor: &Actor,
        filter: AccountFilter,
    ) -> Result<Vec<Account>, LedgerError> {
        if !actor.is_admin() {
            return Err(LedgerError::admin_required(actor.id));
        }

        let mut accounts: Vec<Account> = self
            .view
            .accounts()?
            .into_iter()
            .filter(|account| filter.matches(account))
            .collect();
        sort_accounts_newest_first(&mut accounts);
        Ok(accounts)
    }
}

fn sort_accounts_newest_first(accounts: &mut [Account]) {
    accounts.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then(b.number.cmp(&a.number))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::core::engine::LedgerEngine;
    use crate::core::InMemoryAccountStore;
    use crate::types::{AccountLimits, TransactionRequest};
    use chrono::TimeZone;
    use rstest::rstest;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, d).unwrap()
    }

    fn at(d: u32, h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, d, h, m, s).unwrap()
    }

    /// Engine with account 1 (owner 10, 1000.00) and account 2 (owner 20, 0)
    fn setup() -> (LedgerEngine, StatementReader<InMemoryAccountStore>) {
        let engine = LedgerEngine::in_memory(&LedgerConfig::default());
        let limits = AccountLimits {
            daily_withdrawal_limit: 10,
            special_withdrawal_limit: Decimal::ZERO,
        };
        let mut first = Account::open(1, 10, AccountType::Checking, limits, at(1, 0, 0, 0));
        first.balance = Decimal::from(1000);
        let second = Account::open(2, 20, AccountType::Savings, limits, at(1, 0, 0, 1));
        engine.import_account(first).unwrap();
        engine.import_account(second).unwrap();

        let reader = StatementReader::new(Arc::clone(engine.store()));
        (engine, reader)
    }

    #[rstest]
    #[case::start_of_initial_day(at(3, 0, 0, 0), true)]
    #[case::last_second_of_final_day(at(5, 23, 59, 59), true)]
    #[case::day_before(at(2, 23, 59, 59), false)]
    #[case::day_after(at(6, 0, 0, 0), false)]
    fn test_date_range_is_inclusive(#[case] instant: DateTime<Utc>, #[case] expected: bool) {
        let range = DateRange::new(Some(day(3)), Some(day(5)));
        assert_eq!(range.contains(instant), expected);
    }

    #[test]
    fn test_open_range_contains_everything() {
        assert!(DateRange::default().contains(at(1, 0, 0, 0)));
    }

    #[test]
    fn test_statement_lists_both_directions_newest_first() {
        let (engine, reader) = setup();
        let owner = Actor::customer(10);

        let deposit = engine
            .admit_at(&TransactionRequest::deposit(1, Decimal::from(5)), &owner, at(3, 9, 0, 0))
            .unwrap();
        let transfer = engine
            .admit_at(
                &TransactionRequest::transfer(1, 2, Decimal::from(100)),
                &owner,
                at(4, 9, 0, 0),
            )
            .unwrap();

        let statement = reader.statement(&owner, 1, DateRange::default()).unwrap();
        assert_eq!(statement.balance, Decimal::from(905));
        let ids: Vec<_> = statement.transactions.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![transfer.id, deposit.id]);

        let incoming = reader
            .statement(&Actor::customer(20), 2, DateRange::default())
            .unwrap();
        assert_eq!(incoming.transactions, vec![transfer]);
    }

    #[test]
    fn test_statement_filters_by_range() {
        let (engine, reader) = setup();
        let owner = Actor::customer(10);
        for d in [2, 3, 4, 5, 6] {
            engine
                .admit_at(&TransactionRequest::deposit(1, Decimal::ONE), &owner, at(d, 12, 0, 0))
                .unwrap();
        }

        let statement = reader
            .statement(&owner, 1, DateRange::new(Some(day(3)), Some(day(5))))
            .unwrap();
        assert_eq!(statement.transactions.len(), 3);
    }

    #[test]
    fn test_statement_access_checks() {
        let (_engine, reader) = setup();

        assert_eq!(
            reader.statement(&Actor::customer(10), 9, DateRange::default()),
            Err(LedgerError::not_found(9))
        );
        assert_eq!(
            reader.statement(&Actor::customer(20), 1, DateRange::default()),
            Err(LedgerError::forbidden(20, 1))
        );
        assert!(reader
            .statement(&Actor::admin(99), 1, DateRange::default())
            .is_ok());
    }

    #[test]
    fn test_transaction_lookup_visibility() {
        let (engine, reader) = setup();
        let record = engine
            .admit(&TransactionRequest::transfer(1, 2, Decimal::ONE), &Actor::customer(10))
            .unwrap();

        assert!(reader.transaction(&Actor::customer(10), record.id).is_ok());
        assert!(reader.transaction(&Actor::customer(20), record.id).is_ok());
        assert_eq!(
            reader.transaction(&Actor::customer(30), record.id),
            Err(LedgerError::forbidden(30, 1))
        );
        let missing = uuid::Uuid::new_v4();
        assert_eq!(
            reader.transaction(&Actor::admin(1), missing),
            Err(LedgerError::TransactionNotFound { id: missing })
        );
    }

    #[test]
    fn test_listings_apply_filters_and_roles() {
        let (engine, reader) = setup();
        let owner = Actor::customer(10);
        engine
            .admit(&TransactionRequest::deposit(1, Decimal::from(50)), &owner)
            .unwrap();
        engine
            .admit(&TransactionRequest::withdrawal(1, Decimal::from(500)), &owner)
            .unwrap();
        engine
            .admit(&TransactionRequest::deposit(2, Decimal::from(700)), &Actor::customer(20))
            .unwrap();

        let large = TransactionFilter {
            min_value: Some(Decimal::from(100)),
            transaction_type: None,
        };
        let mine = reader.transactions_for_owner(&owner, large).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].transaction_type, TransactionType::Withdrawal);

        assert_eq!(
            reader.all_transactions(&owner, TransactionFilter::default()),
            Err(LedgerError::admin_required(10))
        );
        let deposits = TransactionFilter {
            min_value: None,
            transaction_type: Some(TransactionType::Deposit),
        };
        assert_eq!(reader.all_transactions(&Actor::admin(1), deposits).unwrap().len(), 2);
    }

    #[test]
    fn test_account_listings() {
        let (engine, reader) = setup();
        engine.set_active(&Actor::admin(1), 2, false).unwrap();

        let owned = reader
            .accounts_for_owner(&Actor::customer(10), AccountFilter::default())
            .unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].number, 1);

        let all = reader
            .all_accounts(&Actor::admin(1), AccountFilter::default())
            .unwrap();
        let numbers: Vec<_> = all.iter().map(|a| a.number).collect();
        assert_eq!(numbers, vec![2, 1]);

        let inactive = AccountFilter {
            is_active: Some(false),
            account_type: None,
        };
        assert_eq!(reader.all_accounts(&Actor::admin(1), inactive).unwrap().len(), 1);
        assert!(reader
            .all_accounts(&Actor::customer(10), AccountFilter::default())
            .is_err());
    }
}
