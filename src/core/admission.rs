//! Admission rules
//!
//! Pure functions deciding whether a request may be admitted and computing
//! the rows it produces. Both engines call these while holding a consistent
//! view of the touched rows (a version snapshot or row locks), so the
//! business rules live in one place.
//!
//! Every transition is `(Account) -> Account`: the input row is never
//! modified, and a rejected request produces no new row.

use crate::types::{
    Account, AccountNumber, Actor, LedgerError, RejectReason, TransactionRequest,
    TransactionType,
};
use chrono::{DateTime, NaiveTime, TimeDelta, Utc};
use rust_decimal::Decimal;

/// One UTC calendar day: `[midnight, midnight + 24h)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DailyWindow {
    /// The UTC day containing `instant`
    pub fn containing(instant: DateTime<Utc>) -> Self {
        let start = instant.date_naive().and_time(NaiveTime::MIN).and_utc();
        Self {
            start,
            end: start + TimeDelta::days(1),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

/// Rows produced by an admitted request
#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    pub origin: Account,
    pub destination: Option<Account>,
}

impl Effect {
    pub fn into_rows(self) -> Vec<Account> {
        let mut rows = vec![self.origin];
        rows.extend(self.destination);
        rows
    }
}

/// Reject zero and negative values before any row is read
pub fn validate_value(request: &TransactionRequest) -> Result<(), LedgerError> {
    if request.value <= Decimal::ZERO {
        return Err(LedgerError::rejected(
            request.origin,
            RejectReason::NonPositiveValue,
        ));
    }
    Ok(())
}

/// Checks that only need the origin row, in outcome order
///
/// Forbidden, then inactive, then for transfers the destination checks.
///
/// # Returns
///
/// The destination account number for transfers, `None` otherwise.
pub fn check_origin(
    request: &TransactionRequest,
    actor: &Actor,
    origin: &Account,
) -> Result<Option<AccountNumber>, LedgerError> {
    if !actor.can_access(origin) {
        return Err(LedgerError::forbidden(actor.id, origin.number));
    }
    if !origin.is_active {
        return Err(LedgerError::rejected(
            origin.number,
            RejectReason::AccountInactive,
        ));
    }

    match request.transaction_type {
        TransactionType::Transfer => {
            let destination = request.destination.ok_or_else(|| {
                LedgerError::rejected(origin.number, RejectReason::DestinationRequired)
            })?;
            if destination == origin.number {
                return Err(LedgerError::rejected(
                    origin.number,
                    RejectReason::SameAccount,
                ));
            }
            Ok(Some(destination))
        }
        TransactionType::Deposit | TransactionType::Withdrawal => Ok(None),
    }
}

/// Withdrawal-side transition
///
/// Rejects when `withdrawals_today` already reached the daily limit, or when
/// `value` exceeds balance plus remaining special allowance. Otherwise drains
/// the balance first and draws any shortfall from the special allowance.
pub fn debit(
    account: &Account,
    value: Decimal,
    withdrawals_today: usize,
) -> Result<Account, LedgerError> {
    if withdrawals_today >= account.daily_withdrawal_limit as usize {
        return Err(LedgerError::rejected(
            account.number,
            RejectReason::DailyLimitExceeded,
        ));
    }

    let sufficient = match account.available() {
        Some(available) => value <= available,
        None => true,
    };
    if !sufficient {
        return Err(LedgerError::rejected(
            account.number,
            RejectReason::InsufficientFunds,
        ));
    }

    let mut next = account.clone();
    if value <= account.balance {
        next.balance = account.balance - value;
    } else {
        next.used_special_withdrawal += value - account.balance;
        next.balance = Decimal::ZERO;
    }
    Ok(next)
}

/// Deposit-side transition; overdraft usage is left untouched
pub fn credit(account: &Account, value: Decimal) -> Result<Account, LedgerError> {
    let balance = account
        .balance
        .checked_add(value)
        .ok_or_else(|| LedgerError::rejected(account.number, RejectReason::BalanceOverflow))?;

    let mut next = account.clone();
    next.balance = balance;
    Ok(next)
}

/// Administrator change to an account's withdrawal limits
///
/// `None` fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LimitsUpdate {
    pub daily_withdrawal_limit: Option<u32>,
    pub special_withdrawal_limit: Option<Decimal>,
}

pub fn require_admin(actor: &Actor) -> Result<(), LedgerError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(LedgerError::admin_required(actor.id))
    }
}

/// Limits transition; keeps `used_special_withdrawal <= special_withdrawal_limit`
pub fn apply_limits(account: &Account, update: LimitsUpdate) -> Result<Account, LedgerError> {
    let mut next = account.clone();

    if let Some(daily) = update.daily_withdrawal_limit {
        next.daily_withdrawal_limit = daily;
    }
    if let Some(special) = update.special_withdrawal_limit {
        if special < Decimal::ZERO {
            return Err(LedgerError::rejected(
                account.number,
                RejectReason::InvalidAccountState,
            ));
        }
        if special < account.used_special_withdrawal {
            return Err(LedgerError::rejected(
                account.number,
                RejectReason::LimitBelowUsed,
            ));
        }
        next.special_withdrawal_limit = special;
    }

    Ok(next)
}

/// Activation transition
pub fn apply_active(account: &Account, active: bool) -> Account {
    let mut next = account.clone();
    next.is_active = active;
    next
}

/// Evaluate a request against the rows it touches
///
/// `destination` must be the destination row for transfers. Preconditions
/// from `check_origin` are assumed to hold.
pub fn evaluate(
    request: &TransactionRequest,
    origin: &Account,
    destination: Option<&Account>,
    withdrawals_today: usize,
) -> Result<Effect, LedgerError> {
    match request.transaction_type {
        TransactionType::Deposit => Ok(Effect {
            origin: credit(origin, request.value)?,
            destination: None,
        }),
        TransactionType::Withdrawal => Ok(Effect {
            origin: debit(origin, request.value, withdrawals_today)?,
            destination: None,
        }),
        TransactionType::Transfer => {
            let destination = destination.ok_or_else(|| {
                LedgerError::rejected(origin.number, RejectReason::DestinationRequired)
            })?;
            Ok(Effect {
                origin: debit(origin, request.value, withdrawals_today)?,
                destination: Some(credit(destination, request.value)?),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountLimits, AccountType};
    use chrono::TimeZone;
    use rstest::rstest;

    fn account(number: AccountNumber, balance: i64, special: i64, used: i64, daily: u32) -> Account {
        let limits = AccountLimits {
            daily_withdrawal_limit: daily,
            special_withdrawal_limit: Decimal::from(special),
        };
        let mut account = Account::open(number, 1, AccountType::Checking, limits, Utc::now());
        account.balance = Decimal::from(balance);
        account.used_special_withdrawal = Decimal::from(used);
        account
    }

    #[test]
    fn test_daily_window_bounds() {
        let noon = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let window = DailyWindow::containing(noon);

        assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap());
        assert_eq!(window.end, Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap());
        assert!(window.contains(window.start));
        assert!(!window.contains(window.end));
    }

    #[rstest]
    #[case::zero(Decimal::ZERO)]
    #[case::negative(Decimal::NEGATIVE_ONE)]
    fn test_validate_value_rejects_non_positive(#[case] value: Decimal) {
        let request = TransactionRequest::deposit(4, value);
        assert_eq!(
            validate_value(&request),
            Err(LedgerError::rejected(4, RejectReason::NonPositiveValue))
        );
    }

    #[test]
    fn test_check_origin_order_forbidden_before_inactive() {
        let mut origin = account(1, 0, 0, 0, 3);
        origin.is_active = false;
        let request = TransactionRequest::deposit(1, Decimal::ONE);

        assert_eq!(
            check_origin(&request, &Actor::customer(2), &origin),
            Err(LedgerError::forbidden(2, 1))
        );
        assert_eq!(
            check_origin(&request, &Actor::customer(1), &origin),
            Err(LedgerError::rejected(1, RejectReason::AccountInactive))
        );
    }

    #[test]
    fn test_check_origin_inactive_before_destination_required() {
        let mut origin = account(1, 0, 0, 0, 3);
        origin.is_active = false;
        let mut request = TransactionRequest::transfer(1, 2, Decimal::ONE);
        request.destination = None;

        assert_eq!(
            check_origin(&request, &Actor::admin(9), &origin),
            Err(LedgerError::rejected(1, RejectReason::AccountInactive))
        );

        origin.is_active = true;
        assert_eq!(
            check_origin(&request, &Actor::admin(9), &origin),
            Err(LedgerError::rejected(1, RejectReason::DestinationRequired))
        );
    }

    #[test]
    fn test_check_origin_rejects_same_account_transfer() {
        let origin = account(1, 100, 0, 0, 3);
        let request = TransactionRequest::transfer(1, 1, Decimal::ONE);

        assert_eq!(
            check_origin(&request, &Actor::customer(1), &origin),
            Err(LedgerError::rejected(1, RejectReason::SameAccount))
        );
    }

    // (balance, special, used, value) -> (balance, used)
    #[rstest]
    #[case::from_balance(100, 0, 0, 40, 60, 0)]
    #[case::exact_balance(100, 0, 0, 100, 0, 0)]
    #[case::into_special(0, 500, 0, 300, 0, 300)]
    #[case::split_balance_and_special(100, 500, 0, 250, 0, 150)]
    #[case::exhausts_special(50, 100, 40, 110, 0, 100)]
    fn test_debit_effect(
        #[case] balance: i64,
        #[case] special: i64,
        #[case] used: i64,
        #[case] value: i64,
        #[case] expected_balance: i64,
        #[case] expected_used: i64,
    ) {
        let before = account(1, balance, special, used, 3);
        let after = debit(&before, Decimal::from(value), 0).unwrap();

        assert_eq!(after.balance, Decimal::from(expected_balance));
        assert_eq!(after.used_special_withdrawal, Decimal::from(expected_used));
        assert!(after.is_consistent());
    }

    #[rstest]
    #[case::no_special(100, 0, 0, 150)]
    #[case::special_used_up(0, 500, 500, 1)]
    #[case::one_cent_over(100, 50, 20, 131)]
    fn test_debit_insufficient_funds(
        #[case] balance: i64,
        #[case] special: i64,
        #[case] used: i64,
        #[case] value: i64,
    ) {
        let before = account(1, balance, special, used, 3);
        assert_eq!(
            debit(&before, Decimal::from(value), 0),
            Err(LedgerError::rejected(1, RejectReason::InsufficientFunds))
        );
    }

    #[test]
    fn test_debit_daily_limit_checked_before_funds() {
        let before = account(1, 0, 0, 0, 1);
        assert_eq!(
            debit(&before, Decimal::from(1_000), 1),
            Err(LedgerError::rejected(1, RejectReason::DailyLimitExceeded))
        );
    }

    #[test]
    fn test_debit_zero_daily_limit_blocks_everything() {
        let before = account(1, 100, 0, 0, 0);
        assert_eq!(
            debit(&before, Decimal::ONE, 0),
            Err(LedgerError::rejected(1, RejectReason::DailyLimitExceeded))
        );
    }

    #[test]
    fn test_credit_does_not_repay_special() {
        let before = account(1, 0, 500, 300, 3);
        let after = credit(&before, Decimal::from(200)).unwrap();

        assert_eq!(after.balance, Decimal::from(200));
        assert_eq!(after.used_special_withdrawal, Decimal::from(300));
    }

    #[test]
    fn test_credit_overflow_rejected() {
        let mut before = account(1, 0, 0, 0, 3);
        before.balance = Decimal::MAX;
        assert_eq!(
            credit(&before, Decimal::ONE),
            Err(LedgerError::rejected(1, RejectReason::BalanceOverflow))
        );
    }

    #[test]
    fn test_evaluate_transfer_moves_value() {
        let origin = account(1, 1000, 0, 0, 3);
        let destination = account(2, 0, 0, 0, 3);
        let request = TransactionRequest::transfer(1, 2, Decimal::from(500));

        let effect = evaluate(&request, &origin, Some(&destination), 0).unwrap();
        let rows = effect.into_rows();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].balance, Decimal::from(500));
        assert_eq!(rows[1].balance, Decimal::from(500));
    }

    #[test]
    fn test_evaluate_transfer_rejected_on_origin_leaves_destination() {
        let origin = account(1, 100, 0, 0, 3);
        let destination = account(2, 0, 0, 0, 3);
        let request = TransactionRequest::transfer(1, 2, Decimal::from(500));

        assert_eq!(
            evaluate(&request, &origin, Some(&destination), 0),
            Err(LedgerError::rejected(1, RejectReason::InsufficientFunds))
        );
    }

    #[test]
    fn test_apply_limits_updates_only_given_fields() {
        let before = account(1, 0, 100, 0, 3);
        let update = LimitsUpdate {
            daily_withdrawal_limit: Some(5),
            special_withdrawal_limit: None,
        };

        let after = apply_limits(&before, update).unwrap();
        assert_eq!(after.daily_withdrawal_limit, 5);
        assert_eq!(after.special_withdrawal_limit, Decimal::from(100));
    }

    #[rstest]
    #[case::below_used(50, RejectReason::LimitBelowUsed)]
    #[case::negative(-1, RejectReason::InvalidAccountState)]
    fn test_apply_limits_rejects_special(#[case] special: i64, #[case] reason: RejectReason) {
        let before = account(1, 0, 100, 80, 3);
        let update = LimitsUpdate {
            daily_withdrawal_limit: None,
            special_withdrawal_limit: Some(Decimal::from(special)),
        };

        assert_eq!(
            apply_limits(&before, update),
            Err(LedgerError::rejected(1, reason))
        );
    }

    #[test]
    fn test_require_admin() {
        assert!(require_admin(&Actor::admin(1)).is_ok());
        assert_eq!(
            require_admin(&Actor::customer(4)),
            Err(LedgerError::admin_required(4))
        );
    }

    #[test]
    fn test_evaluate_does_not_mutate_input() {
        let origin = account(1, 100, 0, 0, 3);
        let snapshot = origin.clone();
        let request = TransactionRequest::withdrawal(1, Decimal::from(30));

        let _ = evaluate(&request, &origin, None, 0).unwrap();
        assert_eq!(origin, snapshot);
    }
}
