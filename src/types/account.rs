//! Account-related types for the Ledger Engine
//!
//! This module defines the Account row and the identifiers used to address it.
//! An account is mutated only through pure `(Account) -> Account` transitions
//! applied under a row lock or a version check.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Durable account number
///
/// Assigned once at creation and never reused.
pub type AccountNumber = u32;

/// Identifier of the user owning an account
pub type OwnerId = u32;

/// Kind of account, fixed at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Savings,
    Checking,
    Business,
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AccountType::Savings => "savings",
            AccountType::Checking => "checking",
            AccountType::Business => "business",
        };
        f.write_str(name)
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "savings" => Ok(AccountType::Savings),
            "checking" => Ok(AccountType::Checking),
            "business" => Ok(AccountType::Business),
            other => Err(format!("Invalid account type: '{}'", other)),
        }
    }
}

/// Account state
///
/// Holds the balance together with the two limits that govern withdrawals:
/// a daily cap on the number of withdrawals and a special (overdraft)
/// allowance measured in money.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Account number (primary key)
    pub number: AccountNumber,

    /// Owning user
    pub owner: OwnerId,

    /// Savings, checking or business
    pub account_type: AccountType,

    /// Current balance, never negative
    pub balance: Decimal,

    /// Maximum number of successful withdrawals per UTC calendar day
    pub daily_withdrawal_limit: u32,

    /// Maximum cumulative overdraft amount
    pub special_withdrawal_limit: Decimal,

    /// Overdraft drawn so far
    ///
    /// Always within `0..=special_withdrawal_limit`. Deposits do not pay it back.
    pub used_special_withdrawal: Decimal,

    /// Inactive accounts reject every new transaction
    pub is_active: bool,

    /// Creation instant (UTC)
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Open a fresh account with zero balance and no overdraft used
    ///
    /// # Arguments
    ///
    /// * `number` - Account number assigned by the store
    /// * `owner` - Owning user
    /// * `account_type` - Kind of account
    /// * `limits` - Daily count limit and special allowance for the new account
    /// * `created_at` - Creation instant
    pub fn open(
        number: AccountNumber,
        owner: OwnerId,
        account_type: AccountType,
        limits: AccountLimits,
        created_at: DateTime<Utc>,
    ) -> Self {
        Account {
            number,
            owner,
            account_type,
            balance: Decimal::ZERO,
            daily_withdrawal_limit: limits.daily_withdrawal_limit,
            special_withdrawal_limit: limits.special_withdrawal_limit,
            used_special_withdrawal: Decimal::ZERO,
            is_active: true,
            created_at,
        }
    }

    /// Overdraft still available: `special_withdrawal_limit - used_special_withdrawal`
    pub fn remaining_special(&self) -> Decimal {
        self.special_withdrawal_limit - self.used_special_withdrawal
    }

    /// Funds a withdrawal may draw on: balance plus remaining overdraft
    ///
    /// `None` when the sum overflows `Decimal`, which no withdrawal can exceed.
    pub fn available(&self) -> Option<Decimal> {
        self.balance.checked_add(self.remaining_special())
    }

    /// Whether the row satisfies the non-negativity invariants
    ///
    /// `balance >= 0` and `0 <= used_special_withdrawal <= special_withdrawal_limit`.
    pub fn is_consistent(&self) -> bool {
        self.balance >= Decimal::ZERO
            && self.used_special_withdrawal >= Decimal::ZERO
            && self.used_special_withdrawal <= self.special_withdrawal_limit
    }
}

/// Withdrawal limits applied to a newly opened account
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountLimits {
    pub daily_withdrawal_limit: u32,
    pub special_withdrawal_limit: Decimal,
}
