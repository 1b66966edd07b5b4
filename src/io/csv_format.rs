//! CSV format handling for replay input and report output
//!
//! This module centralizes all CSV format concerns:
//! - `CsvRequest`: one transaction request per row
//!   (`type,actor,admin,origin,destination,amount,timestamp`)
//! - `CsvAccount`: one account snapshot row
//!   (`account,owner,type,balance,daily_withdrawal_limit,special_withdrawal_limit,used_special_withdrawal,active`)
//! - Account table and statement output
//!
//! All functions are pure (no file I/O) for easy testing.

use crate::core::Statement;
use crate::types::{
    Account, AccountNumber, AccountType, Actor, LedgerError, OwnerId, TransactionRecord,
    TransactionRequest, TransactionType,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// A CSV row type that converts into a domain value
pub trait CsvRow: DeserializeOwned {
    type Output;

    fn convert(self) -> Result<Self::Output, LedgerError>;
}

/// Request row
///
/// `admin`, `destination` and `timestamp` may be left empty. A missing
/// timestamp admits the request at replay time.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CsvRequest {
    #[serde(rename = "type")]
    pub tx_type: String,
    pub actor: OwnerId,
    #[serde(default)]
    pub admin: Option<bool>,
    pub origin: AccountNumber,
    #[serde(default)]
    pub destination: Option<AccountNumber>,
    pub amount: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Account snapshot row
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CsvAccount {
    pub account: AccountNumber,
    pub owner: OwnerId,
    #[serde(rename = "type")]
    pub account_type: String,
    pub balance: String,
    pub daily_withdrawal_limit: u32,
    #[serde(default)]
    pub special_withdrawal_limit: Option<String>,
    #[serde(default)]
    pub used_special_withdrawal: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, LedgerError> {
    Decimal::from_str(value.trim())
        .map_err(|_| LedgerError::invalid_record(format!("Invalid {} '{}'", field, value)))
}

fn parse_optional_decimal(field: &str, value: Option<&str>) -> Result<Decimal, LedgerError> {
    match value {
        Some(v) if !v.trim().is_empty() => parse_decimal(field, v),
        _ => Ok(Decimal::ZERO),
    }
}

fn parse_transaction_type(value: &str) -> Result<TransactionType, LedgerError> {
    match value.trim().to_lowercase().as_str() {
        "deposit" => Ok(TransactionType::Deposit),
        "withdrawal" => Ok(TransactionType::Withdrawal),
        "transfer" => Ok(TransactionType::Transfer),
        _ => Err(LedgerError::invalid_record(format!(
            "Invalid transaction type: '{}'",
            value
        ))),
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, LedgerError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| LedgerError::invalid_record(format!("Invalid timestamp '{}'", value)))
}

impl CsvRow for CsvRequest {
    type Output = TransactionRecord;

    /// Convert a request row into a replay record
    ///
    /// Non-positive amounts and transfers without a destination are passed
    /// through; the engine rejects them with the proper reason.
    fn convert(self) -> Result<TransactionRecord, LedgerError> {
        let transaction_type = parse_transaction_type(&self.tx_type)?;
        let value = parse_decimal("amount", &self.amount)?;

        let timestamp = match self.timestamp.as_deref() {
            Some(ts) if !ts.trim().is_empty() => Some(parse_timestamp(ts)?),
            _ => None,
        };

        let actor = if self.admin.unwrap_or(false) {
            Actor::admin(self.actor)
        } else {
            Actor::customer(self.actor)
        };

        let destination = match transaction_type {
            TransactionType::Transfer => self.destination,
            TransactionType::Deposit | TransactionType::Withdrawal => None,
        };

        Ok(TransactionRecord {
            actor,
            request: TransactionRequest {
                transaction_type,
                value,
                origin: self.origin,
                destination,
            },
            timestamp,
        })
    }
}

impl CsvRow for CsvAccount {
    type Output = Account;

    fn convert(self) -> Result<Account, LedgerError> {
        let account_type = AccountType::from_str(&self.account_type)
            .map_err(LedgerError::invalid_record)?;

        Ok(Account {
            number: self.account,
            owner: self.owner,
            account_type,
            balance: parse_decimal("balance", &self.balance)?,
            daily_withdrawal_limit: self.daily_withdrawal_limit,
            special_withdrawal_limit: parse_optional_decimal(
                "special_withdrawal_limit",
                self.special_withdrawal_limit.as_deref(),
            )?,
            used_special_withdrawal: parse_optional_decimal(
                "used_special_withdrawal",
                self.used_special_withdrawal.as_deref(),
            )?,
            is_active: self.active.unwrap_or(true),
            created_at: Utc::now(),
        })
    }
}

/// Write the account table
///
/// Columns: account, owner, type, balance, used_special_withdrawal,
/// special_withdrawal_limit, daily_withdrawal_limit, active. Rows are sorted
/// by account number and money is printed with two decimals.
pub fn write_accounts_csv(accounts: &[Account], output: &mut dyn Write) -> Result<(), LedgerError> {
    let mut writer = csv::Writer::from_writer(output);

    writer.write_record([
        "account",
        "owner",
        "type",
        "balance",
        "used_special_withdrawal",
        "special_withdrawal_limit",
        "daily_withdrawal_limit",
        "active",
    ])?;

    let mut sorted_accounts = accounts.to_vec();
    sorted_accounts.sort_by_key(|account| account.number);

    for account in sorted_accounts {
        writer.write_record(&[
            account.number.to_string(),
            account.owner.to_string(),
            account.account_type.to_string(),
            format!("{:.2}", account.balance),
            format!("{:.2}", account.used_special_withdrawal),
            format!("{:.2}", account.special_withdrawal_limit),
            account.daily_withdrawal_limit.to_string(),
            account.is_active.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Write a statement: a one-row summary, a blank line, then the transactions
///
/// Transaction columns: id, type, origin, destination, value, created_at
/// (RFC 3339, UTC), newest first.
pub fn write_statement_csv(
    statement: &Statement,
    output: &mut dyn Write,
) -> Result<(), LedgerError> {
    {
        let mut summary = csv::Writer::from_writer(&mut *output);
        summary.write_record([
            "account",
            "balance",
            "used_special_withdrawal",
            "special_withdrawal_limit",
        ])?;
        summary.write_record(&[
            statement.account.to_string(),
            format!("{:.2}", statement.balance),
            format!("{:.2}", statement.used_special_withdrawal),
            format!("{:.2}", statement.special_withdrawal_limit),
        ])?;
        summary.flush()?;
    }

    output.write_all(b"\n")?;

    let mut writer = csv::Writer::from_writer(output);
    writer.write_record(["id", "type", "origin", "destination", "value", "created_at"])?;
    for tx in &statement.transactions {
        writer.write_record(&[
            tx.id.to_string(),
            tx.transaction_type.to_string(),
            tx.origin.to_string(),
            tx.destination.map(|d| d.to_string()).unwrap_or_default(),
            format!("{:.2}", tx.value),
            tx.created_at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        ])?;
    }
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountLimits, Role, Transaction};
    use chrono::TimeZone;
    use rstest::rstest;

    fn request_row(tx_type: &str, amount: &str) -> CsvRequest {
        CsvRequest {
            tx_type: tx_type.to_string(),
            actor: 7,
            admin: None,
            origin: 1,
            destination: Some(2),
            amount: amount.to_string(),
            timestamp: None,
        }
    }

    #[rstest]
    #[case("deposit", TransactionType::Deposit, None)]
    #[case("withdrawal", TransactionType::Withdrawal, None)]
    #[case("TRANSFER", TransactionType::Transfer, Some(2))]
    fn test_convert_request_types(
        #[case] tx_type: &str,
        #[case] expected: TransactionType,
        #[case] destination: Option<AccountNumber>,
    ) {
        let record = request_row(tx_type, "10.50").convert().unwrap();

        assert_eq!(record.request.transaction_type, expected);
        assert_eq!(record.request.destination, destination);
        assert_eq!(record.request.value, Decimal::new(1050, 2));
        assert_eq!(record.actor, Actor::customer(7));
        assert!(record.timestamp.is_none());
    }

    #[test]
    fn test_convert_request_admin_and_timestamp() {
        let mut row = request_row("withdrawal", "1");
        row.admin = Some(true);
        row.timestamp = Some("2024-01-15T10:30:00Z".to_string());

        let record = row.convert().unwrap();

        assert_eq!(record.actor.role, Role::Admin);
        assert_eq!(
            record.timestamp,
            Some(Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap())
        );
    }

    #[rstest]
    #[case::bad_type(request_row("dispute", "1"), "Invalid transaction type")]
    #[case::bad_amount(request_row("deposit", "abc"), "Invalid amount")]
    #[case::bad_timestamp(
        CsvRequest { timestamp: Some("yesterday".to_string()), ..request_row("deposit", "1") },
        "Invalid timestamp"
    )]
    fn test_convert_request_errors(#[case] row: CsvRequest, #[case] expected: &str) {
        let error = row.convert().unwrap_err();
        assert!(error.to_string().contains(expected), "got: {}", error);
    }

    #[test]
    fn test_convert_account_defaults() {
        let row = CsvAccount {
            account: 3,
            owner: 9,
            account_type: "savings".to_string(),
            balance: "100.00".to_string(),
            daily_withdrawal_limit: 2,
            special_withdrawal_limit: None,
            used_special_withdrawal: Some(String::new()),
            active: None,
        };

        let account = row.convert().unwrap();

        assert_eq!(account.number, 3);
        assert_eq!(account.account_type, AccountType::Savings);
        assert_eq!(account.balance, Decimal::new(10000, 2));
        assert_eq!(account.special_withdrawal_limit, Decimal::ZERO);
        assert!(account.is_active);
    }

    #[test]
    fn test_write_accounts_csv_sorted_two_decimals() {
        let limits = AccountLimits {
            daily_withdrawal_limit: 3,
            special_withdrawal_limit: Decimal::from(500),
        };
        let mut second = Account::open(2, 20, AccountType::Business, limits, Utc::now());
        second.balance = Decimal::new(12345, 2);
        let first = Account::open(1, 10, AccountType::Savings, limits, Utc::now());

        let mut output = Vec::new();
        write_accounts_csv(&[second, first], &mut output).unwrap();

        let text = String::from_utf8(output).unwrap();
        assert_eq!(
            text,
            "account,owner,type,balance,used_special_withdrawal,special_withdrawal_limit,daily_withdrawal_limit,active\n\
             1,10,savings,0.00,0.00,500.00,3,true\n\
             2,20,business,123.45,0.00,500.00,3,true\n"
        );
    }

    #[test]
    fn test_write_statement_csv() {
        let at = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        let tx = Transaction::admitted(&TransactionRequest::transfer(1, 2, Decimal::TEN), at);
        let statement = Statement {
            account: 1,
            balance: Decimal::from(90),
            used_special_withdrawal: Decimal::ZERO,
            special_withdrawal_limit: Decimal::ZERO,
            transactions: vec![tx.clone()],
        };

        let mut output = Vec::new();
        write_statement_csv(&statement, &mut output).unwrap();

        let text = String::from_utf8(output).unwrap();
        let expected = format!(
            "account,balance,used_special_withdrawal,special_withdrawal_limit\n\
             1,90.00,0.00,0.00\n\
             \n\
             id,type,origin,destination,value,created_at\n\
             {},transfer,1,2,10.00,2024-01-15T10:30:00Z\n",
            tx.id
        );
        assert_eq!(text, expected);
    }
}
