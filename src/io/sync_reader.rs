//! Synchronous CSV reader with iterator interface
//!
//! Provides a streaming iterator over rows of a CSV file, converted into
//! domain values through the `CsvRow` implementations in `csv_format`.
//!
//! # Iterator Interface
//!
//! `SyncReader<T>` yields `Result<T::Output, LedgerError>` for each row:
//!
//! ```no_run
//! use ledger_engine::io::csv_format::CsvRequest;
//! use ledger_engine::io::sync_reader::SyncReader;
//! use std::path::Path;
//!
//! let reader = SyncReader::<CsvRequest>::new(Path::new("requests.csv")).unwrap();
//! for result in reader {
//!     match result {
//!         Ok(record) => println!("Replaying: {:?}", record),
//!         Err(e) => eprintln!("Error: {}", e),
//!     }
//! }
//! ```
//!
//! # Error Handling
//!
//! - Fatal errors (file not found, I/O errors) are returned from `new()`
//! - Row errors are yielded as `ParseError` items carrying the line number
//! - Memory usage is constant per row; the file is never loaded whole

use crate::io::csv_format::CsvRow;
use crate::types::LedgerError;
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::marker::PhantomData;
use std::path::Path;

/// Synchronous CSV reader over rows of type `T`
#[derive(Debug)]
pub struct SyncReader<T> {
    reader: csv::Reader<File>,
    line_num: u64,
    _row: PhantomData<fn() -> T>,
}

impl<T: CsvRow> SyncReader<T> {
    /// Create a new SyncReader from a file path
    ///
    /// The CSV reader is configured to:
    /// - Trim whitespace from all fields
    /// - Allow flexible field counts (trailing optional columns may be left out)
    /// - Use an 8KB buffer
    ///
    /// # Returns
    ///
    /// * `Ok(SyncReader)` if the file opened
    /// * `Err(LedgerError::FileNotFound)` if it does not exist
    /// * `Err(LedgerError::IoError)` for any other open failure
    pub fn new(path: &Path) -> Result<Self, LedgerError> {
        let file = File::open(path).map_err(|e| LedgerError::open_failed(path, e))?;

        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(file);

        Ok(Self {
            reader,
            line_num: 0,
            _row: PhantomData,
        })
    }
}

impl<T: CsvRow> Iterator for SyncReader<T> {
    type Item = Result<T::Output, LedgerError>;

    /// Read, deserialize and convert the next row
    ///
    /// Line numbers count the header as line 1.
    fn next(&mut self) -> Option<Self::Item> {
        let mut deserializer = self.reader.deserialize::<T>();
        let row = deserializer.next()?;
        self.line_num += 1;
        let line = self.line_num + 1;

        Some(match row {
            Ok(row) => row.convert().map_err(|e| LedgerError::ParseError {
                line: Some(line),
                message: e.to_string(),
            }),
            Err(e) => Err(LedgerError::ParseError {
                line: Some(line),
                message: e.to_string(),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::csv_format::{CsvAccount, CsvRequest};
    use crate::types::{AccountType, TransactionType};
    use rust_decimal::Decimal;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const REQUEST_HEADER: &str = "type,actor,admin,origin,destination,amount,timestamp\n";

    /// Helper function to create a temporary CSV file for testing
    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    fn read_requests(body: &str) -> Vec<Result<crate::types::TransactionRecord, LedgerError>> {
        let file = create_temp_csv(&format!("{}{}", REQUEST_HEADER, body));
        SyncReader::<CsvRequest>::new(file.path()).unwrap().collect()
    }

    #[test]
    fn test_sync_reader_missing_file() {
        let result = SyncReader::<CsvRequest>::new(Path::new("nonexistent.csv"));
        assert!(matches!(result, Err(LedgerError::FileNotFound { .. })));
    }

    #[test]
    fn test_sync_reader_reads_requests_with_optional_columns() {
        let records = read_requests(
            "deposit,1,,10,,100.0,\n\
             transfer,1,false,10,20,25,2024-03-01T12:00:00Z\n\
             withdrawal,9,true,10,,5\n",
        );

        assert_eq!(records.len(), 3);
        let records: Vec<_> = records.into_iter().map(Result::unwrap).collect();
        assert_eq!(records[0].request.transaction_type, TransactionType::Deposit);
        assert_eq!(records[0].request.value, Decimal::new(1000, 1));
        assert_eq!(records[1].request.destination, Some(20));
        assert!(records[1].timestamp.is_some());
        assert!(records[2].actor.is_admin());
        assert!(records[2].timestamp.is_none());
    }

    #[test]
    fn test_sync_reader_includes_line_numbers_in_errors() {
        let records = read_requests(
            "deposit,1,,10,,100.0,\n\
             deposit,1,,10,,invalid,\n\
             deposit,1,,10,,50.0,\n",
        );

        assert_eq!(records.len(), 3);
        assert!(records[0].is_ok());
        assert!(records[2].is_ok());
        match &records[1] {
            Err(LedgerError::ParseError { line, message }) => {
                assert_eq!(*line, Some(3));
                assert!(message.contains("Invalid amount"));
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_sync_reader_continues_after_malformed_row() {
        let records = read_requests(
            "deposit,1,,10,,1,\n\
             deposit,not-a-number,,10,,1,\n\
             chargeback,1,,10,,1,\n\
             withdrawal,1,,10,,1,\n",
        );

        let valid: Vec<_> = records.into_iter().filter_map(Result::ok).collect();
        assert_eq!(valid.len(), 2);
        assert_eq!(valid[1].request.transaction_type, TransactionType::Withdrawal);
    }

    #[test]
    fn test_sync_reader_handles_whitespace_and_empty_body() {
        let records = read_requests("  deposit  ,  1  ,  ,  10  ,  ,  100.0  ,  \n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].as_ref().unwrap().request.origin, 10);

        assert!(read_requests("").is_empty());
    }

    #[test]
    fn test_sync_reader_reads_accounts() {
        let file = create_temp_csv(
            "account,owner,type,balance,daily_withdrawal_limit,special_withdrawal_limit,used_special_withdrawal,active\n\
             1,10,checking,100.00,3,500,20,true\n\
             2,11,savings,0,1\n",
        );

        let accounts = SyncReader::<CsvAccount>::new(file.path())
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].used_special_withdrawal, Decimal::from(20));
        assert_eq!(accounts[1].account_type, AccountType::Savings);
        assert_eq!(accounts[1].special_withdrawal_limit, Decimal::ZERO);
        assert!(accounts[1].is_active);
    }
}
