//! Ledger configuration
//!
//! `LedgerConfig` is built once at startup and passed by reference to the
//! store and engine constructors. Values come from an optional TOML file,
//! overridden by `LEDGER__*` environment variables (for example
//! `LEDGER__LOCK_TIMEOUT_MS=3000`).

use crate::types::{AccountLimits, LedgerError};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Engine and store configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LedgerConfig {
    /// Attempts made by the optimistic engine before reporting `Transient`
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Row lock wait budget for the pessimistic engine, in milliseconds
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Daily withdrawal count given to newly opened accounts
    #[serde(default = "default_daily_withdrawal_limit")]
    pub default_daily_withdrawal_limit: u32,

    /// Special allowance given to newly opened accounts
    #[serde(default = "default_special_withdrawal_limit")]
    pub default_special_withdrawal_limit: Decimal,
}

fn default_max_retries() -> u32 {
    3
}

fn default_lock_timeout_ms() -> u64 {
    2000
}

fn default_daily_withdrawal_limit() -> u32 {
    3
}

fn default_special_withdrawal_limit() -> Decimal {
    Decimal::ZERO
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            lock_timeout_ms: default_lock_timeout_ms(),
            default_daily_withdrawal_limit: default_daily_withdrawal_limit(),
            default_special_withdrawal_limit: default_special_withdrawal_limit(),
        }
    }
}

impl LedgerConfig {
    /// Loads configuration from an optional file and the environment.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Config` if the file cannot be read, a value has
    /// the wrong type, or a value is out of range.
    pub fn load(path: Option<&Path>) -> Result<Self, LedgerError> {
        Self::load_with(
            path,
            config::Environment::with_prefix("LEDGER").separator("__"),
        )
    }

    fn load_with(
        path: Option<&Path>,
        environment: config::Environment,
    ) -> Result<Self, LedgerError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let loaded: Self = builder
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.max_retries == 0 {
            return Err(LedgerError::Config {
                message: "max_retries must be at least 1".to_string(),
            });
        }
        if self.lock_timeout_ms == 0 {
            return Err(LedgerError::Config {
                message: "lock_timeout_ms must be positive".to_string(),
            });
        }
        if self.default_special_withdrawal_limit < Decimal::ZERO {
            return Err(LedgerError::Config {
                message: "default_special_withdrawal_limit must not be negative".to_string(),
            });
        }
        Ok(())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Limits applied to accounts opened through the engine
    pub fn account_limits(&self) -> AccountLimits {
        AccountLimits {
            daily_withdrawal_limit: self.default_daily_withdrawal_limit,
            special_withdrawal_limit: self.default_special_withdrawal_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn no_env() -> config::Environment {
        config::Environment::with_prefix("LEDGER")
            .separator("__")
            .source(Some(config::Map::new()))
    }

    fn toml_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    #[test]
    fn test_defaults_without_sources() {
        let config = LedgerConfig::load_with(None, no_env()).unwrap();
        assert_eq!(config, LedgerConfig::default());
        assert_eq!(config.lock_timeout(), Duration::from_secs(2));
        assert_eq!(config.account_limits().daily_withdrawal_limit, 3);
    }

    #[test]
    fn test_file_values_override_defaults() {
        let file = toml_file("max_retries = 5\nlock_timeout_ms = 1500\n");

        let config = LedgerConfig::load_with(Some(file.path()), no_env()).unwrap();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.lock_timeout_ms, 1500);
        assert_eq!(config.default_daily_withdrawal_limit, 3);
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = toml_file("default_daily_withdrawal_limit = 5\n");
        let mut vars = config::Map::new();
        vars.insert(
            "LEDGER__DEFAULT_DAILY_WITHDRAWAL_LIMIT".to_string(),
            "7".to_string(),
        );
        let environment = config::Environment::with_prefix("LEDGER")
            .separator("__")
            .source(Some(vars));

        let config = LedgerConfig::load_with(Some(file.path()), environment).unwrap();
        assert_eq!(config.default_daily_withdrawal_limit, 7);
    }

    #[test]
    fn test_zero_retries_rejected() {
        let file = toml_file("max_retries = 0\n");

        let result = LedgerConfig::load_with(Some(file.path()), no_env());
        assert!(matches!(result, Err(LedgerError::Config { .. })));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result =
            LedgerConfig::load_with(Some(Path::new("does/not/exist.toml")), no_env());
        assert!(matches!(result, Err(LedgerError::Config { .. })));
    }
}
