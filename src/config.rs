use std::fs;
use std::path::Path;

use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal::dec;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Limits for one direction of money movement within a quota window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuotaLimits {
    /// Cumulative amount allowed per window.
    pub daily_max: Decimal,
    /// Number of transactions allowed per window.
    pub frequency: u32,
    /// Largest single transaction.
    pub transaction_max: Decimal,
}

impl QuotaLimits {
    pub const fn new(daily_max: Decimal, frequency: u32, transaction_max: Decimal) -> Self {
        QuotaLimits {
            daily_max,
            frequency,
            transaction_max,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuotaConfig {
    #[serde(default = "default_withdrawal_limits")]
    pub withdrawal: QuotaLimits,
    #[serde(default = "default_deposit_limits")]
    pub deposit: QuotaLimits,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        QuotaConfig {
            withdrawal: default_withdrawal_limits(),
            deposit: default_deposit_limits(),
        }
    }
}

fn default_withdrawal_limits() -> QuotaLimits {
    QuotaLimits::new(dec!(50000), 3, dec!(20000))
}

fn default_deposit_limits() -> QuotaLimits {
    QuotaLimits::new(dec!(150000), 4, dec!(50000))
}

/// Ledger-wide settings. Every field has a default, so a partial file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: i64,
    #[serde(default = "default_reset_interval_secs")]
    pub reset_interval_secs: i64,
    #[serde(default = "default_bootstrap_accounts")]
    pub bootstrap_accounts: u32,
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

fn default_history_capacity() -> usize {
    10
}

fn default_cooldown_secs() -> i64 {
    15
}

fn default_reset_interval_secs() -> i64 {
    24 * 60 * 60
}

fn default_bootstrap_accounts() -> u32 {
    100_000
}

fn default_sweep_interval_ms() -> u64 {
    1000
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            quota: QuotaConfig::default(),
            history_capacity: default_history_capacity(),
            cooldown_secs: default_cooldown_secs(),
            reset_interval_secs: default_reset_interval_secs(),
            bootstrap_accounts: default_bootstrap_accounts(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

impl LedgerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    #[inline]
    pub fn cooldown(&self) -> Duration {
        Duration::seconds(self.cooldown_secs)
    }

    /// Never shorter than one second.
    #[inline]
    pub fn reset_interval(&self) -> Duration {
        Duration::seconds(self.reset_interval_secs.max(1))
    }

    #[inline]
    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.sweep_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_reference_limits() {
        let config = LedgerConfig::default();

        assert_eq!(config.quota.withdrawal.daily_max, dec!(50000));
        assert_eq!(config.quota.withdrawal.frequency, 3);
        assert_eq!(config.quota.withdrawal.transaction_max, dec!(20000));
        assert_eq!(config.quota.deposit.daily_max, dec!(150000));
        assert_eq!(config.quota.deposit.frequency, 4);
        assert_eq!(config.quota.deposit.transaction_max, dec!(50000));
        assert_eq!(config.history_capacity, 10);
        assert_eq!(config.cooldown(), Duration::seconds(15));
        assert_eq!(config.reset_interval(), Duration::hours(24));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bank.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{ "cooldown_secs": 0, "quota": {{ "withdrawal": {{ "daily_max": 100, "frequency": 1, "transaction_max": 50 }} }} }}"#
        )
        .unwrap();

        let config = LedgerConfig::from_file(&path).unwrap();

        assert_eq!(config.cooldown_secs, 0);
        assert_eq!(config.quota.withdrawal, QuotaLimits::new(dec!(100), 1, dec!(50)));
        assert_eq!(config.quota.deposit, default_deposit_limits());
        assert_eq!(config.history_capacity, 10);
        assert_eq!(config.bootstrap_accounts, 100_000);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = LedgerConfig::from_file(dir.path().join("absent.json"));
        assert!(matches!(result, Err(StoreError::Io(_))));
    }
}
