use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::account::AccountId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Amount must be positive, got {0}")]
    InvalidAmount(Decimal),
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),
    #[error("Account already exists: {0}")]
    AccountAlreadyExists(AccountId),
    #[error("Amount for transaction is missing")]
    MissingAmount,
    #[error("Amount would overflow the account balance")]
    AmountOverflow,
    #[error("Insufficient funds for transaction")]
    InsufficientFunds,
    #[error("Amount exceeds the per-transaction limit of {limit}")]
    TransactionLimitExceeded { limit: Decimal },
    #[error("Amount exceeds the daily limit of {limit}")]
    DailyLimitExceeded { limit: Decimal },
    #[error("Transaction count limit of {limit} reached for this window")]
    FrequencyLimitExceeded { limit: u32 },
    #[error("Cooldown in effect, retry after {retry_after}")]
    CooldownActive { retry_after: DateTime<Utc> },
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed state file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Rejected state: {0}")]
    Ledger(#[from] LedgerError),
}
