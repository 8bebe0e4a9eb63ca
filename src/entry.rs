use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::account::AccountId;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OperationEntry {
    #[serde(rename = "type")]
    pub entry_type: OperationEntryType,
    pub account: AccountId,
    pub amount: Option<Decimal>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationEntryType {
    Open,
    Deposit,
    Withdraw,
}
