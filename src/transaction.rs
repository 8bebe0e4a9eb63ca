use std::collections::VecDeque;
use std::collections::vec_deque;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TransactionKind::Deposit => write!(f, "deposit"),
            TransactionKind::Withdraw => write!(f, "withdraw"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Fixed-capacity transaction log. Appending at capacity evicts the oldest record.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionHistory {
    capacity: usize,
    records: VecDeque<TransactionRecord>,
}

impl TransactionHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        TransactionHistory {
            capacity,
            records: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, record: TransactionRecord) {
        if self.capacity == 0 {
            return;
        }
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Oldest first.
    pub fn iter(&self) -> vec_deque::Iter<'_, TransactionRecord> {
        self.records.iter()
    }

    pub fn to_vec(&self) -> Vec<TransactionRecord> {
        self.records.iter().cloned().collect()
    }
}

impl Extend<TransactionRecord> for TransactionHistory {
    fn extend<I: IntoIterator<Item = TransactionRecord>>(&mut self, iter: I) {
        for record in iter {
            self.push(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal::dec;

    fn record(amount: Decimal, minute: i64) -> TransactionRecord {
        TransactionRecord {
            kind: TransactionKind::Deposit,
            amount,
            balance_after: amount,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + Duration::minutes(minute),
        }
    }

    #[test]
    fn test_history_evicts_oldest_first() {
        let mut history = TransactionHistory::with_capacity(3);

        for i in 1..=5 {
            history.push(record(Decimal::from(i), i));
        }

        assert_eq!(history.len(), 3);
        let amounts: Vec<Decimal> = history.iter().map(|r| r.amount).collect();
        assert_eq!(amounts, vec![dec!(3), dec!(4), dec!(5)]);
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut history = TransactionHistory::with_capacity(0);
        history.push(record(dec!(1), 0));
        assert!(history.is_empty());
    }

    #[test]
    fn test_record_json_shape() {
        let json = serde_json::to_value(record(dec!(12.5), 0)).unwrap();

        assert_eq!(json["type"], "deposit");
        assert_eq!(json["timestamp"], "2024-01-01T00:00:00Z");

        let withdraw: TransactionKind = serde_json::from_str("\"withdraw\"").unwrap();
        assert_eq!(withdraw, TransactionKind::Withdraw);
    }
}
