use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::config::{QuotaConfig, QuotaLimits};
use crate::error::LedgerError;
use crate::transaction::{TransactionHistory, TransactionKind, TransactionRecord};

pub type AccountId = u32;

/// Per-window usage counters. Zeroed only by the reset schedule.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct QuotaWindow {
    pub withdrawal_count: u32,
    pub deposit_count: u32,
    pub daily_withdrawn: Decimal,
    pub daily_deposited: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    id: AccountId,
    balance: Decimal,
    quota: QuotaConfig,
    window: QuotaWindow,
    last_transaction_time: Option<DateTime<Utc>>,
    history: TransactionHistory,
}

#[inline]
fn check_amount(amount: Decimal) -> Result<(), LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount(amount));
    }
    Ok(())
}

#[inline]
fn check_limits(
    limits: &QuotaLimits,
    count: u32,
    window_total: Decimal,
    amount: Decimal,
) -> Result<(), LedgerError> {
    if count >= limits.frequency {
        return Err(LedgerError::FrequencyLimitExceeded {
            limit: limits.frequency,
        });
    }
    if amount > limits.transaction_max {
        return Err(LedgerError::TransactionLimitExceeded {
            limit: limits.transaction_max,
        });
    }
    let total = window_total
        .checked_add(amount)
        .ok_or(LedgerError::AmountOverflow)?;
    if total > limits.daily_max {
        return Err(LedgerError::DailyLimitExceeded {
            limit: limits.daily_max,
        });
    }
    Ok(())
}

impl Account {
    pub fn new(id: AccountId, quota: QuotaConfig, history_capacity: usize) -> Self {
        Account {
            id,
            balance: Decimal::ZERO,
            quota,
            window: QuotaWindow::default(),
            last_transaction_time: None,
            history: TransactionHistory::with_capacity(history_capacity),
        }
    }

    /// Rebuilds an account from persisted state. Counters and cooldown start fresh.
    pub(crate) fn restore(
        id: AccountId,
        balance: Decimal,
        quota: QuotaConfig,
        history: TransactionHistory,
    ) -> Self {
        Account {
            id,
            balance,
            quota,
            window: QuotaWindow::default(),
            last_transaction_time: None,
            history,
        }
    }

    #[inline]
    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn name(&self) -> String {
        format!("User{}", self.id)
    }

    #[inline]
    pub fn balance(&self) -> Decimal {
        self.balance
    }

    #[inline]
    pub fn quota(&self) -> &QuotaConfig {
        &self.quota
    }

    #[inline]
    pub fn window(&self) -> &QuotaWindow {
        &self.window
    }

    #[inline]
    pub fn last_transaction_time(&self) -> Option<DateTime<Utc>> {
        self.last_transaction_time
    }

    #[inline]
    pub fn history(&self) -> &TransactionHistory {
        &self.history
    }

    /// Earliest time the next transaction is allowed, if a cooldown applies at all.
    pub fn cooldown_until(&self, cooldown: Duration) -> Option<DateTime<Utc>> {
        self.last_transaction_time.map(|last| last + cooldown)
    }

    pub fn check_withdraw(&self, amount: Decimal) -> Result<(), LedgerError> {
        check_amount(amount)?;
        check_limits(
            &self.quota.withdrawal,
            self.window.withdrawal_count,
            self.window.daily_withdrawn,
            amount,
        )?;
        if amount > self.balance {
            return Err(LedgerError::InsufficientFunds);
        }
        Ok(())
    }

    pub fn check_deposit(&self, amount: Decimal) -> Result<(), LedgerError> {
        check_amount(amount)?;
        check_limits(
            &self.quota.deposit,
            self.window.deposit_count,
            self.window.daily_deposited,
            amount,
        )?;
        if self.balance.checked_add(amount).is_none() {
            return Err(LedgerError::AmountOverflow);
        }
        Ok(())
    }

    #[inline]
    pub fn can_withdraw(&self, amount: Decimal) -> bool {
        self.check_withdraw(amount).is_ok()
    }

    #[inline]
    pub fn can_deposit(&self, amount: Decimal) -> bool {
        self.check_deposit(amount).is_ok()
    }

    /// Applies the withdrawal or leaves the account untouched. Returns the new balance.
    pub fn withdraw(&mut self, amount: Decimal, now: DateTime<Utc>) -> Result<Decimal, LedgerError> {
        self.check_withdraw(amount)?;

        self.balance -= amount;
        self.window.withdrawal_count += 1;
        self.window.daily_withdrawn += amount;
        self.commit(TransactionKind::Withdraw, amount, now);
        Ok(self.balance)
    }

    /// Applies the deposit or leaves the account untouched. Returns the new balance.
    pub fn deposit(&mut self, amount: Decimal, now: DateTime<Utc>) -> Result<Decimal, LedgerError> {
        self.check_deposit(amount)?;

        self.balance += amount;
        self.window.deposit_count += 1;
        self.window.daily_deposited += amount;
        self.commit(TransactionKind::Deposit, amount, now);
        Ok(self.balance)
    }

    /// Zeroes the window counters. Balance, history and cooldown stamp are kept.
    pub fn reset_window(&mut self) {
        self.window = QuotaWindow::default();
    }

    pub fn record_history(&mut self, kind: TransactionKind, amount: Decimal, now: DateTime<Utc>) {
        self.history.push(TransactionRecord {
            kind,
            amount,
            balance_after: self.balance,
            timestamp: now,
        });
    }

    #[inline]
    fn commit(&mut self, kind: TransactionKind, amount: Decimal, now: DateTime<Utc>) {
        self.last_transaction_time = Some(now);
        self.record_history(kind, amount, now);
    }
}
