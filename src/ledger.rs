use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fmt::Display;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::account::{Account, AccountId};
use crate::clock::{Clock, SystemClock};
use crate::config::{LedgerConfig, QuotaConfig};
use crate::error::LedgerError;
use crate::schedule::{ResetSchedule, next_due};
use crate::store::{AccountRecord, Snapshot};
use crate::transaction::{TransactionHistory, TransactionRecord};

pub type Accounts = HashMap<AccountId, Mutex<Account>>;

/// Rejects the transaction if `now` is still inside the cooldown after the last one.
pub fn enforce_cooldown(
    account: &Account,
    now: DateTime<Utc>,
    cooldown: Duration,
) -> Result<(), LedgerError> {
    match account.cooldown_until(cooldown) {
        Some(retry_after) if now < retry_after => Err(LedgerError::CooldownActive { retry_after }),
        _ => Ok(()),
    }
}

#[inline]
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// Lock order: account map, schedule, account.
pub struct Ledger {
    config: LedgerConfig,
    clock: Arc<dyn Clock>,
    accounts: RwLock<Accounts>,
    schedule: Mutex<ResetSchedule>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}

impl Ledger {
    pub fn new(config: LedgerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: LedgerConfig, clock: Arc<dyn Clock>) -> Self {
        Ledger {
            config,
            clock,
            accounts: RwLock::new(Accounts::new()),
            schedule: Mutex::new(ResetSchedule::new()),
        }
    }

    #[inline]
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    #[inline]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    #[inline]
    fn read_accounts(&self) -> RwLockReadGuard<'_, Accounts> {
        self.accounts.read().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn write_accounts(&self) -> RwLockWriteGuard<'_, Accounts> {
        self.accounts.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Caller must hold the account map write lock and the schedule lock.
    fn insert_locked(
        &self,
        accounts: &mut Accounts,
        schedule: &mut ResetSchedule,
        id: AccountId,
        quota: QuotaConfig,
        now: DateTime<Utc>,
    ) -> bool {
        match accounts.entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(Mutex::new(Account::new(
                    id,
                    quota,
                    self.config.history_capacity,
                )));
                schedule.push(id, now + self.config.reset_interval());
                true
            }
        }
    }

    /// Returns false if the id is taken.
    pub fn create_account(&self, id: AccountId) -> bool {
        self.create_account_with(id, self.config.quota)
    }

    pub fn create_account_with(&self, id: AccountId, quota: QuotaConfig) -> bool {
        self.create_account_at(id, quota, self.now())
    }

    pub fn create_account_at(&self, id: AccountId, quota: QuotaConfig, now: DateTime<Utc>) -> bool {
        let mut accounts = self.write_accounts();
        let mut schedule = lock(&self.schedule);
        let created = self.insert_locked(&mut accounts, &mut schedule, id, quota, now);
        if created {
            debug!(account = id, "account created");
        }
        created
    }

    /// Creates every id in `ids` that does not exist yet, with default quotas.
    pub fn bootstrap(&self, ids: impl IntoIterator<Item = AccountId>) -> usize {
        let now = self.now();
        let mut accounts = self.write_accounts();
        let mut schedule = lock(&self.schedule);
        let created = ids
            .into_iter()
            .filter(|&id| self.insert_locked(&mut accounts, &mut schedule, id, self.config.quota, now))
            .count();
        info!(created, "bootstrapped default accounts");
        created
    }

    /// Consistent copy of the account, or `None` if the id is unknown.
    pub fn get_account(&self, id: AccountId) -> Option<Account> {
        self.read_accounts().get(&id).map(|account| lock(account).clone())
    }

    pub fn contains(&self, id: AccountId) -> bool {
        self.read_accounts().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.read_accounts().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_accounts().is_empty()
    }

    pub fn account_ids(&self) -> Vec<AccountId> {
        let mut ids: Vec<AccountId> = self.read_accounts().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn balance(&self, id: AccountId) -> Result<Decimal, LedgerError> {
        self.get_account(id)
            .map(|account| account.balance())
            .ok_or(LedgerError::AccountNotFound(id))
    }

    pub fn history(&self, id: AccountId) -> Result<Vec<TransactionRecord>, LedgerError> {
        self.get_account(id)
            .map(|account| account.history().to_vec())
            .ok_or(LedgerError::AccountNotFound(id))
    }

    /// Cooldown check against the configured duration, without touching the account.
    pub fn check_cooldown(&self, id: AccountId, now: DateTime<Utc>) -> Result<(), LedgerError> {
        let accounts = self.read_accounts();
        let account = accounts.get(&id).ok_or(LedgerError::AccountNotFound(id))?;
        enforce_cooldown(&lock(account), now, self.config.cooldown())
    }

    #[inline]
    fn transact<F>(&self, id: AccountId, now: DateTime<Utc>, op: F) -> Result<Decimal, LedgerError>
    where
        F: FnOnce(&mut Account) -> Result<Decimal, LedgerError>,
    {
        let accounts = self.read_accounts();
        let account = accounts.get(&id).ok_or(LedgerError::AccountNotFound(id))?;
        let mut account = lock(account);
        enforce_cooldown(&account, now, self.config.cooldown())?;
        op(&mut account)
    }

    pub fn deposit(&self, id: AccountId, amount: Decimal) -> Result<Decimal, LedgerError> {
        self.deposit_at(id, amount, self.now())
    }

    pub fn deposit_at(
        &self,
        id: AccountId,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Decimal, LedgerError> {
        let balance = self.transact(id, now, |account| account.deposit(amount, now))?;
        debug!(account = id, %amount, %balance, "deposit committed");
        Ok(balance)
    }

    pub fn withdraw(&self, id: AccountId, amount: Decimal) -> Result<Decimal, LedgerError> {
        self.withdraw_at(id, amount, self.now())
    }

    pub fn withdraw_at(
        &self,
        id: AccountId,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Decimal, LedgerError> {
        let balance = self.transact(id, now, |account| account.withdraw(amount, now))?;
        debug!(account = id, %amount, %balance, "withdrawal committed");
        Ok(balance)
    }

    /// Resets every account whose window is due at or before `now` and
    /// reschedules it on its own cadence. Returns how many were reset.
    pub fn process_resets(&self, now: DateTime<Utc>) -> usize {
        let accounts = self.read_accounts();
        let mut schedule = lock(&self.schedule);
        let interval = self.config.reset_interval();
        let mut reset = 0;

        while let Some(entry) = schedule.pop_due(now) {
            let Some(account) = accounts.get(&entry.account) else {
                continue;
            };
            lock(account).reset_window();
            let next = next_due(entry.due, now, interval);
            schedule.push(entry.account, next);
            reset += 1;
            debug!(account = entry.account, due = %entry.due, %next, "quota window reset");
        }
        reset
    }

    pub fn process_due_resets(&self) -> usize {
        self.process_resets(self.now())
    }

    pub fn next_reset(&self, id: AccountId) -> Option<DateTime<Utc>> {
        lock(&self.schedule).due_for(id)
    }

    pub fn pending_resets(&self) -> usize {
        lock(&self.schedule).len()
    }

    /// Balances and histories of every account, ordered by id.
    pub fn export_state(&self) -> Snapshot {
        let accounts = self.read_accounts();
        let mut records: Vec<AccountRecord> = accounts
            .values()
            .map(|account| {
                let account = lock(account);
                AccountRecord {
                    id: account.id(),
                    balance: account.balance(),
                    transaction_history: account.history().to_vec(),
                }
            })
            .collect();
        records.sort_unstable_by_key(|record| record.id);
        Snapshot { accounts: records }
    }

    pub fn import_state(&self, snapshot: Snapshot) -> Result<usize, LedgerError> {
        self.import_state_at(snapshot, self.now())
    }

    /// Restores accounts from a snapshot. The whole snapshot is validated
    /// before anything is applied. Known ids keep their quota configuration
    /// and reset entry; new ids get defaults and a reset at `now + interval`.
    pub fn import_state_at(&self, snapshot: Snapshot, now: DateTime<Utc>) -> Result<usize, LedgerError> {
        let mut seen = HashSet::with_capacity(snapshot.accounts.len());
        for record in &snapshot.accounts {
            if record.balance < Decimal::ZERO {
                return Err(LedgerError::InvalidSnapshot(format!(
                    "account {} has negative balance {}",
                    record.id, record.balance
                )));
            }
            if !seen.insert(record.id) {
                return Err(LedgerError::InvalidSnapshot(format!(
                    "account {} appears more than once",
                    record.id
                )));
            }
        }

        let mut accounts = self.write_accounts();
        let mut schedule = lock(&self.schedule);
        let imported = snapshot.accounts.len();

        for record in snapshot.accounts {
            let mut history = TransactionHistory::with_capacity(self.config.history_capacity);
            history.extend(record.transaction_history);

            match accounts.entry(record.id) {
                Entry::Occupied(mut entry) => {
                    let slot = entry.get_mut().get_mut().unwrap_or_else(PoisonError::into_inner);
                    let quota = *slot.quota();
                    *slot = Account::restore(record.id, record.balance, quota, history);
                }
                Entry::Vacant(entry) => {
                    entry.insert(Mutex::new(Account::restore(
                        record.id,
                        record.balance,
                        self.config.quota,
                        history,
                    )));
                    schedule.push(record.id, now + self.config.reset_interval());
                }
            }
        }

        info!(imported, "ledger state imported");
        Ok(imported)
    }
}

impl Display for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "id, balance, withdrawals, deposits")?;

        let accounts = self.read_accounts();
        let mut ids: Vec<&AccountId> = accounts.keys().collect();
        ids.sort_unstable();

        for id in ids {
            let account = lock(&accounts[id]);
            writeln!(
                f,
                "{}, {:.2}, {}, {}",
                account.id(),
                account.balance(),
                account.window().withdrawal_count,
                account.window().deposit_count
            )?;
        }
        Ok(())
    }
}
