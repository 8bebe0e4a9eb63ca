use std::io::Read;
use std::iter::Iterator;

use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, Trim};
use rust_decimal::Decimal;
use tracing::warn;

use crate::entry::{OperationEntry, OperationEntryType};
use crate::error::LedgerError;
use crate::ledger::Ledger;

/// Outcome counts of a replayed feed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    pub applied: usize,
    pub rejected: usize,
    pub malformed: usize,
}

#[inline]
pub fn process_csv_stream(ledger: &Ledger, reader: impl Read) -> ReplaySummary {
    let mut binding = ReaderBuilder::new()
        .has_headers(true)
        .quoting(false)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut malformed = 0;
    let stream = binding
        .deserialize()
        .filter_map(|result: Result<OperationEntry, csv::Error>| match result {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "skipping malformed operation row");
                malformed += 1;
                None
            }
        });

    let mut summary = process_stream(ledger, stream);
    summary.malformed = malformed;
    summary
}

#[inline]
pub fn process_stream(
    ledger: &Ledger,
    stream: impl Iterator<Item = OperationEntry>,
) -> ReplaySummary {
    let mut summary = ReplaySummary::default();
    for entry in stream {
        let account = entry.account;
        match process_entry(ledger, entry) {
            Ok(()) => summary.applied += 1,
            Err(e) => {
                warn!(account, error = %e, "operation rejected");
                summary.rejected += 1;
            }
        }
    }
    summary
}

#[inline]
fn amount_of(entry: &OperationEntry) -> Result<Decimal, LedgerError> {
    entry.amount.ok_or(LedgerError::MissingAmount)
}

fn process_entry(ledger: &Ledger, entry: OperationEntry) -> Result<(), LedgerError> {
    let now: DateTime<Utc> = entry.timestamp.unwrap_or_else(|| ledger.now());
    ledger.process_resets(now);

    match entry.entry_type {
        OperationEntryType::Open => {
            let quota = ledger.config().quota;
            if ledger.create_account_at(entry.account, quota, now) {
                Ok(())
            } else {
                Err(LedgerError::AccountAlreadyExists(entry.account))
            }
        }
        OperationEntryType::Deposit => ledger
            .deposit_at(entry.account, amount_of(&entry)?, now)
            .map(|_| ()),
        OperationEntryType::Withdraw => ledger
            .withdraw_at(entry.account, amount_of(&entry)?, now)
            .map(|_| ()),
    }
}
