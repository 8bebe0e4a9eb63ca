use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::account::AccountId;
use crate::clock::Clock;
use crate::config::LedgerConfig;
use crate::error::StoreError;
use crate::ledger::Ledger;
use crate::transaction::TransactionRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: AccountId,
    pub balance: Decimal,
    #[serde(default)]
    pub transaction_history: Vec<TransactionRecord>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    pub accounts: Vec<AccountRecord>,
}

/// Reads a snapshot. A missing file is `Ok(None)`; anything unreadable is an error.
pub fn load(path: impl AsRef<Path>) -> Result<Option<Snapshot>, StoreError> {
    let file = match File::open(path.as_ref()) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let snapshot = serde_json::from_reader(BufReader::new(file))?;
    Ok(Some(snapshot))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Writes the snapshot next to `path` and renames it into place.
pub fn save(path: impl AsRef<Path>, snapshot: &Snapshot) -> Result<(), StoreError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = temp_path(path);
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer(&mut writer, snapshot)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    fs::rename(&tmp, path)?;

    info!(path = %path.display(), accounts = snapshot.accounts.len(), "ledger state saved");
    Ok(())
}

/// Restores a ledger from `path`, or bootstraps the default population when no state exists.
pub fn open_ledger(
    path: impl AsRef<Path>,
    config: LedgerConfig,
    clock: Arc<dyn Clock>,
) -> Result<Ledger, StoreError> {
    let path = path.as_ref();
    let bootstrap_accounts = config.bootstrap_accounts;
    let ledger = Ledger::with_clock(config, clock);

    match load(path)? {
        Some(snapshot) => {
            ledger.import_state(snapshot)?;
        }
        None => {
            info!(path = %path.display(), "no saved state, bootstrapping");
            ledger.bootstrap(0..bootstrap_accounts);
        }
    }
    Ok(ledger)
}
