pub mod account;
pub mod clock;
pub mod config;
pub mod entry;
pub mod error;
pub mod ledger;
pub mod processor;
pub mod schedule;
pub mod session;
pub mod store;
pub mod sweeper;
pub mod transaction;

pub use account::{Account, AccountId};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{LedgerConfig, QuotaConfig, QuotaLimits};
pub use error::{LedgerError, StoreError};
pub use ledger::Ledger;
