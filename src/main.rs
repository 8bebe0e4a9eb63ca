use std::fs::File;
use std::io::{self, BufReader};
use std::process::ExitCode;
use std::sync::Arc;
use std::{env, path::PathBuf};

use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bank::clock::SystemClock;
use bank::config::LedgerConfig;
use bank::processor::process_csv_stream;
use bank::session::Session;
use bank::store;
use bank::sweeper::ResetSweeper;

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bank=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn load_config() -> Result<LedgerConfig, bank::StoreError> {
    match env::var_os("BANK_CONFIG") {
        Some(path) => LedgerConfig::from_file(path),
        None => Ok(LedgerConfig::default()),
    }
}

fn main() -> ExitCode {
    init_logging();

    let args: Vec<String> = env::args().collect();
    if !(2..=3).contains(&args.len()) {
        let program = args.first().map(String::as_str).unwrap_or("bank");
        eprintln!("Usage: {} accounts.json [operations.csv]", program);
        return ExitCode::FAILURE;
    }
    let state_path = PathBuf::from(&args[1]);

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    let tick = config.sweep_interval();

    let ledger = match store::open_ledger(&state_path, config, Arc::new(SystemClock)) {
        Ok(ledger) => Arc::new(ledger),
        Err(e) => {
            error!(path = %state_path.display(), error = %e, "failed to open ledger state");
            return ExitCode::FAILURE;
        }
    };

    let sweeper = match ResetSweeper::spawn(Arc::clone(&ledger), tick) {
        Ok(sweeper) => Some(sweeper),
        Err(e) => {
            error!(error = %e, "reset sweeper unavailable, resets run on access only");
            None
        }
    };

    if let Some(operations) = args.get(2) {
        match File::open(operations) {
            Ok(file) => {
                let summary = process_csv_stream(&ledger, BufReader::new(file));
                eprintln!(
                    "applied {}, rejected {}, malformed {}",
                    summary.applied, summary.rejected, summary.malformed
                );
                print!("{}", ledger);
            }
            Err(e) => {
                error!(path = %operations, error = %e, "failed to open operations file");
                return ExitCode::FAILURE;
            }
        }
    } else {
        let stdin = io::stdin();
        let stdout = io::stdout();
        if let Err(e) = Session::new(&ledger, stdin.lock(), stdout.lock()).run() {
            error!(error = %e, "session aborted");
        }
    }

    if let Some(sweeper) = sweeper {
        sweeper.shutdown();
    }

    match store::save(&state_path, &ledger.export_state()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Failed to save {}: {}", state_path.display(), e);
            ExitCode::FAILURE
        }
    }
}
