use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use crate::ledger::Ledger;

/// Runs `Ledger::process_resets` on a fixed tick until shut down or dropped.
pub struct ResetSweeper {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ResetSweeper {
    pub fn spawn(ledger: Arc<Ledger>, tick: Duration) -> std::io::Result<Self> {
        let (stop, stopped) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("reset-sweeper".into())
            .spawn(move || {
                loop {
                    let reset = ledger.process_due_resets();
                    if reset > 0 {
                        debug!(reset, "reset sweep");
                    }
                    match stopped.recv_timeout(tick) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })?;

        Ok(ResetSweeper {
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("reset sweeper thread panicked");
            }
        }
    }
}

impl Drop for ResetSweeper {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::LedgerConfig;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use rust_decimal::dec;
    use std::time::Instant;

    #[test]
    fn test_sweeper_resets_due_windows() {
        let start = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let ledger = Arc::new(Ledger::with_clock(LedgerConfig::default(), clock.clone()));
        ledger.create_account(1);
        ledger.deposit(1, dec!(10)).unwrap();

        let sweeper = ResetSweeper::spawn(Arc::clone(&ledger), Duration::from_millis(5)).unwrap();
        clock.advance(ChronoDuration::hours(24));

        let deadline = Instant::now() + Duration::from_secs(5);
        while ledger.get_account(1).unwrap().window().deposit_count != 0 {
            assert!(Instant::now() < deadline, "sweeper never reset the window");
            thread::sleep(Duration::from_millis(5));
        }
        sweeper.shutdown();

        assert_eq!(ledger.next_reset(1), Some(start + ChronoDuration::hours(48)));
        assert_eq!(ledger.balance(1), Ok(dec!(10)));
    }

    #[test]
    fn test_drop_stops_thread() {
        let ledger = Arc::new(Ledger::default());
        let sweeper = ResetSweeper::spawn(Arc::clone(&ledger), Duration::from_secs(60)).unwrap();
        drop(sweeper);
        assert_eq!(Arc::strong_count(&ledger), 1);
    }
}
