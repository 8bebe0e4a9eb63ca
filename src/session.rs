use std::io::{self, BufRead, Write};
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::account::AccountId;
use crate::error::LedgerError;
use crate::ledger::Ledger;
use crate::transaction::TransactionKind;

const MENU: &str =
    "\n1 - Balance \t 2 - Withdraw \t 3 - Deposit \t 4 - Transaction History \t 5 - Quit";
const INVALID_INPUT: &str = "Invalid input. Please try again.";

enum MenuExit {
    Quit,
    EndOfInput,
}

pub struct Session<'a, R, W> {
    ledger: &'a Ledger,
    input: R,
    output: W,
}

impl<'a, R: BufRead, W: Write> Session<'a, R, W> {
    pub fn new(ledger: &'a Ledger, input: R, output: W) -> Self {
        Session {
            ledger,
            input,
            output,
        }
    }

    /// Runs until the user quits or input ends.
    pub fn run(&mut self) -> io::Result<()> {
        loop {
            self.ledger.process_due_resets();

            writeln!(self.output, "\nGood Morning!")?;
            let Some(line) = self.prompt("\nPlease Enter Your account pin: ")? else {
                return Ok(());
            };
            let Ok(id) = line.parse::<AccountId>() else {
                writeln!(self.output, "{INVALID_INPUT}")?;
                continue;
            };
            let Some(account) = self.ledger.get_account(id) else {
                writeln!(self.output, "Invalid Pin. Try again.")?;
                continue;
            };

            writeln!(self.output, "\nHello, {}!", account.name())?;
            match self.account_menu(id)? {
                MenuExit::Quit => {
                    writeln!(self.output, "Thank you for banking with us!")?;
                    return Ok(());
                }
                MenuExit::EndOfInput => return Ok(()),
            }
        }
    }

    fn prompt(&mut self, text: &str) -> io::Result<Option<String>> {
        write!(self.output, "{text}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn account_menu(&mut self, id: AccountId) -> io::Result<MenuExit> {
        loop {
            writeln!(self.output, "{MENU}")?;
            let Some(line) = self.prompt("\nEnter your selection: ")? else {
                return Ok(MenuExit::EndOfInput);
            };

            let outcome = match line.parse::<u8>() {
                Ok(1) => self.show_balance(id).map(Some)?,
                Ok(2) => self.transact(id, TransactionKind::Withdraw)?,
                Ok(3) => self.transact(id, TransactionKind::Deposit)?,
                Ok(4) => self.show_history(id).map(Some)?,
                Ok(5) => return Ok(MenuExit::Quit),
                Ok(_) => writeln!(self.output, "Invalid selection. Try again.").map(Some)?,
                Err(_) => writeln!(self.output, "{INVALID_INPUT}").map(Some)?,
            };
            if outcome.is_none() {
                return Ok(MenuExit::EndOfInput);
            }
        }
    }

    fn show_balance(&mut self, id: AccountId) -> io::Result<()> {
        match self.ledger.balance(id) {
            Ok(balance) => writeln!(self.output, "Your Balance is: {balance}"),
            Err(e) => writeln!(self.output, "{e}"),
        }
    }

    fn show_history(&mut self, id: AccountId) -> io::Result<()> {
        let history = match self.ledger.history(id) {
            Ok(history) => history,
            Err(e) => return writeln!(self.output, "{e}"),
        };
        if history.is_empty() {
            return writeln!(self.output, "No transactions found.");
        }

        writeln!(self.output, "\nRecent Transactions:")?;
        for record in history {
            writeln!(
                self.output,
                "- {}: {} ${} (Balance: ${})",
                record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                record.kind,
                record.amount,
                record.balance_after
            )?;
        }
        Ok(())
    }

    /// `Ok(None)` when input ends while waiting for the amount.
    fn transact(&mut self, id: AccountId, kind: TransactionKind) -> io::Result<Option<()>> {
        if let Err(LedgerError::CooldownActive { retry_after }) =
            self.ledger.check_cooldown(id, self.ledger.now())
        {
            writeln!(
                self.output,
                "Cooldown in effect. Try again after {}.",
                retry_after.format("%H:%M:%S")
            )?;
            return Ok(Some(()));
        }

        let (verb, noun) = match kind {
            TransactionKind::Withdraw => ("withdraw", "Withdrawal"),
            TransactionKind::Deposit => ("deposit", "Deposit"),
        };
        let Some(line) = self.prompt(&format!("Enter amount to {verb}: "))? else {
            return Ok(None);
        };
        let Ok(amount) = Decimal::from_str(&line) else {
            writeln!(self.output, "{INVALID_INPUT}")?;
            return Ok(Some(()));
        };

        let result = match kind {
            TransactionKind::Withdraw => self.ledger.withdraw(id, amount),
            TransactionKind::Deposit => self.ledger.deposit(id, amount),
        };
        match result {
            Ok(balance) => writeln!(
                self.output,
                "{noun} successful. Updated Balance: {balance}"
            )?,
            Err(e) => writeln!(self.output, "{noun} failed: {e}")?,
        }
        Ok(Some(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::LedgerConfig;
    use chrono::{TimeZone, Utc};
    use rust_decimal::dec;
    use std::sync::Arc;

    fn ledger(cooldown_secs: i64) -> Ledger {
        let config = LedgerConfig {
            cooldown_secs,
            ..LedgerConfig::default()
        };
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 7, 4, 14, 30, 0).unwrap(),
        ));
        let ledger = Ledger::with_clock(config, clock);
        ledger.bootstrap(0..10);
        ledger
    }

    fn run(ledger: &Ledger, input: &str) -> String {
        let mut output = Vec::new();
        Session::new(ledger, input.as_bytes(), &mut output)
            .run()
            .unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_full_session() {
        let ledger = ledger(0);

        let output = run(&ledger, "abc\n99\n1\n3\n500\n1\n2\n100\n4\n5\n");

        assert!(output.contains(INVALID_INPUT));
        assert!(output.contains("Invalid Pin. Try again."));
        assert!(output.contains("Hello, User1!"));
        assert!(output.contains("Deposit successful. Updated Balance: 500"));
        assert!(output.contains("Your Balance is: 500"));
        assert!(output.contains("Withdrawal successful. Updated Balance: 400"));
        assert!(output.contains("- 2024-07-04 14:30:00: deposit $500 (Balance: $500)"));
        assert!(output.contains("- 2024-07-04 14:30:00: withdraw $100 (Balance: $400)"));
        assert!(output.ends_with("Thank you for banking with us!\n"));
        assert_eq!(ledger.balance(1), Ok(dec!(400)));
    }

    #[test]
    fn test_cooldown_checked_before_amount_prompt() {
        let ledger = ledger(15);

        let output = run(&ledger, "2\n3\n10\n3\n5\n");

        assert!(output.contains("Deposit successful. Updated Balance: 10"));
        assert!(output.contains("Cooldown in effect. Try again after 14:30:15."));
        assert_eq!(output.matches("Enter amount to deposit").count(), 1);
        assert_eq!(ledger.balance(2), Ok(dec!(10)));
    }

    #[test]
    fn test_rejected_operations_are_reported() {
        let ledger = ledger(0);

        let output = run(&ledger, "3\n2\n5\n2\nxyz\n3\n-5\n4\n9\n5\n");

        assert!(output.contains("Withdrawal failed: Insufficient funds for transaction"));
        assert!(output.contains(INVALID_INPUT));
        assert!(output.contains("Deposit failed: Amount must be positive, got -5"));
        assert!(output.contains("No transactions found."));
        assert!(output.contains("Invalid selection. Try again."));
        assert_eq!(ledger.balance(3), Ok(Decimal::ZERO));
    }

    #[test]
    fn test_end_of_input_ends_session() {
        let ledger = ledger(0);

        let output = run(&ledger, "");
        assert!(output.contains("Good Morning!"));

        let output = run(&ledger, "4\n3\n");
        assert!(output.contains("Hello, User4!"));
        assert!(!output.contains("Thank you"));
    }
}
