//! Scenario replay.
//!
//! Plays the execution environment around a [`StreamEngine`]: it drives the
//! clock, keeps the external balances the engine collects from and pays into,
//! and reports final stream states as CSV.

use crate::address::Address;
use crate::admin::AdminFacet;
use crate::amount::Amount;
use crate::clock::{Clock, ManualClock};
use crate::command::{CommandKind, CommandRecord, ParsedCommand};
use crate::engine::StreamEngine;
use crate::error::{ReplayError, StreamError};
use crate::stream::{StreamId, Timestamp};
use crate::transfer::{BalanceBook, Transfer};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use log::{debug, warn};
use serde::Serialize;
use std::io::{Read, Write};
use thiserror::Error;

/// One output row per stream.
#[derive(Debug, Serialize)]
struct StreamRow<'a> {
    id: StreamId,
    sender: &'a Address,
    recipient: &'a Address,
    deposit: Amount,
    withdrawn: Amount,
    start_time: Timestamp,
    end_time: Timestamp,
    active: bool,
    refunded: Amount,
    paid_out: Amount,
}

/// Why a single scenario row was skipped.
#[derive(Error, Debug)]
enum RowError {
    #[error("time {requested} is before the current time {now}")]
    ClockWentBackwards { now: Timestamp, requested: Timestamp },

    #[error("funding failed: {0}")]
    FundingFailed(String),

    #[error(transparent)]
    Rejected(#[from] StreamError),
}

/// Replays scenarios against an in-memory ledger.
pub struct Simulator {
    engine: StreamEngine<ManualClock, BalanceBook>,
}

impl Simulator {
    /// Creates a simulator whose ledger is owned by `owner`, starting at time 0.
    pub fn new(owner: Address) -> Self {
        Simulator {
            engine: StreamEngine::new(
                AdminFacet::new(owner),
                ManualClock::new(0),
                BalanceBook::new(),
            ),
        }
    }

    pub fn engine(&self) -> &StreamEngine<ManualClock, BalanceBook> {
        &self.engine
    }

    /// Processes scenario rows from a CSV reader in streaming fashion.
    ///
    /// Rows that fail to parse or are rejected by the ledger are logged at
    /// warn level and skipped.
    pub fn process_csv<R: Read>(&mut self, reader: R) -> Result<(), ReplayError> {
        let mut csv_reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(reader);

        for (row_idx, result) in csv_reader.deserialize::<CommandRecord>().enumerate() {
            let row_num = row_idx + 2; // 1-indexed, accounting for header row

            match result {
                Ok(record) => {
                    if let Some(command) = record.parse() {
                        if let Err(e) = self.run_command(command, row_num) {
                            warn!("Row {}: {}", row_num, e);
                        }
                    } else {
                        warn!("Row {}: Failed to parse command record", row_num);
                    }
                }
                Err(e) => {
                    warn!("Row {}: CSV parse error: {}", row_num, e);
                }
            }
        }

        Ok(())
    }

    fn run_command(&mut self, command: ParsedCommand, row: usize) -> Result<(), RowError> {
        if let Some(time) = command.time {
            let clock = self.engine.clock();
            if !clock.advance_to(time) {
                return Err(RowError::ClockWentBackwards {
                    now: clock.now(),
                    requested: time,
                });
            }
        }

        let caller = command.caller;
        match command.kind {
            CommandKind::Fund(amount) => {
                if !self.engine.transfer_mut().credit(&caller, amount) {
                    return Err(RowError::FundingFailed(format!(
                        "balance of {} would overflow",
                        caller
                    )));
                }
                self.engine.transfer_mut().commit();
                debug!("Row {}: Funded {} with {}", row, caller, amount);
            }
            CommandKind::Create {
                recipient,
                deposit,
                start_time,
                end_time,
            } => {
                let id = self
                    .engine
                    .create_stream(&caller, &recipient, deposit, start_time, end_time)?;
                debug!("Row {}: Created stream {}", row, id);
            }
            CommandKind::Withdraw(id) => {
                let amount = self.engine.withdraw(id, &caller)?;
                debug!("Row {}: {} withdrew {} from stream {}", row, caller, amount, id);
            }
            CommandKind::Cancel(id) => {
                let settlement = self.engine.cancel(id, &caller)?;
                debug!(
                    "Row {}: {} canceled stream {} (refund {}, payout {})",
                    row, caller, id, settlement.refund_to_sender, settlement.payout_to_recipient
                );
            }
            CommandKind::TransferOwnership(new_owner) => {
                self.engine.transfer_ownership(&caller, new_owner)?;
            }
            CommandKind::Block(account) => {
                debug!("Row {}: Payments to {} will be rejected", row, account);
                self.engine.transfer_mut().block(account);
            }
            CommandKind::Unblock(account) => {
                debug!("Row {}: Payments to {} accepted again", row, account);
                self.engine.transfer_mut().unblock(&account);
            }
        }

        Ok(())
    }

    /// Writes final stream states to CSV, sorted by stream id.
    pub fn write_output<W: Write>(&self, writer: W) -> Result<(), ReplayError> {
        let mut csv_writer = WriterBuilder::new().has_headers(false).from_writer(writer);

        csv_writer.write_record([
            "id",
            "sender",
            "recipient",
            "deposit",
            "withdrawn",
            "start_time",
            "end_time",
            "active",
            "refunded",
            "paid_out",
        ])?;
        for stream in self.engine.streams() {
            let (refunded, paid_out) = stream
                .cancellation
                .map(|c| (c.refund_to_sender, c.payout_to_recipient))
                .unwrap_or((Amount::ZERO, Amount::ZERO));

            csv_writer.serialize(StreamRow {
                id: stream.id,
                sender: &stream.sender,
                recipient: &stream.recipient,
                deposit: stream.deposit,
                withdrawn: stream.withdrawn,
                start_time: stream.start_time,
                end_time: stream.end_time,
                active: stream.is_active,
                refunded,
                paid_out,
            })?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Writes external balances to CSV, sorted by address.
    pub fn write_balances<W: Write>(&self, writer: W) -> Result<(), ReplayError> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["address", "balance"])?;
        for (address, balance) in self.engine.transfer().balances() {
            csv_writer.write_record([address.as_str(), balance.to_string().as_str()])?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn replay(csv: &str) -> Simulator {
        let mut simulator = Simulator::new(Address::from("admin"));
        simulator.process_csv(Cursor::new(csv)).unwrap();
        simulator
    }

    fn balance(simulator: &Simulator, who: &str) -> Amount {
        simulator.engine().transfer().balance_of(&Address::from(who))
    }

    #[test]
    fn test_create_debits_sender() {
        let csv = r#"time,op,caller,stream,target,amount,start,end
0,fund,alice,,,1500,,
0,create,alice,,bob,1000,0,100"#;

        let simulator = replay(csv);
        assert_eq!(balance(&simulator, "alice"), Amount::new(500));
        assert_eq!(simulator.engine().contract_balance(), Amount::new(1000));
        assert_eq!(simulator.engine().stream_count(), 1);
    }

    #[test]
    fn test_unfunded_create_is_skipped() {
        let csv = r#"time,op,caller,stream,target,amount,start,end
0,fund,alice,,,10,,
0,create,alice,,bob,1000,0,100"#;

        let simulator = replay(csv);
        assert_eq!(balance(&simulator, "alice"), Amount::new(10));
        assert_eq!(simulator.engine().stream_count(), 0);
        assert_eq!(simulator.engine().contract_balance(), Amount::ZERO);
    }

    #[test]
    fn test_ownership_to_missing_target_is_rejected() {
        let csv = r#"time,op,caller,stream,target,amount,start,end
0,transfer_ownership,admin,,,,,"#;

        let simulator = replay(csv);
        assert_eq!(simulator.engine().owner(), &Address::from("admin"));
        assert!(simulator.engine().events().is_empty());
    }

    #[test]
    fn test_rejected_create_keeps_funds() {
        let csv = r#"time,op,caller,stream,target,amount,start,end
0,fund,alice,,,1000,,
0,create,alice,,bob,1000,100,100"#;

        let simulator = replay(csv);
        assert_eq!(balance(&simulator, "alice"), Amount::new(1000));
        assert_eq!(simulator.engine().stream_count(), 0);
        assert_eq!(simulator.engine().contract_balance(), Amount::ZERO);
    }

    #[test]
    fn test_withdraw_and_cancel() {
        let csv = r#"time,op,caller,stream,target,amount,start,end
0,fund,alice,,,1000,,
0,create,alice,,bob,1000,0,100
20,withdraw,bob,0,,,,
30,cancel,alice,0,,,,"#;

        let simulator = replay(csv);
        assert_eq!(balance(&simulator, "bob"), Amount::new(300));
        assert_eq!(balance(&simulator, "alice"), Amount::new(700));
        assert!(simulator.engine().check_invariants());
    }

    #[test]
    fn test_clock_never_goes_backwards() {
        let csv = r#"time,op,caller,stream,target,amount,start,end
0,fund,alice,,,1000,,
0,create,alice,,bob,1000,0,100
50,withdraw,bob,0,,,,
10,cancel,alice,0,,,,"#;

        let simulator = replay(csv);
        assert_eq!(simulator.engine().clock().now(), 50);
        assert!(simulator.engine().stream(0).unwrap().is_active);
    }

    #[test]
    fn test_blocked_recipient_leaves_stream_untouched() {
        let csv = r#"time,op,caller,stream,target,amount,start,end
0,fund,alice,,,1000,,
0,create,alice,,bob,1000,0,100
0,block,admin,,bob,,,
50,withdraw,bob,0,,,,"#;

        let simulator = replay(csv);
        assert_eq!(simulator.engine().stream(0).unwrap().withdrawn, Amount::ZERO);
        assert_eq!(balance(&simulator, "bob"), Amount::ZERO);
    }

    #[test]
    fn test_output_format() {
        let csv = r#"time,op,caller,stream,target,amount,start,end
0,fund,alice,,,1000,,
0,create,alice,,bob,1000,0,100
30,cancel,alice,0,,,,"#;

        let simulator = replay(csv);
        let mut output = Vec::new();
        simulator.write_output(&mut output).unwrap();

        let output_str = String::from_utf8(output).unwrap();
        assert!(output_str.starts_with(
            "id,sender,recipient,deposit,withdrawn,start_time,end_time,active,refunded,paid_out"
        ));
        assert!(output_str.contains("0,alice,bob,1000,0,0,100,false,700,300"));
    }

    #[test]
    fn test_balances_format() {
        let csv = r#"time,op,caller,stream,target,amount,start,end
0,fund,carol,,,5,,
0,fund,alice,,,7,,"#;

        let simulator = replay(csv);
        let mut output = Vec::new();
        simulator.write_balances(&mut output).unwrap();

        let output_str = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = output_str.lines().collect();
        assert_eq!(lines, vec!["address,balance", "alice,7", "carol,5"]);
    }
}
