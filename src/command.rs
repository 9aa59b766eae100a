//! Scenario command models for CSV parsing and internal representation.

use crate::address::Address;
use crate::amount::Amount;
use crate::stream::{StreamId, Timestamp};
use serde::Deserialize;
use std::str::FromStr;

/// Raw scenario row as read from CSV.
///
/// Every column but `op` and `caller` is optional; which ones are required
/// depends on the operation.
#[derive(Debug, Deserialize)]
pub struct CommandRecord {
    /// Clock reading to advance to before running the command
    pub time: Option<Timestamp>,

    /// fund, create, withdraw, cancel, transfer_ownership, block, unblock
    pub op: String,

    /// Identity issuing the command
    pub caller: String,

    /// Stream id for withdraw and cancel
    pub stream: Option<StreamId>,

    /// Recipient, new owner, or the address to block or unblock
    pub target: Option<String>,

    /// Integral amount for fund and create
    pub amount: Option<String>,

    pub start: Option<Timestamp>,

    pub end: Option<Timestamp>,
}

impl CommandRecord {
    /// Parses the raw CSV row into a typed command.
    ///
    /// Returns `None` if the row is invalid (unknown op, missing column, etc.).
    pub fn parse(&self) -> Option<ParsedCommand> {
        let op = self.op.trim().to_lowercase();

        let kind = match op.as_str() {
            "fund" => CommandKind::Fund(self.parse_amount()?),
            "create" => CommandKind::Create {
                recipient: self.target_or_null(),
                deposit: self.parse_amount()?,
                start_time: self.start?,
                end_time: self.end?,
            },
            "withdraw" => CommandKind::Withdraw(self.stream?),
            "cancel" => CommandKind::Cancel(self.stream?),
            "transfer_ownership" => CommandKind::TransferOwnership(self.target_or_null()),
            "block" => CommandKind::Block(self.parse_target()?),
            "unblock" => CommandKind::Unblock(self.parse_target()?),
            _ => return None,
        };

        Some(ParsedCommand {
            time: self.time,
            caller: Address::new(self.caller.as_str()),
            kind,
        })
    }

    fn parse_amount(&self) -> Option<Amount> {
        let amount_str = self.amount.as_ref()?;
        let trimmed = amount_str.trim();
        if trimmed.is_empty() {
            return None;
        }
        Amount::from_str(trimmed).ok()
    }

    fn parse_target(&self) -> Option<Address> {
        self.target.as_deref().map(Address::new)
    }

    /// An empty recipient or owner column reads as the null address, so the
    /// ledger rejects it with `InvalidParameters`.
    fn target_or_null(&self) -> Address {
        self.parse_target().unwrap_or_else(Address::null)
    }
}

/// A parsed command ready to run.
#[derive(Debug, Clone)]
pub struct ParsedCommand {
    pub time: Option<Timestamp>,

    pub caller: Address,

    pub kind: CommandKind,
}

/// Command variants with associated data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    /// Credit the caller's external balance.
    Fund(Amount),

    /// Open a stream from the caller, funded from the caller's balance.
    Create {
        recipient: Address,
        deposit: Amount,
        start_time: Timestamp,
        end_time: Timestamp,
    },

    /// Recipient withdraws everything vested so far.
    Withdraw(StreamId),

    /// Sender cancels the stream.
    Cancel(StreamId),

    /// Owner hands the ledger to a new owner.
    TransferOwnership(Address),

    /// Make payouts to the address fail.
    Block(Address),

    /// Let payouts to the address succeed again.
    Unblock(Address),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(op: &str) -> CommandRecord {
        CommandRecord {
            time: None,
            op: op.to_string(),
            caller: "alice".to_string(),
            stream: None,
            target: None,
            amount: None,
            start: None,
            end: None,
        }
    }

    #[test]
    fn test_parse_create() {
        let record = CommandRecord {
            time: Some(5),
            target: Some("bob".to_string()),
            amount: Some(" 1000 ".to_string()),
            start: Some(0),
            end: Some(100),
            ..record("create")
        };

        let parsed = record.parse().unwrap();
        assert_eq!(parsed.time, Some(5));
        assert_eq!(parsed.caller, Address::from("alice"));
        assert_eq!(
            parsed.kind,
            CommandKind::Create {
                recipient: Address::from("bob"),
                deposit: Amount::new(1000),
                start_time: 0,
                end_time: 100,
            }
        );
    }

    #[test]
    fn test_parse_withdraw_and_cancel() {
        let withdraw = CommandRecord {
            stream: Some(3),
            ..record("withdraw")
        };
        assert_eq!(withdraw.parse().unwrap().kind, CommandKind::Withdraw(3));

        let cancel = CommandRecord {
            stream: Some(4),
            ..record(" Cancel ")
        };
        assert_eq!(cancel.parse().unwrap().kind, CommandKind::Cancel(4));
    }

    #[test]
    fn test_parse_rejects_missing_columns() {
        assert!(record("withdraw").parse().is_none());
        assert!(record("fund").parse().is_none());

        let no_window = CommandRecord {
            target: Some("bob".to_string()),
            amount: Some("10".to_string()),
            ..record("create")
        };
        assert!(no_window.parse().is_none());
    }

    #[test]
    fn test_parse_rejects_bad_amount() {
        let fractional = CommandRecord {
            amount: Some("1.5".to_string()),
            ..record("fund")
        };
        assert!(fractional.parse().is_none());
    }

    #[test]
    fn test_parse_rejects_unknown_op() {
        assert!(record("dispute").parse().is_none());
    }

    #[test]
    fn test_empty_target_becomes_null_address() {
        let record = CommandRecord {
            target: Some("".to_string()),
            ..record("transfer_ownership")
        };
        match record.parse().unwrap().kind {
            CommandKind::TransferOwnership(owner) => assert!(owner.is_null()),
            other => panic!("Expected TransferOwnership, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_target_becomes_null_address() {
        match record("transfer_ownership").parse().unwrap().kind {
            CommandKind::TransferOwnership(owner) => assert!(owner.is_null()),
            other => panic!("Expected TransferOwnership, got {:?}", other),
        }

        let create = CommandRecord {
            amount: Some("10".to_string()),
            start: Some(0),
            end: Some(10),
            ..record("create")
        };
        match create.parse().unwrap().kind {
            CommandKind::Create { recipient, .. } => assert!(recipient.is_null()),
            other => panic!("Expected Create, got {:?}", other),
        }
    }

    #[test]
    fn test_block_requires_target() {
        assert!(record("block").parse().is_none());
        assert!(record("unblock").parse().is_none());
    }
}
