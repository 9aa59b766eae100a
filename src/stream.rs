//! Stream record model.
//!
//! Maintains the invariant `withdrawn <= deposit` at all times and, once a
//! stream is canceled, `withdrawn + refund_to_sender + payout_to_recipient == deposit`.

use crate::address::Address;
use crate::amount::Amount;
use serde::Serialize;

/// Dense, strictly increasing stream identifier.
pub type StreamId = u64;

/// Seconds on the ledger's clock.
pub type Timestamp = u64;

/// Terminal settlement of a canceled stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Cancellation {
    /// Clock reading when the sender canceled.
    pub canceled_at: Timestamp,

    /// Unvested remainder returned to the sender.
    pub refund_to_sender: Amount,

    /// Vested but unwithdrawn amount paid to the recipient.
    pub payout_to_recipient: Amount,
}

/// A linearly vesting payment stream.
///
/// # Invariants
///
/// - `withdrawn <= deposit`, and `withdrawn` only grows
/// - `end_time > start_time` and `deposit > 0`, fixed at creation
/// - `is_active == cancellation.is_none()`; once inactive the record never
///   changes again
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stream {
    /// Registry identifier.
    pub id: StreamId,

    /// Address that funded the stream.
    pub sender: Address,

    /// Address entitled to withdraw.
    pub recipient: Address,

    /// Total funded amount.
    pub deposit: Amount,

    /// Cumulative amount already paid to the recipient through withdrawals.
    pub withdrawn: Amount,

    pub start_time: Timestamp,

    pub end_time: Timestamp,

    /// Cleared exactly once, by cancellation.
    pub is_active: bool,

    /// Set together with `is_active = false`.
    pub cancellation: Option<Cancellation>,
}

impl Stream {
    /// Creates an active stream with nothing withdrawn.
    pub fn new(
        id: StreamId,
        sender: Address,
        recipient: Address,
        deposit: Amount,
        start_time: Timestamp,
        end_time: Timestamp,
    ) -> Self {
        Stream {
            id,
            sender,
            recipient,
            deposit,
            withdrawn: Amount::ZERO,
            start_time,
            end_time,
            is_active: true,
            cancellation: None,
        }
    }

    /// Length of the vesting window in seconds. Never zero for a valid stream.
    pub fn duration(&self) -> u64 {
        self.end_time - self.start_time
    }

    /// Amount the ledger still holds on behalf of this stream.
    pub fn outstanding(&self) -> Amount {
        match self.cancellation {
            Some(_) => Amount::ZERO,
            None => self.deposit.saturating_sub(self.withdrawn),
        }
    }

    /// Records a withdrawal.
    ///
    /// Returns `false` if the stream is inactive or the amount would take
    /// `withdrawn` past `deposit`.
    pub(crate) fn record_withdrawal(&mut self, amount: Amount) -> bool {
        if !self.is_active {
            return false;
        }

        match self.withdrawn.checked_add(amount) {
            Some(total) if total <= self.deposit => {
                self.withdrawn = total;
                true
            }
            _ => false,
        }
    }

    /// Reverses a withdrawal recorded by an operation that is being rolled back.
    pub(crate) fn undo_withdrawal(&mut self, amount: Amount) {
        self.withdrawn = self.withdrawn.saturating_sub(amount);
    }

    /// Moves the stream into its terminal state.
    ///
    /// Returns `false` if the stream was already canceled.
    pub(crate) fn cancel(&mut self, settlement: Cancellation) -> bool {
        if !self.is_active {
            return false;
        }

        self.is_active = false;
        self.cancellation = Some(settlement);
        true
    }

    /// Reopens a stream whose cancellation is being rolled back.
    pub(crate) fn undo_cancel(&mut self) {
        self.is_active = true;
        self.cancellation = None;
    }

    /// Verifies the record-level invariants.
    pub fn check_invariant(&self) -> bool {
        if self.withdrawn > self.deposit || self.end_time <= self.start_time {
            return false;
        }

        match (self.is_active, self.cancellation) {
            (true, None) => true,
            (false, Some(c)) => {
                let settled = self
                    .withdrawn
                    .checked_add(c.refund_to_sender)
                    .and_then(|sum| sum.checked_add(c.payout_to_recipient));
                settled == Some(self.deposit)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(deposit: u128) -> Stream {
        Stream::new(
            0,
            Address::from("alice"),
            Address::from("bob"),
            Amount::new(deposit),
            0,
            100,
        )
    }

    #[test]
    fn test_new_stream_is_active_with_nothing_withdrawn() {
        let s = stream(1000);
        assert!(s.is_active);
        assert_eq!(s.withdrawn, Amount::ZERO);
        assert_eq!(s.cancellation, None);
        assert_eq!(s.duration(), 100);
        assert_eq!(s.outstanding(), Amount::new(1000));
        assert!(s.check_invariant());
    }

    #[test]
    fn test_record_withdrawal_accumulates() {
        let mut s = stream(1000);
        assert!(s.record_withdrawal(Amount::new(300)));
        assert!(s.record_withdrawal(Amount::new(200)));

        assert_eq!(s.withdrawn, Amount::new(500));
        assert_eq!(s.outstanding(), Amount::new(500));
        assert!(s.check_invariant());
    }

    #[test]
    fn test_record_withdrawal_refuses_to_exceed_deposit() {
        let mut s = stream(1000);
        assert!(s.record_withdrawal(Amount::new(900)));
        assert!(!s.record_withdrawal(Amount::new(101)));
        assert_eq!(s.withdrawn, Amount::new(900));
    }

    #[test]
    fn test_cancel_is_terminal() {
        let mut s = stream(1000);
        s.record_withdrawal(Amount::new(100));

        let settlement = Cancellation {
            canceled_at: 30,
            refund_to_sender: Amount::new(700),
            payout_to_recipient: Amount::new(200),
        };
        assert!(s.cancel(settlement));
        assert!(!s.is_active);
        assert_eq!(s.outstanding(), Amount::ZERO);
        assert!(s.check_invariant());

        assert!(!s.cancel(settlement));
        assert!(!s.record_withdrawal(Amount::new(1)));
        assert_eq!(s.withdrawn, Amount::new(100));
    }

    #[test]
    fn test_unbalanced_cancellation_breaks_invariant() {
        let mut s = stream(1000);
        s.cancel(Cancellation {
            canceled_at: 30,
            refund_to_sender: Amount::new(700),
            payout_to_recipient: Amount::new(299),
        });
        assert!(!s.check_invariant());
    }

    #[test]
    fn test_undo_restores_previous_state() {
        let mut s = stream(1000);
        s.record_withdrawal(Amount::new(250));
        s.undo_withdrawal(Amount::new(250));
        assert_eq!(s, stream(1000));

        s.cancel(Cancellation {
            canceled_at: 1,
            refund_to_sender: Amount::new(990),
            payout_to_recipient: Amount::new(10),
        });
        s.undo_cancel();
        assert_eq!(s, stream(1000));
    }
}
