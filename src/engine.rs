//! Stream accounting engine.
//!
//! Creates streams, pays out vested amounts and settles cancellations. Every
//! operation applies all of its state changes first and queues the value
//! movements they imply; only then does the engine hand those movements to
//! the injected [`Transfer`]. A transfer that calls back into the engine
//! therefore always sees the updated ledger, and whatever the callback does
//! is queued behind the outer operation and settled through the same
//! transfer.
//!
//! Operations are all-or-nothing. The ledger keeps an undo journal; a failed
//! movement rewinds the journal (including anything reentrant calls did in
//! the meantime) and the transfer's own checkpoint before `TransferFailed` is
//! returned.

use crate::address::Address;
use crate::admin::AdminFacet;
use crate::amount::Amount;
use crate::clock::Clock;
use crate::error::{Result, StreamError};
use crate::events::{Event, EventLog};
use crate::registry::StreamRegistry;
use crate::stream::{Cancellation, Stream, StreamId, Timestamp};
use crate::transfer::Transfer;
use crate::vesting::{self, StreamStatus};
use log::{debug, warn};
use std::collections::VecDeque;

/// One reversible ledger mutation.
#[derive(Debug, Clone, Copy)]
enum Undo {
    Created { id: StreamId, deposit: Amount },
    Withdrew { id: StreamId, amount: Amount },
    Canceled { id: StreamId, released: Amount },
}

/// Value that has to move for the ledger's books to be true.
#[derive(Debug, Clone)]
enum Movement {
    /// Take a deposit from its sender into custody.
    Collect { from: Address, amount: Amount },
    /// Pay out of custody.
    Pay { to: Address, amount: Amount },
}

#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    journal: usize,
    events: usize,
}

/// Ledger state shared by top-level and reentrant calls.
#[derive(Debug, Default)]
pub(crate) struct Ledger {
    registry: StreamRegistry,

    /// Funds held on behalf of all streams.
    held: Amount,

    events: EventLog,

    /// Mutations not yet committed, oldest first.
    journal: Vec<Undo>,

    /// Movements already accounted for but not yet carried out.
    outbox: VecDeque<Movement>,
}

impl Ledger {
    fn create_stream(
        &mut self,
        sender: &Address,
        recipient: &Address,
        deposit: Amount,
        start_time: Timestamp,
        end_time: Timestamp,
    ) -> Result<StreamId> {
        if sender.is_null() {
            return Err(StreamError::InvalidParameters("sender is the null address"));
        }
        if recipient.is_null() {
            return Err(StreamError::InvalidParameters("recipient is the null address"));
        }
        if deposit.is_zero() {
            return Err(StreamError::InvalidParameters("deposit must be positive"));
        }
        if end_time <= start_time {
            return Err(StreamError::InvalidParameters(
                "end_time must be after start_time",
            ));
        }
        let held = self
            .held
            .checked_add(deposit)
            .ok_or(StreamError::InvalidParameters(
                "deposit overflows the ledger balance",
            ))?;

        let id = self.registry.next_id();
        self.registry.create(Stream::new(
            id,
            sender.clone(),
            recipient.clone(),
            deposit,
            start_time,
            end_time,
        ));
        self.registry.append_to_sender_index(sender, id);
        self.registry.append_to_recipient_index(recipient, id);
        self.held = held;
        self.journal.push(Undo::Created { id, deposit });
        self.outbox.push_back(Movement::Collect {
            from: sender.clone(),
            amount: deposit,
        });

        self.events.emit(Event::StreamCreated {
            id,
            sender: sender.clone(),
            recipient: recipient.clone(),
            deposit,
            start_time,
            end_time,
        });
        debug!(
            "Created stream {}: {} -> {}, {} over [{}, {})",
            id, sender, recipient, deposit, start_time, end_time
        );

        Ok(id)
    }

    fn withdraw(&mut self, now: Timestamp, id: StreamId, caller: &Address) -> Result<Amount> {
        let stream = self.registry.get(id)?;
        if &stream.recipient != caller {
            return Err(StreamError::Unauthorized {
                caller: caller.clone(),
            });
        }
        if !stream.is_active {
            return Err(StreamError::Inactive { id });
        }
        let amount = vesting::withdrawable(stream, now);
        if amount.is_zero() {
            return Err(StreamError::NothingDue { id });
        }
        let recipient = stream.recipient.clone();

        let stream = self.registry.get_mut(id)?;
        let recorded = stream.record_withdrawal(amount);
        debug_assert!(recorded, "withdrawable never exceeds the deposit");
        let total_withdrawn = stream.withdrawn;
        self.held = self.held.saturating_sub(amount);
        self.journal.push(Undo::Withdrew { id, amount });
        self.queue_payment(&recipient, amount);

        self.events.emit(Event::Withdrawn {
            id,
            recipient: recipient.clone(),
            amount,
            total_withdrawn,
        });
        debug!(
            "Stream {}: {} owed to {}, {} withdrawn in total",
            id, amount, recipient, total_withdrawn
        );

        Ok(amount)
    }

    fn cancel(&mut self, now: Timestamp, id: StreamId, caller: &Address) -> Result<Cancellation> {
        let stream = self.registry.get(id)?;
        if &stream.sender != caller {
            return Err(StreamError::Unauthorized {
                caller: caller.clone(),
            });
        }
        if !stream.is_active {
            return Err(StreamError::AlreadyInactive { id });
        }

        let vested = vesting::vested_amount(stream, now);
        let released = stream.deposit.saturating_sub(stream.withdrawn);
        let due_recipient = vested.saturating_sub(stream.withdrawn);
        let remaining = released.saturating_sub(due_recipient);
        debug_assert_eq!(
            due_recipient
                .checked_add(remaining)
                .and_then(|sum| sum.checked_add(stream.withdrawn)),
            Some(stream.deposit)
        );

        let settlement = Cancellation {
            canceled_at: now,
            refund_to_sender: remaining,
            payout_to_recipient: due_recipient,
        };
        let sender = stream.sender.clone();
        let recipient = stream.recipient.clone();

        let stream = self.registry.get_mut(id)?;
        let canceled = stream.cancel(settlement);
        debug_assert!(canceled, "checked active above");
        self.held = self.held.saturating_sub(released);
        self.journal.push(Undo::Canceled { id, released });
        self.queue_payment(&recipient, due_recipient);
        self.queue_payment(&sender, remaining);

        self.events.emit(Event::StreamCanceled {
            id,
            sender: sender.clone(),
            refund_to_sender: remaining,
            payout_to_recipient: due_recipient,
        });
        debug!(
            "Stream {} canceled by {}: refund {}, payout {}",
            id, sender, remaining, due_recipient
        );

        Ok(settlement)
    }

    fn queue_payment(&mut self, to: &Address, amount: Amount) {
        if !amount.is_zero() {
            self.outbox.push_back(Movement::Pay {
                to: to.clone(),
                amount,
            });
        }
    }

    /// Carries out every queued movement, including those queued by
    /// reentrant calls while earlier payouts were in flight.
    ///
    /// This is the only place the engine calls into the [`Transfer`]. On the
    /// first failure both the transfer and the ledger are rewound, the ledger
    /// to `checkpoint`.
    fn settle(
        &mut self,
        clock: &dyn Clock,
        transfer: &mut dyn Transfer,
        checkpoint: Checkpoint,
    ) -> Result<()> {
        let transfer_checkpoint = transfer.checkpoint();

        while let Some(movement) = self.outbox.pop_front() {
            let result = match &movement {
                Movement::Collect { from, amount } => transfer.collect(from, *amount),
                Movement::Pay { to, amount } => {
                    let mut reentry = Reentry {
                        ledger: &mut *self,
                        clock,
                    };
                    transfer.transfer(&mut reentry, to, *amount)
                }
            };

            if let Err(e) = result {
                warn!("{:?} failed, rolling back: {}", movement, e);
                transfer.revert_to(transfer_checkpoint);
                self.revert_to(checkpoint);
                return Err(StreamError::TransferFailed(e));
            }
        }

        Ok(())
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            journal: self.journal.len(),
            events: self.events.len(),
        }
    }

    /// Rewinds to `checkpoint` and drops every queued movement.
    fn revert_to(&mut self, checkpoint: Checkpoint) {
        self.outbox.clear();

        while self.journal.len() > checkpoint.journal {
            let Some(undo) = self.journal.pop() else {
                break;
            };

            match undo {
                Undo::Created { id, deposit } => {
                    self.registry.discard_latest(id);
                    self.held = self.held.saturating_sub(deposit);
                }
                Undo::Withdrew { id, amount } => {
                    if let Ok(stream) = self.registry.get_mut(id) {
                        stream.undo_withdrawal(amount);
                    }
                    self.held = self.held.saturating_add(amount);
                }
                Undo::Canceled { id, released } => {
                    if let Ok(stream) = self.registry.get_mut(id) {
                        stream.undo_cancel();
                    }
                    self.held = self.held.saturating_add(released);
                }
            }
        }

        self.events.truncate(checkpoint.events);
    }

    fn commit(&mut self) {
        self.journal.clear();
    }

    fn now_view<T>(
        &self,
        id: StreamId,
        now: Timestamp,
        view: fn(&Stream, Timestamp) -> T,
    ) -> Result<T> {
        self.registry.get(id).map(|stream| view(stream, now))
    }

    fn check_invariants(&self) -> bool {
        let mut outstanding = Amount::ZERO;
        for stream in self.registry.iter() {
            if !stream.check_invariant() {
                return false;
            }
            match outstanding.checked_add(stream.outstanding()) {
                Some(sum) => outstanding = sum,
                None => return false,
            }
        }
        outstanding == self.held
    }
}

/// Handle through which a [`Transfer`] may call back into the engine while a
/// payout is in flight.
///
/// Reentrant calls run against the same ledger as the outer operation. Their
/// effects are visible immediately, but the value they move is queued and
/// delivered by the engine's own transfer before the outer operation
/// returns. If any of it fails, the outer operation fails and everything is
/// rolled back together.
pub struct Reentry<'a> {
    ledger: &'a mut Ledger,
    clock: &'a dyn Clock,
}

impl Reentry<'_> {
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Opens a stream; `deposit` is collected from `sender` once the current
    /// payout returns.
    pub fn create_stream(
        &mut self,
        sender: &Address,
        recipient: &Address,
        deposit: Amount,
        start_time: Timestamp,
        end_time: Timestamp,
    ) -> Result<StreamId> {
        self.ledger
            .create_stream(sender, recipient, deposit, start_time, end_time)
    }

    /// Records a withdrawal and queues its payout.
    pub fn withdraw(&mut self, id: StreamId, caller: &Address) -> Result<Amount> {
        let now = self.clock.now();
        self.ledger.withdraw(now, id, caller)
    }

    /// Cancels the stream and queues both legs of the settlement.
    pub fn cancel(&mut self, id: StreamId, caller: &Address) -> Result<Cancellation> {
        let now = self.clock.now();
        self.ledger.cancel(now, id, caller)
    }

    pub fn stream(&self, id: StreamId) -> Result<&Stream> {
        self.ledger.registry.get(id)
    }

    pub fn withdrawable(&self, id: StreamId) -> Result<Amount> {
        self.ledger
            .now_view(id, self.clock.now(), vesting::withdrawable)
    }

    pub fn contract_balance(&self) -> Amount {
        self.ledger.held
    }
}

/// The stream ledger.
///
/// Owns the stream state together with the capabilities it depends on: a
/// [`Clock`] for the current time, a [`Transfer`] that collects deposits and
/// delivers payouts, and an [`AdminFacet`] for ownership. Each public method
/// is one atomic operation.
///
/// # Example
///
/// ```
/// use stream_ledger::{AdminFacet, Address, Amount, BalanceBook, ManualClock, StreamEngine};
///
/// let (alice, bob) = (Address::from("alice"), Address::from("bob"));
/// let mut book = BalanceBook::new();
/// book.credit(&alice, Amount::new(1000));
///
/// let mut engine = StreamEngine::new(
///     AdminFacet::new(Address::from("admin")),
///     ManualClock::new(0),
///     book,
/// );
///
/// let id = engine.create_stream(&alice, &bob, Amount::new(1000), 0, 100).unwrap();
/// assert_eq!(engine.transfer().balance_of(&alice), Amount::ZERO);
///
/// engine.clock().advance_to(50);
/// assert_eq!(engine.withdraw(id, &bob).unwrap(), Amount::new(500));
/// assert_eq!(engine.transfer().balance_of(&bob), Amount::new(500));
/// ```
pub struct StreamEngine<C: Clock, T: Transfer> {
    ledger: Ledger,
    admin: AdminFacet,
    clock: C,
    transfer: T,
}

impl<C: Clock, T: Transfer> StreamEngine<C, T> {
    pub fn new(admin: AdminFacet, clock: C, transfer: T) -> Self {
        StreamEngine {
            ledger: Ledger::default(),
            admin,
            clock,
            transfer,
        }
    }

    /// Opens a stream funded by `deposit`, collected from `sender` through
    /// the transfer as part of this call.
    ///
    /// If the deposit cannot be collected the stream is never created and
    /// the call fails with `TransferFailed`.
    pub fn create_stream(
        &mut self,
        sender: &Address,
        recipient: &Address,
        deposit: Amount,
        start_time: Timestamp,
        end_time: Timestamp,
    ) -> Result<StreamId> {
        self.execute(|ledger, _| {
            ledger.create_stream(sender, recipient, deposit, start_time, end_time)
        })
    }

    /// Pays everything vested but not yet withdrawn to the recipient.
    pub fn withdraw(&mut self, id: StreamId, caller: &Address) -> Result<Amount> {
        self.execute(|ledger, now| ledger.withdraw(now, id, caller))
    }

    /// Ends the stream, splitting what is left between recipient and sender.
    pub fn cancel(&mut self, id: StreamId, caller: &Address) -> Result<Cancellation> {
        self.execute(|ledger, now| ledger.cancel(now, id, caller))
    }

    pub fn transfer_ownership(&mut self, caller: &Address, new_owner: Address) -> Result<()> {
        let event = self.admin.transfer_ownership(caller, new_owner)?;
        debug!("Ownership transferred: {:?}", event);
        self.ledger.events.emit(event);
        Ok(())
    }

    pub fn vested_amount(&self, id: StreamId) -> Result<Amount> {
        self.ledger
            .now_view(id, self.clock.now(), vesting::vested_amount)
    }

    pub fn withdrawable(&self, id: StreamId) -> Result<Amount> {
        self.ledger
            .now_view(id, self.clock.now(), vesting::withdrawable)
    }

    pub fn refundable(&self, id: StreamId) -> Result<Amount> {
        self.ledger.now_view(id, self.clock.now(), vesting::refundable)
    }

    pub fn status(&self, id: StreamId) -> Result<StreamStatus> {
        self.ledger.now_view(id, self.clock.now(), vesting::status)
    }

    pub fn stream(&self, id: StreamId) -> Result<&Stream> {
        self.ledger.registry.get(id)
    }

    /// All streams in id order.
    pub fn streams(&self) -> impl Iterator<Item = &Stream> {
        self.ledger.registry.iter()
    }

    pub fn stream_count(&self) -> u64 {
        self.ledger.registry.next_id()
    }

    pub fn list_by_sender(&self, sender: &Address) -> &[StreamId] {
        self.ledger.registry.list_by_sender(sender)
    }

    pub fn list_by_recipient(&self, recipient: &Address) -> &[StreamId] {
        self.ledger.registry.list_by_recipient(recipient)
    }

    /// Total funds held on behalf of all streams.
    pub fn contract_balance(&self) -> Amount {
        self.ledger.held
    }

    pub fn owner(&self) -> &Address {
        self.admin.owner()
    }

    pub fn events(&self) -> &[Event] {
        self.ledger.events.as_slice()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn transfer(&self) -> &T {
        &self.transfer
    }

    pub fn transfer_mut(&mut self) -> &mut T {
        &mut self.transfer
    }

    /// Verifies every stream invariant plus `held == sum of outstanding deposits`.
    pub fn check_invariants(&self) -> bool {
        self.ledger.check_invariants()
    }

    /// Runs one atomic operation: apply its effects, settle the movements
    /// they queued, then commit whatever the outcome.
    fn execute<R>(
        &mut self,
        operation: impl FnOnce(&mut Ledger, Timestamp) -> Result<R>,
    ) -> Result<R> {
        let checkpoint = self.ledger.checkpoint();
        let result = match operation(&mut self.ledger, self.clock.now()) {
            Ok(value) => self
                .ledger
                .settle(&self.clock, &mut self.transfer, checkpoint)
                .map(|()| value),
            Err(e) => {
                self.ledger.revert_to(checkpoint);
                Err(e)
            }
        };
        self.commit();
        result
    }

    fn commit(&mut self) {
        self.ledger.commit();
        self.transfer.commit();
    }
}
