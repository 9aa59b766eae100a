//! Domain events.
//!
//! Field order and presence are what off-ledger indexers read, so the
//! variants below must not be reordered or extended in place.

use crate::address::Address;
use crate::amount::Amount;
use crate::stream::{StreamId, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    StreamCreated {
        id: StreamId,
        sender: Address,
        recipient: Address,
        deposit: Amount,
        start_time: Timestamp,
        end_time: Timestamp,
    },
    Withdrawn {
        id: StreamId,
        recipient: Address,
        amount: Amount,
        total_withdrawn: Amount,
    },
    StreamCanceled {
        id: StreamId,
        sender: Address,
        refund_to_sender: Amount,
        payout_to_recipient: Amount,
    },
    OwnershipTransferred {
        previous: Address,
        new: Address,
    },
}

impl Event {
    /// The stream this event is about, if any.
    pub fn stream_id(&self) -> Option<StreamId> {
        match self {
            Event::StreamCreated { id, .. }
            | Event::Withdrawn { id, .. }
            | Event::StreamCanceled { id, .. } => Some(*id),
            Event::OwnershipTransferred { .. } => None,
        }
    }
}

/// Append-only event log.
///
/// Truncation is reserved for rolling back an operation that failed before
/// returning, so no caller ever observes an event that is later withdrawn.
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, event: Event) {
        log::debug!("emit {:?}", event);
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn as_slice(&self) -> &[Event] {
        &self.events
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.events.truncate(len);
    }
}
