//! Stream storage and per-address indices.
//!
//! Records live in an arena indexed by their dense id, so a committed id
//! always resolves to the same record. The registry applies no business
//! rules; the engine is its only mutator.

use crate::address::Address;
use crate::error::{Result, StreamError};
use crate::stream::{Stream, StreamId};
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct StreamRegistry {
    /// Stream records; the record for id `n` sits at index `n`.
    streams: Vec<Stream>,

    /// Ids funded by each sender, in creation order.
    by_sender: HashMap<Address, Vec<StreamId>>,

    /// Ids payable to each recipient, in creation order.
    by_recipient: HashMap<Address, Vec<StreamId>>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next created stream will receive.
    pub fn next_id(&self) -> StreamId {
        self.streams.len() as StreamId
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Stores a new record. Its id must be [`next_id`](Self::next_id).
    pub fn create(&mut self, stream: Stream) {
        debug_assert_eq!(stream.id, self.next_id(), "stream ids must be dense");
        self.streams.push(stream);
    }

    pub fn get(&self, id: StreamId) -> Result<&Stream> {
        usize::try_from(id)
            .ok()
            .and_then(|idx| self.streams.get(idx))
            .ok_or(StreamError::NotFound { id })
    }

    pub(crate) fn get_mut(&mut self, id: StreamId) -> Result<&mut Stream> {
        usize::try_from(id)
            .ok()
            .and_then(|idx| self.streams.get_mut(idx))
            .ok_or(StreamError::NotFound { id })
    }

    pub fn append_to_sender_index(&mut self, sender: &Address, id: StreamId) {
        self.by_sender.entry(sender.clone()).or_default().push(id);
    }

    pub fn append_to_recipient_index(&mut self, recipient: &Address, id: StreamId) {
        self.by_recipient.entry(recipient.clone()).or_default().push(id);
    }

    pub fn list_by_sender(&self, sender: &Address) -> &[StreamId] {
        self.by_sender.get(sender).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn list_by_recipient(&self, recipient: &Address) -> &[StreamId] {
        self.by_recipient
            .get(recipient)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Iterates over every record in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Stream> {
        self.streams.iter()
    }

    /// Drops the most recent record and its index entries.
    ///
    /// Only used to roll back a creation that never committed; committed
    /// records are never removed.
    pub(crate) fn discard_latest(&mut self, id: StreamId) {
        if self.streams.last().map(|s| s.id) != Some(id) {
            return;
        }

        if let Some(stream) = self.streams.pop() {
            pop_index(&mut self.by_sender, &stream.sender, id);
            pop_index(&mut self.by_recipient, &stream.recipient, id);
        }
    }
}

fn pop_index(index: &mut HashMap<Address, Vec<StreamId>>, address: &Address, id: StreamId) {
    if let Some(ids) = index.get_mut(address) {
        if ids.last() == Some(&id) {
            ids.pop();
        }
        if ids.is_empty() {
            index.remove(address);
        }
    }
}
