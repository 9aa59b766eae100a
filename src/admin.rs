//! Ownership of the ledger.
//!
//! The owner is informational: no stream operation consults it.

use crate::address::Address;
use crate::error::{Result, StreamError};
use crate::events::Event;

#[derive(Debug, Clone)]
pub struct AdminFacet {
    owner: Address,
}

impl AdminFacet {
    /// Creates the facet with the deploying identity as owner.
    pub fn new(owner: Address) -> Self {
        AdminFacet { owner }
    }

    pub fn owner(&self) -> &Address {
        &self.owner
    }

    /// Hands ownership to `new_owner`.
    ///
    /// Returns the `OwnershipTransferred` event for the caller to publish.
    pub fn transfer_ownership(&mut self, caller: &Address, new_owner: Address) -> Result<Event> {
        if caller != &self.owner {
            return Err(StreamError::Unauthorized {
                caller: caller.clone(),
            });
        }
        if new_owner.is_null() {
            return Err(StreamError::InvalidParameters("new owner is the null address"));
        }

        let previous = std::mem::replace(&mut self.owner, new_owner);
        Ok(Event::OwnershipTransferred {
            previous,
            new: self.owner.clone(),
        })
    }
}
