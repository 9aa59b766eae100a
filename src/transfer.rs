//! Value movement in and out of the ledger's custody.
//!
//! The engine never moves money itself. It asks a [`Transfer`] implementation
//! to collect deposits and deliver payouts. Either may fail, and a payout may
//! call back into the engine through the [`Reentry`] handle it receives.

use crate::address::Address;
use crate::amount::Amount;
use crate::engine::Reentry;
use crate::error::TransferError;
use log::debug;
use std::collections::{HashMap, HashSet};

/// A best-effort payment primitive.
///
/// Implementations that keep their own state should also implement the
/// checkpoint hooks: the engine takes a checkpoint before the first movement
/// of an operation and reverts to it if a later one fails, so a two-legged
/// settlement never ends up half-delivered.
pub trait Transfer {
    /// Pays `amount` to `to`.
    fn transfer(
        &mut self,
        reentry: &mut Reentry<'_>,
        to: &Address,
        amount: Amount,
    ) -> std::result::Result<(), TransferError>;

    /// Takes `amount` from `from` into the ledger's custody.
    fn collect(
        &mut self,
        from: &Address,
        amount: Amount,
    ) -> std::result::Result<(), TransferError>;

    /// Marks a point that [`revert_to`](Self::revert_to) can rewind to.
    fn checkpoint(&mut self) -> usize {
        0
    }

    /// Undoes every payment delivered since `checkpoint` was taken.
    fn revert_to(&mut self, _checkpoint: usize) {}

    /// Makes everything delivered so far permanent.
    fn commit(&mut self) {}
}

/// External account balances kept in memory.
///
/// Payments into a blocked address are rejected, which is how scenarios and
/// tests simulate a payee that refuses funds.
#[derive(Debug, Default, Clone)]
pub struct BalanceBook {
    balances: HashMap<Address, Amount>,
    blocked: HashSet<Address>,

    /// Previous balances, newest last, for rolling back uncommitted changes.
    journal: Vec<(Address, Option<Amount>)>,
}

impl BalanceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(Amount::ZERO)
    }

    /// Adds funds to `account`.
    ///
    /// Returns `false` if the balance would overflow.
    pub fn credit(&mut self, account: &Address, amount: Amount) -> bool {
        let Some(updated) = self.balance_of(account).checked_add(amount) else {
            return false;
        };
        self.set(account, updated);
        true
    }

    /// Removes funds from `account`.
    pub fn debit(
        &mut self,
        account: &Address,
        amount: Amount,
    ) -> std::result::Result<(), TransferError> {
        let available = self.balance_of(account);
        let Some(updated) = available.checked_sub(amount) else {
            return Err(TransferError::InsufficientFunds {
                account: account.clone(),
                needed: amount,
                available,
            });
        };
        self.set(account, updated);
        Ok(())
    }

    pub fn block(&mut self, account: Address) {
        self.blocked.insert(account);
    }

    pub fn unblock(&mut self, account: &Address) {
        self.blocked.remove(account);
    }

    pub fn is_blocked(&self, account: &Address) -> bool {
        self.blocked.contains(account)
    }

    /// All known balances sorted by address.
    pub fn balances(&self) -> Vec<(&Address, Amount)> {
        let mut balances: Vec<_> = self.balances.iter().map(|(a, b)| (a, *b)).collect();
        balances.sort_by(|a, b| a.0.cmp(b.0));
        balances
    }

    fn set(&mut self, account: &Address, amount: Amount) {
        let previous = self.balances.insert(account.clone(), amount);
        self.journal.push((account.clone(), previous));
    }
}

impl Transfer for BalanceBook {
    fn transfer(
        &mut self,
        _reentry: &mut Reentry<'_>,
        to: &Address,
        amount: Amount,
    ) -> std::result::Result<(), TransferError> {
        if self.is_blocked(to) || !self.credit(to, amount) {
            debug!("payment of {} to {} rejected", amount, to);
            return Err(TransferError::Rejected { to: to.clone() });
        }
        Ok(())
    }

    fn collect(
        &mut self,
        from: &Address,
        amount: Amount,
    ) -> std::result::Result<(), TransferError> {
        self.debit(from, amount).map_err(|e| {
            debug!("collection of {} from {} refused", amount, from);
            e
        })
    }

    fn checkpoint(&mut self) -> usize {
        self.journal.len()
    }

    fn revert_to(&mut self, checkpoint: usize) {
        while self.journal.len() > checkpoint {
            let Some((account, previous)) = self.journal.pop() else {
                break;
            };
            match previous {
                Some(amount) => self.balances.insert(account, amount),
                None => self.balances.remove(&account),
            };
        }
    }

    fn commit(&mut self) {
        self.journal.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Address {
        Address::from("alice")
    }

    #[test]
    fn test_credit_and_debit() {
        let mut book = BalanceBook::new();
        assert!(book.credit(&alice(), Amount::new(100)));
        book.debit(&alice(), Amount::new(40)).unwrap();
        assert_eq!(book.balance_of(&alice()), Amount::new(60));
    }

    #[test]
    fn test_debit_insufficient_funds() {
        let mut book = BalanceBook::new();
        book.credit(&alice(), Amount::new(10));

        let err = book.debit(&alice(), Amount::new(11)).unwrap_err();
        assert_eq!(
            err,
            TransferError::InsufficientFunds {
                account: alice(),
                needed: Amount::new(11),
                available: Amount::new(10),
            }
        );
        assert_eq!(book.balance_of(&alice()), Amount::new(10));
    }

    #[test]
    fn test_credit_overflow_is_refused() {
        let mut book = BalanceBook::new();
        book.credit(&alice(), Amount::MAX);
        assert!(!book.credit(&alice(), Amount::new(1)));
        assert_eq!(book.balance_of(&alice()), Amount::MAX);
    }

    #[test]
    fn test_revert_to_checkpoint() {
        let mut book = BalanceBook::new();
        book.credit(&alice(), Amount::new(5));
        book.commit();

        let checkpoint = book.checkpoint();
        book.credit(&alice(), Amount::new(10));
        book.credit(&Address::from("bob"), Amount::new(7));
        book.revert_to(checkpoint);

        assert_eq!(book.balance_of(&alice()), Amount::new(5));
        assert_eq!(book.balance_of(&Address::from("bob")), Amount::ZERO);
        assert_eq!(book.balances().len(), 1);
    }

    #[test]
    fn test_collect_is_reverted_with_checkpoint() {
        let mut book = BalanceBook::new();
        book.credit(&alice(), Amount::new(50));
        book.commit();

        let checkpoint = book.checkpoint();
        book.collect(&alice(), Amount::new(30)).unwrap();
        assert_eq!(book.balance_of(&alice()), Amount::new(20));
        assert!(book.collect(&alice(), Amount::new(21)).is_err());

        book.revert_to(checkpoint);
        assert_eq!(book.balance_of(&alice()), Amount::new(50));
    }

    #[test]
    fn test_balances_sorted_by_address() {
        let mut book = BalanceBook::new();
        book.credit(&Address::from("carol"), Amount::new(3));
        book.credit(&Address::from("alice"), Amount::new(1));
        book.credit(&Address::from("bob"), Amount::new(2));

        let order: Vec<_> = book.balances().iter().map(|(a, _)| a.as_str().to_string()).collect();
        assert_eq!(order, vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn test_block_and_unblock() {
        let mut book = BalanceBook::new();
        book.block(alice());
        assert!(book.is_blocked(&alice()));
        book.unblock(&alice());
        assert!(!book.is_blocked(&alice()));
    }
}
