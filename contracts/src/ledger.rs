//! # Ledger Collaborator
//!
//! The escrow never holds money itself. Every value movement is a batch of
//! [`Transfer`]s handed to a [`Ledger`], which must apply the whole batch
//! or none of it. The ledger is also the only clock the escrow reads, so a
//! transition's guards and its settlement see the same `now`.
//!
//! [`InMemoryLedger`] is the reference implementation: balances in a map,
//! a manually driven clock, and a switch to simulate an outage.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use hashdrop_protocol::crypto::Address;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::order::OrderId;

/// Errors reported by a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The debited account cannot cover the transfer.
    #[error("insufficient funds in {account}: need {needed}, have {available}")]
    InsufficientFunds {
        account: String,
        needed: u64,
        available: u64,
    },

    /// A credit would overflow the account balance.
    #[error("balance overflow in {account}")]
    Overflow { account: String },

    /// The ledger could not be reached or refused to answer.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// A ledger account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum Account {
    /// Custody account of a single order.
    Escrow(OrderId),
    /// Protocol fee sink.
    Treasury,
    /// Insurance fee sink; also receives forfeited collateral.
    InsurancePool,
    /// A party's own balance.
    Party(Address),
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Account::Escrow(id) => write!(f, "escrow:{id}"),
            Account::Treasury => f.write_str("treasury"),
            Account::InsurancePool => f.write_str("insurance"),
            Account::Party(a) => write!(f, "party:{}", &a.to_hex()[..16]),
        }
    }
}

/// One value movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub from: Account,
    pub to: Account,
    pub amount: u64,
}

impl Transfer {
    pub fn new(from: Account, to: Account, amount: u64) -> Self {
        Self { from, to, amount }
    }
}

/// Value-transfer substrate.
pub trait Ledger: Send + Sync {
    /// Current ledger time, unix seconds. Never goes backwards.
    fn now(&self) -> u64;

    /// Apply every transfer in order, or none of them.
    fn settle(&self, transfers: &[Transfer]) -> Result<(), LedgerError>;

    /// Current balance of `account`.
    fn balance(&self, account: &Account) -> u64;
}

/// In-process ledger with a manual clock.
#[derive(Debug)]
pub struct InMemoryLedger {
    clock: AtomicU64,
    balances: Mutex<HashMap<Account, u64>>,
    offline: AtomicBool,
}

impl InMemoryLedger {
    pub fn new(start_time: u64) -> Self {
        Self {
            clock: AtomicU64::new(start_time),
            balances: Mutex::new(HashMap::new()),
            offline: AtomicBool::new(false),
        }
    }

    /// Credit `amount` out of thin air. Test and demo funding only.
    pub fn mint(&self, account: Account, amount: u64) {
        let mut balances = self.balances.lock();
        let entry = balances.entry(account).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Move the clock forward to `t`. Earlier values are ignored.
    pub fn set_time(&self, t: u64) {
        self.clock.fetch_max(t, Ordering::SeqCst);
    }

    /// Advance the clock by `secs`.
    pub fn advance(&self, secs: u64) {
        self.clock.fetch_add(secs, Ordering::SeqCst);
    }

    /// While offline every settlement fails with [`LedgerError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Sum of all balances. Constant across settlements.
    pub fn total_supply(&self) -> u128 {
        self.balances.lock().values().map(|v| *v as u128).sum()
    }
}

impl Ledger for InMemoryLedger {
    fn now(&self) -> u64 {
        self.clock.load(Ordering::SeqCst)
    }

    fn settle(&self, transfers: &[Transfer]) -> Result<(), LedgerError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("in-memory ledger is offline".into()));
        }

        let mut balances = self.balances.lock();

        // Stage every touched account, commit only if all transfers apply.
        let mut staged: HashMap<Account, u64> = HashMap::new();
        for t in transfers {
            let from_bal = *staged
                .entry(t.from)
                .or_insert_with(|| balances.get(&t.from).copied().unwrap_or(0));
            let remaining = from_bal
                .checked_sub(t.amount)
                .ok_or_else(|| LedgerError::InsufficientFunds {
                    account: t.from.to_string(),
                    needed: t.amount,
                    available: from_bal,
                })?;
            staged.insert(t.from, remaining);

            let to_bal = *staged
                .entry(t.to)
                .or_insert_with(|| balances.get(&t.to).copied().unwrap_or(0));
            let credited = to_bal
                .checked_add(t.amount)
                .ok_or_else(|| LedgerError::Overflow {
                    account: t.to.to_string(),
                })?;
            staged.insert(t.to, credited);
        }

        balances.extend(staged);
        Ok(())
    }

    fn balance(&self, account: &Account) -> u64 {
        self.balances.lock().get(account).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Account {
        Account::Party(Address::from_bytes([1; 32]))
    }

    fn bob() -> Account {
        Account::Party(Address::from_bytes([2; 32]))
    }

    #[test]
    fn settle_moves_value() {
        let ledger = InMemoryLedger::new(0);
        ledger.mint(alice(), 100);
        ledger
            .settle(&[Transfer::new(alice(), Account::Escrow(OrderId(1)), 60)])
            .unwrap();
        assert_eq!(ledger.balance(&alice()), 40);
        assert_eq!(ledger.balance(&Account::Escrow(OrderId(1))), 60);
    }

    #[test]
    fn batch_is_all_or_nothing() {
        let ledger = InMemoryLedger::new(0);
        ledger.mint(alice(), 100);
        let err = ledger
            .settle(&[
                Transfer::new(alice(), bob(), 70),
                Transfer::new(alice(), Account::Treasury, 70),
            ])
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { needed: 70, available: 30, .. }));
        assert_eq!(ledger.balance(&alice()), 100);
        assert_eq!(ledger.balance(&bob()), 0);
    }

    #[test]
    fn chained_transfers_see_staged_balances() {
        let ledger = InMemoryLedger::new(0);
        ledger.mint(alice(), 10);
        ledger
            .settle(&[
                Transfer::new(alice(), bob(), 10),
                Transfer::new(bob(), Account::Treasury, 10),
            ])
            .unwrap();
        assert_eq!(ledger.balance(&Account::Treasury), 10);
        assert_eq!(ledger.total_supply(), 10);
    }

    #[test]
    fn offline_ledger_rejects() {
        let ledger = InMemoryLedger::new(0);
        ledger.mint(alice(), 10);
        ledger.set_offline(true);
        assert!(matches!(
            ledger.settle(&[Transfer::new(alice(), bob(), 1)]),
            Err(LedgerError::Unavailable(_))
        ));
        ledger.set_offline(false);
        assert!(ledger.settle(&[Transfer::new(alice(), bob(), 1)]).is_ok());
    }

    #[test]
    fn clock_is_monotonic() {
        let ledger = InMemoryLedger::new(1_000);
        ledger.advance(5);
        assert_eq!(ledger.now(), 1_005);
        ledger.set_time(10);
        assert_eq!(ledger.now(), 1_005);
        ledger.set_time(2_000);
        assert_eq!(ledger.now(), 2_000);
    }
}
