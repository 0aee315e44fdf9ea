// SPDX-License-Identifier: CC0-1.0

//! End-of-block balance folding.
//!
//! A block's valid SRC-20 effects are combined per (tick, tick_hash,
//! address) in encounter order and committed in one pass. The combined
//! updates also carry the pre-commit amounts, which is what the ledger
//! string is built from.

use bigdecimal::{BigDecimal, Zero};
use types::{Src20Op, Src20Record};

use crate::store::StateStore;
use crate::Result;

/// One combined balance change for a (tick, address) pair.
#[derive(Clone, Debug)]
pub struct BalanceUpdate {
    /// Normalized tick.
    pub tick: String,
    /// SHA3-256 of the lowercased tick.
    pub tick_hash: String,
    /// Affected address.
    pub address: String,
    /// Sum of credits within the block.
    pub credit: BigDecimal,
    /// Sum of debits within the block.
    pub debit: BigDecimal,
    /// Committed amount before this block. Filled in by [`commit`].
    pub original_amt: BigDecimal,
}

impl BalanceUpdate {
    fn new(record: &Src20Record, address: &str) -> Self {
        BalanceUpdate {
            tick: record.tick.clone(),
            tick_hash: record.tick_hash.clone(),
            address: address.to_owned(),
            credit: BigDecimal::zero(),
            debit: BigDecimal::zero(),
            original_amt: BigDecimal::zero(),
        }
    }

    /// Net effect of the block on the row.
    pub fn net_change(&self) -> BigDecimal { &self.credit - &self.debit }

    /// Row amount after commit.
    pub fn final_amt(&self) -> BigDecimal { &self.original_amt + self.net_change() }
}

fn entry<'a>(
    updates: &'a mut Vec<BalanceUpdate>,
    record: &Src20Record,
    address: &str,
) -> &'a mut BalanceUpdate {
    let position = updates.iter().position(|u| {
        u.tick == record.tick && u.tick_hash == record.tick_hash && u.address == address
    });
    match position {
        Some(i) => &mut updates[i],
        None => {
            updates.push(BalanceUpdate::new(record, address));
            updates.last_mut().expect("just pushed")
        }
    }
}

/// Combines a block's valid SRC-20 effects into per-row updates.
///
/// MINT credits the destination (the creator may be a mint service);
/// TRANSFER debits the creator and credits the destination. Encounter order
/// is preserved, which keeps the commit deterministic.
pub fn fold(shadow: &[Src20Record]) -> Vec<BalanceUpdate> {
    let mut updates = Vec::new();
    for record in shadow.iter().filter(|r| r.valid) {
        let Some(ref amt) = record.amt else { continue };
        match record.operation() {
            Some(Src20Op::Mint) => {
                entry(&mut updates, record, &record.destination).credit += amt.clone();
            }
            Some(Src20Op::Transfer) => {
                entry(&mut updates, record, &record.creator).debit += amt.clone();
                entry(&mut updates, record, &record.destination).credit += amt.clone();
            }
            _ => {}
        }
    }
    updates
}

/// Commits combined updates, recording each row's prior amount, then purges
/// rows that reached zero.
///
/// # Errors
///
/// [`crate::Error::NegativeBalance`] if any row would go below zero; the
/// block must not be committed in that case.
pub fn commit<S: StateStore>(
    store: &mut S,
    updates: &mut [BalanceUpdate],
    height: u64,
    time: u64,
) -> Result<()> {
    for update in updates.iter_mut() {
        update.original_amt = store.apply_balance(update, height, time)?;
    }
    store.purge_zero_balances();
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::store::MemoryStore;

    fn record(op: &str, tick: &str, creator: &str, destination: &str, amt: &str) -> Src20Record {
        Src20Record {
            tick: tick.to_owned(),
            tick_hash: format!("hash-{}", tick),
            p: "SRC-20".to_owned(),
            op: op.to_owned(),
            max: None,
            lim: None,
            amt: Some(BigDecimal::from_str(amt).unwrap()),
            dec: Some(18),
            holders_of: None,
            status: None,
            valid: true,
            creator: creator.to_owned(),
            destination: destination.to_owned(),
            block_height: 800_000,
            block_time: 1_700_000_000,
            tx_hash: "deadbeef".to_owned(),
            tx_index: 0,
            total_minted: None,
            total_balance_creator: None,
            total_balance_destination: None,
            description: None,
            x: None,
            tg: None,
            web: None,
            email: None,
        }
    }

    #[test]
    fn combines_per_address_in_encounter_order() {
        let shadow = vec![
            record("MINT", "dogs", "svc", "alice", "60"),
            record("MINT", "dogs", "svc", "bob", "40"),
            record("TRANSFER", "dogs", "alice", "bob", "10"),
        ];
        let updates = fold(&shadow);
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].address, "alice");
        assert_eq!(updates[0].net_change(), BigDecimal::from(50));
        assert_eq!(updates[1].address, "bob");
        assert_eq!(updates[1].net_change(), BigDecimal::from(50));
    }

    #[test]
    fn invalid_records_do_not_move_balances() {
        let mut bad = record("TRANSFER", "dogs", "alice", "bob", "10");
        bad.valid = false;
        assert!(fold(&[bad]).is_empty());
    }

    #[test]
    fn commit_refuses_negative_rows() {
        let mut store = MemoryStore::new();
        let shadow = vec![record("TRANSFER", "dogs", "alice", "bob", "10")];
        let mut updates = fold(&shadow);
        assert!(commit(&mut store, &mut updates, 800_000, 1_700_000_000).is_err());
    }

    #[test]
    fn commit_records_prior_amounts_and_purges_zeros() {
        let mut store = MemoryStore::new();
        let mut first = fold(&[record("MINT", "dogs", "svc", "alice", "60")]);
        commit(&mut store, &mut first, 800_000, 1_700_000_000).unwrap();

        let mut second = fold(&[record("TRANSFER", "dogs", "alice", "bob", "60")]);
        commit(&mut store, &mut second, 800_001, 1_700_000_600).unwrap();
        let alice = second.iter().find(|u| u.address == "alice").unwrap();
        assert_eq!(alice.original_amt, BigDecimal::from(60));
        assert_eq!(alice.final_amt(), BigDecimal::from(0));

        // Alice's row went to zero and must be gone.
        assert_eq!(store.balances().count(), 1);
    }
}
