// SPDX-License-Identifier: CC0-1.0

//! The per-block SRC-20 ledger string and its hash.
//!
//! For every balance row a block touched, one `tick,address,amt` entry is
//! emitted with the amount in canonical form, the entries sorted by
//! `tick_address` and joined with `;`. The SHA-256 of that string is the
//! block's ledger hash, comparable against external oracles byte for byte.

use sha2::{Digest, Sha256};
use types::tick::decode_unicode_escapes;
use types::decimal::format_amount;

use crate::balances::BalanceUpdate;

/// Builds the canonical balance string for a block's combined updates.
///
/// Ticks containing escape sequences are rendered in their unescaped form,
/// which is how they entered the wire format of the oracles.
pub fn canonical_balance_string(updates: &[BalanceUpdate]) -> String {
    let mut entries: Vec<(String, String)> = updates
        .iter()
        .map(|update| {
            let tick = if update.tick.contains('\\') {
                decode_unicode_escapes(&update.tick)
            } else {
                update.tick.clone()
            };
            let amt = format_amount(&update.final_amt());
            let key = format!("{}_{}", tick, update.address);
            (key, format!("{},{},{}", tick, update.address, amt))
        })
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries.into_iter().map(|(_, entry)| entry).collect::<Vec<_>>().join(";")
}

/// SHA-256 over the canonical balance string, hex encoded.
pub fn ledger_hash(balance_string: &str) -> String {
    hex::encode(Sha256::digest(balance_string.as_bytes()))
}
