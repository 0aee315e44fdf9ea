// SPDX-License-Identifier: CC0-1.0

//! The block-messages stream.
//!
//! Every DML statement against a non-skipped table contributes one
//! canonical entry, in execution order; the SHA-256 over the concatenated
//! entries is the block's messages hash. Fields belonging to features that
//! have not activated yet are stripped from the bindings first, so the hash
//! is stable across the activation boundary.

use serde_json::Value;
use sha2::{Digest, Sha256};
use types::{enabled, Feature};

/// Tables whose mutations never enter the stream.
pub const SKIP_TABLES: &[&str] = &[
    "blocks",
    "transactions",
    "balances",
    "messages",
    "mempool",
    "assets",
    "new_sends",
    "new_issuances",
];

/// Accumulates the canonical DML stream for one block.
#[derive(Debug)]
pub struct BlockMessages {
    height: u64,
    entries: Vec<String>,
}

impl BlockMessages {
    /// Starts an empty stream for the block at `height`.
    pub fn new(height: u64) -> Self { BlockMessages { height, entries: Vec::new() } }

    /// Records one DML statement.
    ///
    /// Skipped tables are ignored. `asset_longname` is stripped from
    /// `issuances` bindings until subassets activate, and `memo` from
    /// `sends` bindings until enhanced sends activate. Bindings are
    /// serialized as a JSON array of `[key, value]` pairs in key order.
    pub fn record(&mut self, command: &str, category: &str, bindings: &[(String, Value)]) {
        if SKIP_TABLES.contains(&category) {
            return;
        }
        let mut bindings: Vec<&(String, Value)> = bindings
            .iter()
            .filter(|(key, _)| !self.redacted(category, key))
            .collect();
        bindings.sort_by(|a, b| a.0.cmp(&b.0));
        let serialized =
            serde_json::to_string(&bindings).unwrap_or_else(|_| "[]".to_owned());
        self.entries.push(format!("{}{}{}", command, category, serialized));
    }

    fn redacted(&self, category: &str, key: &str) -> bool {
        (category == "issuances"
            && key == "asset_longname"
            && !enabled(Feature::Subassets, self.height))
            || (category == "sends"
                && key == "memo"
                && !enabled(Feature::EnhancedSends, self.height))
    }

    /// The entries recorded so far, in execution order.
    pub fn entries(&self) -> &[String] { &self.entries }

    /// SHA-256 over the concatenated entries, hex encoded.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for entry in &self.entries {
            hasher.update(entry.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}
