// SPDX-License-Identifier: CC0-1.0

//! Persistent-state interfaces and the in-memory implementation.
//!
//! The engine only ever talks to storage through [`StateStore`] and
//! [`BlobStore`]. The in-memory [`MemoryStore`]/[`MemoryBlobStore`] pair
//! backs the daemon's replay mode and the test suite; a database-backed
//! implementation plugs in behind the same traits.

use std::collections::{HashMap, HashSet};

use bigdecimal::{BigDecimal, Zero};
use sha2::{Digest, Sha256};
use types::{BalanceRow, DeployRecord, Src20Metadata, Src20Record, StampRecord};

use crate::balances::BalanceUpdate;
use crate::{Error, Result};

/// Per-tick SVG background for rendered SRC-20 stamps.
#[derive(Clone, Debug)]
pub struct SrcBackground {
    /// `mime;base64,...` payload for the CSS background-image url.
    pub base64: String,
    /// Font size used in the rendered SVG, e.g. `30px`.
    pub font_size: String,
    /// CSS text color.
    pub text_color: String,
}

/// Per-block row recording the consensus artifacts.
#[derive(Clone, Debug)]
pub struct BlockRow {
    /// Block height.
    pub height: u64,
    /// Block timestamp, Unix seconds.
    pub time: u64,
    /// SHA-256 over the canonical balance string.
    pub ledger_hash: String,
    /// The canonical balance string itself.
    pub balance_string: String,
    /// SHA-256 over the block-messages stream.
    pub messages_hash: String,
    /// Set once the block has fully committed.
    pub indexed: bool,
}

/// The logical tables the engine reads and writes.
pub trait StateStore {
    /// Whether `cpid` already belongs to a numbered stamp.
    fn cpid_is_numbered(&self, cpid: &str) -> bool;

    /// Draws the next stamp number. BTC and cursed numbering advance
    /// independently; cursed numbers are returned negated.
    fn next_stamp_number(&mut self, cursed: bool) -> i64;

    /// Records a parsed stamp.
    fn insert_stamp(&mut self, stamp: &StampRecord);

    /// The accepted DEPLOY for `tick`, if any.
    fn deploy(&self, tick: &str) -> Option<DeployRecord>;

    /// Cumulative valid MINT total for `tick`.
    fn total_minted(&self, tick: &str) -> BigDecimal;

    /// Committed balance for a (tick, address) pair. Zero when absent.
    fn balance(&self, tick: &str, tick_hash: &str, address: &str) -> BigDecimal;

    /// Addresses holding a positive committed balance of `tick`.
    fn holders(&self, tick: &str) -> Vec<String>;

    /// Background art for rendered SRC-20 stamps of `tick`.
    fn background(&self, tick: &str) -> Option<SrcBackground>;

    /// Records a processed SRC-20 operation, valid or not.
    fn insert_src20(&mut self, record: &Src20Record);

    /// Records a valid SRC-20 operation.
    fn insert_src20_valid(&mut self, record: &Src20Record);

    /// Merges DEPLOY metadata: existing non-null columns win.
    fn upsert_metadata(&mut self, meta: &Src20Metadata);

    /// Applies one combined balance change, returning the prior amount.
    ///
    /// # Errors
    ///
    /// [`Error::NegativeBalance`] if the change would take the row below
    /// zero. Nothing is written in that case.
    fn apply_balance(&mut self, update: &BalanceUpdate, height: u64, time: u64)
        -> Result<BigDecimal>;

    /// Deletes rows whose amount reached zero.
    fn purge_zero_balances(&mut self);

    /// Records the per-block hashes and marks the block indexed.
    fn insert_block(&mut self, block: &BlockRow);

    /// Height of the last committed block.
    fn last_indexed(&self) -> Option<u64>;

    /// Startup sanity check over the stored state.
    fn verify_integrity(&self) -> Result<()>;
}

/// Content-addressed artifact storage.
pub trait BlobStore {
    /// Stores `data` under `filename`, returning the content hash.
    ///
    /// Idempotent: storing the same content twice yields the same hash.
    fn store(&mut self, filename: &str, data: &[u8], mime: Option<&str>) -> Result<String>;
}

/// In-memory [`StateStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    stamps: Vec<StampRecord>,
    numbered_cpids: HashSet<String>,
    btc_counter: u64,
    cursed_counter: u64,
    src20: Vec<Src20Record>,
    src20_valid: Vec<Src20Record>,
    deploys: HashMap<String, DeployRecord>,
    mint_totals: HashMap<String, BigDecimal>,
    balances: HashMap<String, BalanceRow>,
    metadata: HashMap<String, Src20Metadata>,
    backgrounds: HashMap<String, SrcBackground>,
    blocks: Vec<BlockRow>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self { Self::default() }

    /// All parsed stamps, in insertion order.
    pub fn stamps(&self) -> &[StampRecord] { &self.stamps }

    /// All processed SRC-20 operations, in insertion order.
    pub fn src20(&self) -> &[Src20Record] { &self.src20 }

    /// All valid SRC-20 operations, in insertion order.
    pub fn src20_valid(&self) -> &[Src20Record] { &self.src20_valid }

    /// Current balance rows, unordered.
    pub fn balances(&self) -> impl Iterator<Item = &BalanceRow> { self.balances.values() }

    /// Committed block rows, in height order.
    pub fn blocks(&self) -> &[BlockRow] { &self.blocks }

    /// DEPLOY metadata for `tick`, if present.
    pub fn metadata(&self, tick: &str) -> Option<&Src20Metadata> { self.metadata.get(tick) }

    /// Installs background art for a tick.
    pub fn set_background(&mut self, tick: &str, background: SrcBackground) {
        self.backgrounds.insert(tick.to_owned(), background);
    }
}

impl StateStore for MemoryStore {
    fn cpid_is_numbered(&self, cpid: &str) -> bool { self.numbered_cpids.contains(cpid) }

    fn next_stamp_number(&mut self, cursed: bool) -> i64 {
        if cursed {
            self.cursed_counter += 1;
            -(self.cursed_counter as i64)
        } else {
            let n = self.btc_counter;
            self.btc_counter += 1;
            n as i64
        }
    }

    fn insert_stamp(&mut self, stamp: &StampRecord) {
        if stamp.stamp_number.is_some() {
            self.numbered_cpids.insert(stamp.cpid.clone());
        }
        self.stamps.push(stamp.clone());
    }

    fn deploy(&self, tick: &str) -> Option<DeployRecord> { self.deploys.get(tick).cloned() }

    fn total_minted(&self, tick: &str) -> BigDecimal {
        self.mint_totals.get(tick).cloned().unwrap_or_else(BigDecimal::zero)
    }

    fn balance(&self, tick: &str, tick_hash: &str, address: &str) -> BigDecimal {
        match self.balances.get(&BalanceRow::id_for(tick, address)) {
            Some(row) if row.tick_hash == tick_hash => row.amt.clone(),
            _ => BigDecimal::zero(),
        }
    }

    fn holders(&self, tick: &str) -> Vec<String> {
        let mut holders: Vec<String> = self
            .balances
            .values()
            .filter(|row| row.tick == tick && row.amt > BigDecimal::zero())
            .map(|row| row.address.clone())
            .collect();
        holders.sort();
        holders
    }

    fn background(&self, tick: &str) -> Option<SrcBackground> { self.backgrounds.get(tick).cloned() }

    fn insert_src20(&mut self, record: &Src20Record) { self.src20.push(record.clone()); }

    fn insert_src20_valid(&mut self, record: &Src20Record) {
        match record.operation() {
            Some(types::Src20Op::Deploy) => {
                self.deploys.entry(record.tick.clone()).or_insert_with(|| DeployRecord {
                    tick: record.tick.clone(),
                    tick_hash: record.tick_hash.clone(),
                    max: record.max.clone().unwrap_or_else(BigDecimal::zero),
                    lim: record.lim.clone().unwrap_or_else(BigDecimal::zero),
                    dec: record.dec.unwrap_or(18),
                    block_height: record.block_height,
                    tx_hash: record.tx_hash.clone(),
                });
            }
            Some(types::Src20Op::Mint) => {
                if let Some(ref amt) = record.amt {
                    let total = self.mint_totals.entry(record.tick.clone()).or_default();
                    *total += amt.clone();
                }
            }
            _ => {}
        }
        self.src20_valid.push(record.clone());
    }

    fn upsert_metadata(&mut self, meta: &Src20Metadata) {
        let entry = self.metadata.entry(meta.tick.clone()).or_insert_with(|| Src20Metadata {
            tick: meta.tick.clone(),
            tick_hash: meta.tick_hash.clone(),
            deploy_block: meta.deploy_block,
            deploy_tx: meta.deploy_tx.clone(),
            ..Default::default()
        });
        if entry.description.is_none() {
            entry.description = meta.description.clone();
        }
        if entry.x.is_none() {
            entry.x = meta.x.clone();
        }
        if entry.tg.is_none() {
            entry.tg = meta.tg.clone();
        }
        if entry.web.is_none() {
            entry.web = meta.web.clone();
        }
        if entry.email.is_none() {
            entry.email = meta.email.clone();
        }
    }

    fn apply_balance(
        &mut self,
        update: &BalanceUpdate,
        height: u64,
        time: u64,
    ) -> Result<BigDecimal> {
        let id = BalanceRow::id_for(&update.tick, &update.address);
        let previous = self
            .balances
            .get(&id)
            .map(|row| row.amt.clone())
            .unwrap_or_else(BigDecimal::zero);
        let next = &previous + update.net_change();
        if next < BigDecimal::zero() {
            return Err(Error::NegativeBalance {
                tick: update.tick.clone(),
                address: update.address.clone(),
                amount: next,
            });
        }
        let row = self.balances.entry(id.clone()).or_insert_with(|| BalanceRow {
            id,
            tick: update.tick.clone(),
            tick_hash: update.tick_hash.clone(),
            address: update.address.clone(),
            amt: BigDecimal::zero(),
            locked_amt: BigDecimal::zero(),
            last_update: height,
            block_time: time,
        });
        row.amt = next;
        row.last_update = height;
        row.block_time = time;
        Ok(previous)
    }

    fn purge_zero_balances(&mut self) {
        self.balances.retain(|_, row| row.amt != BigDecimal::zero());
    }

    fn insert_block(&mut self, block: &BlockRow) { self.blocks.push(block.clone()); }

    fn last_indexed(&self) -> Option<u64> {
        self.blocks.iter().rev().find(|b| b.indexed).map(|b| b.height)
    }

    fn verify_integrity(&self) -> Result<()> {
        for row in self.balances.values() {
            if row.amt < BigDecimal::zero() {
                return Err(Error::IntegrityCheck(format!(
                    "negative balance stored for {}",
                    row.id
                )));
            }
        }
        for (tick, deploy) in &self.deploys {
            let minted = self.total_minted(tick);
            if minted > deploy.max {
                return Err(Error::IntegrityCheck(format!(
                    "tick {} minted {} over max {}",
                    tick, minted, deploy.max
                )));
            }
        }
        Ok(())
    }
}

/// In-memory [`BlobStore`]. Content hash is SHA-256 of the data.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    artifacts: HashMap<String, (String, Vec<u8>)>,
}

impl MemoryBlobStore {
    /// Creates an empty blob store.
    pub fn new() -> Self { Self::default() }

    /// The stored artifact under `filename`, as (content hash, bytes).
    pub fn artifact(&self, filename: &str) -> Option<&(String, Vec<u8>)> {
        self.artifacts.get(filename)
    }

    /// Number of stored artifacts.
    pub fn len(&self) -> usize { self.artifacts.len() }

    /// Whether nothing has been stored.
    pub fn is_empty(&self) -> bool { self.artifacts.is_empty() }
}

impl BlobStore for MemoryBlobStore {
    fn store(&mut self, filename: &str, data: &[u8], _mime: Option<&str>) -> Result<String> {
        let hash = hex::encode(Sha256::digest(data));
        self.artifacts.insert(filename.to_owned(), (hash.clone(), data.to_vec()));
        Ok(hash)
    }
}
