// SPDX-License-Identifier: CC0-1.0

//! SRC-20 operation dispatch.
//!
//! Operations are processed strictly in transaction order. Balance and
//! mint-total lookups overlay the block's shadow list on top of the
//! persistent store, so an operation always sees the effects of everything
//! before it in the same block without any row having been committed.

use std::collections::HashMap;

use bigdecimal::{BigDecimal, Zero};
use serde_json::{Map, Value};
use types::decimal::fractional_digits;
use types::{enabled, DeployRecord, Feature, Src20Metadata, Src20Record, StatusCode};

use crate::src20::validate;
use crate::store::StateStore;

/// Transaction context an operation record is built from.
#[derive(Clone, Debug)]
pub struct OpContext {
    /// Address that signed the operation.
    pub creator: String,
    /// Receiving address.
    pub destination: String,
    /// Height of the containing block.
    pub block_height: u64,
    /// Block timestamp, Unix seconds.
    pub block_time: u64,
    /// Transaction id, hex.
    pub tx_hash: String,
    /// Position within the block.
    pub tx_index: u32,
}

/// What processing one operation produced.
#[derive(Clone, Debug)]
pub struct ProcessOutcome {
    /// The processed record, valid or not.
    pub record: Src20Record,
    /// Metadata row to upsert for an accepted DEPLOY.
    pub metadata: Option<Src20Metadata>,
    /// TRANSFER records synthesized by BULK_XFER expansion.
    pub synthesized: Vec<Src20Record>,
}

/// Read-only view of token state as of the current transaction: the shadow
/// list first, the persistent store second.
struct RunningState<'a, S: StateStore + ?Sized> {
    store: &'a S,
    shadow: &'a [Src20Record],
}

impl<'a, S: StateStore + ?Sized> RunningState<'a, S> {
    /// The effective DEPLOY for `tick`, if one exists.
    ///
    /// A deploy whose max and lim are both zero behaves as if it did not
    /// exist, which is also how a fresh DEPLOY distinguishes itself from a
    /// duplicate.
    fn deploy(&self, tick: &str) -> Option<DeployRecord> {
        for record in self.shadow.iter().rev() {
            if record.valid && record.op == "DEPLOY" && record.tick == tick {
                return effective(DeployRecord {
                    tick: record.tick.clone(),
                    tick_hash: record.tick_hash.clone(),
                    max: record.max.clone().unwrap_or_else(BigDecimal::zero),
                    lim: record.lim.clone().unwrap_or_else(BigDecimal::zero),
                    dec: record.dec.unwrap_or(18),
                    block_height: record.block_height,
                    tx_hash: record.tx_hash.clone(),
                });
            }
        }
        self.store.deploy(tick).and_then(effective)
    }

    /// Cumulative mint total for `tick` as of this point in the block.
    fn mint_total(&self, tick: &str, cache: &mut HashMap<String, BigDecimal>) -> BigDecimal {
        for record in self.shadow.iter().rev() {
            if record.tick == tick && record.op == "MINT" {
                if let Some(ref total) = record.total_minted {
                    return total.clone();
                }
            }
        }
        cache
            .entry(tick.to_owned())
            .or_insert_with(|| self.store.total_minted(tick))
            .clone()
    }

    /// Running balance of `address` for `tick` as of this point in the block.
    fn balance(&self, tick: &str, tick_hash: &str, address: &str) -> BigDecimal {
        for record in self.shadow.iter().rev().filter(|r| r.valid) {
            if record.tick != tick || record.tick_hash != tick_hash {
                continue;
            }
            if record.creator == address {
                if let Some(ref balance) = record.total_balance_creator {
                    return balance.clone();
                }
            }
            if record.destination == address {
                if let Some(ref balance) = record.total_balance_destination {
                    return balance.clone();
                }
            }
        }
        self.store.balance(tick, tick_hash, address)
    }
}

fn effective(deploy: DeployRecord) -> Option<DeployRecord> {
    if deploy.max.is_zero() && deploy.lim.is_zero() {
        None
    } else {
        Some(deploy)
    }
}

fn set_status(record: &mut Src20Record, code: StatusCode, message: String) {
    record.status = Some(format!("{}: {}", code.code(), message));
    if code.invalidates() {
        record.valid = false;
        log::warn!("{}", message);
    } else {
        log::info!("{}", message);
    }
}

fn build_record(
    validated: &validate::Validated,
    map: &Map<String, Value>,
    ctx: &OpContext,
) -> Src20Record {
    let text = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_owned);
    Src20Record {
        tick: validated.tick.clone().unwrap_or_default(),
        tick_hash: validated.tick_hash.clone().unwrap_or_default(),
        p: validated.p.clone().unwrap_or_default(),
        op: validated.op.clone().unwrap_or_default(),
        max: validated.max.clone(),
        lim: validated.lim.clone(),
        amt: validated.amt.clone(),
        dec: validated.dec,
        holders_of: validated.holders_of.clone(),
        status: validated.status.clone(),
        valid: false,
        creator: ctx.creator.clone(),
        destination: ctx.destination.clone(),
        block_height: ctx.block_height,
        block_time: ctx.block_time,
        tx_hash: ctx.tx_hash.clone(),
        tx_index: ctx.tx_index,
        total_minted: None,
        total_balance_creator: None,
        total_balance_destination: None,
        description: text("desc"),
        x: text("x"),
        tg: text("tg"),
        web: text("web"),
        email: text("email"),
    }
}

/// Processes one SRC-20 payload against prior state.
///
/// The caller appends the returned record (and any synthesized records) to
/// the shadow list regardless of validity, stores it, and upserts the
/// metadata row when present.
pub fn process<S: StateStore + ?Sized>(
    store: &S,
    shadow: &[Src20Record],
    mint_cache: &mut HashMap<String, BigDecimal>,
    map: &Map<String, Value>,
    ctx: &OpContext,
) -> ProcessOutcome {
    let validated = validate(map);
    let mut record = build_record(&validated, map, ctx);
    let mut outcome_metadata = None;
    let mut synthesized = Vec::new();

    if !validated.is_valid() {
        log::warn!(
            "Invalid {} SRC20: {}",
            record.tick,
            record.status.as_deref().unwrap_or("")
        );
        return ProcessOutcome { record, metadata: None, synthesized };
    }

    let running = RunningState { store, shadow };
    let op = record.op.clone();
    let needs_amt = op == "TRANSFER" || op == "MINT";

    if needs_amt && record.amt.as_ref().map_or(true, BigDecimal::is_zero) {
        let message = format!("INVALID AMT {} {}", op, record.tick);
        set_status(&mut record, StatusCode::MissingAmount, message);
        return ProcessOutcome { record, metadata: None, synthesized };
    }

    let deploy = running.deploy(&record.tick);
    if deploy.is_none() && needs_amt {
        let message = format!("INVALID {}: {} NO DEPLOY", op, record.tick);
        set_status(&mut record, StatusCode::NoDeploy, message);
        return ProcessOutcome { record, metadata: None, synthesized };
    }

    match op.as_str() {
        "DEPLOY" => outcome_metadata = handle_deploy(&mut record, deploy, map),
        "MINT" => {
            let deploy = deploy.expect("checked above for amt-bearing ops");
            handle_mint(&mut record, &deploy, &running, mint_cache);
        }
        "TRANSFER" => {
            let deploy = deploy.expect("checked above for amt-bearing ops");
            handle_transfer(&mut record, &deploy, &running);
        }
        "BULK_XFER" if enabled(Feature::BulkTransfers, ctx.block_height) => {
            synthesized = handle_bulk_transfer(&mut record, deploy, &running, store);
        }
        other => {
            let message = format!("UNSUPPORTED OP {}", other);
            set_status(&mut record, StatusCode::UnsupportedOp, message);
        }
    }

    ProcessOutcome { record, metadata: outcome_metadata, synthesized }
}

fn handle_deploy(
    record: &mut Src20Record,
    existing: Option<DeployRecord>,
    map: &Map<String, Value>,
) -> Option<Src20Metadata> {
    if existing.is_some() {
        let message = format!("INVALID DEPLOY: {} DEPLOY EXISTS", record.tick);
        set_status(record, StatusCode::DeployExists, message);
        return None;
    }
    if record.dec.is_none() {
        record.dec = Some(18);
    }
    record.valid = true;
    let text = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_owned);
    Some(Src20Metadata {
        tick: record.tick.clone(),
        tick_hash: record.tick_hash.clone(),
        description: text("desc"),
        x: text("x"),
        tg: text("tg"),
        web: text("web"),
        email: text("email"),
        deploy_block: record.block_height,
        deploy_tx: record.tx_hash.clone(),
    })
}

fn handle_mint<S: StateStore + ?Sized>(
    record: &mut Src20Record,
    deploy: &DeployRecord,
    running: &RunningState<S>,
    mint_cache: &mut HashMap<String, BigDecimal>,
) {
    let per_mint_cap = if !deploy.lim.is_zero() && !deploy.max.is_zero() {
        deploy.lim.clone().min(deploy.max.clone())
    } else {
        BigDecimal::zero()
    };

    let total_minted = running.mint_total(&record.tick, mint_cache);
    if total_minted >= deploy.max {
        let message =
            format!("OVER MINT {} {} >= {}", record.tick, total_minted, deploy.max);
        set_status(record, StatusCode::OverMint, message);
        return;
    }

    let mint_available = &deploy.max - &total_minted;
    let mut amt = record.amt.clone().unwrap_or_else(BigDecimal::zero);
    if amt > mint_available {
        let message =
            format!("REDUCED AMT {} FROM: {} TO: {}", record.tick, amt, mint_available);
        set_status(record, StatusCode::ClampedToSupply, message);
        amt = mint_available;
    }
    if amt > per_mint_cap {
        let message =
            format!("REDUCED AMT {} FROM: {} TO: {}", record.tick, amt, per_mint_cap);
        set_status(record, StatusCode::ClampedToLimit, message);
        amt = per_mint_cap;
    }

    let amt = amt.normalized();
    let decimal_length = fractional_digits(&amt);
    if decimal_length > deploy.dec {
        let message = format!(
            "INVALID DECIMAL {} - decimal len {} > {}",
            record.tick, decimal_length, deploy.dec
        );
        set_status(record, StatusCode::DecimalOverflow, message);
        return;
    }

    let destination_balance =
        running.balance(&record.tick, &record.tick_hash, &record.destination);
    record.total_minted = Some(&total_minted + &amt);
    record.total_balance_destination = Some(&destination_balance + &amt);
    record.dec = Some(deploy.dec);
    *mint_cache.entry(record.tick.clone()).or_insert_with(BigDecimal::zero) += amt.clone();
    record.amt = Some(amt);
    record.valid = true;
}

fn handle_transfer<S: StateStore + ?Sized>(
    record: &mut Src20Record,
    deploy: &DeployRecord,
    running: &RunningState<S>,
) {
    let creator_balance =
        running.balance(&record.tick, &record.tick_hash, &record.creator);
    let destination_balance = if record.creator == record.destination {
        creator_balance.clone()
    } else {
        running.balance(&record.tick, &record.tick_hash, &record.destination)
    };

    let amt = record.amt.clone().unwrap_or_else(BigDecimal::zero);
    if creator_balance < amt {
        let message = format!(
            "INVALID XFR {} - total_balance {} < xfer amt {}",
            record.tick, creator_balance, amt
        );
        set_status(record, StatusCode::InsufficientBalance, message);
        return;
    }

    let amt = amt.normalized();
    let decimal_length = fractional_digits(&amt);
    if decimal_length > deploy.dec {
        let message = format!(
            "INVALID DECIMAL {} - decimal len {} > {}",
            record.tick, decimal_length, deploy.dec
        );
        set_status(record, StatusCode::DecimalOverflow, message);
        return;
    }

    record.total_balance_creator = Some(&creator_balance - &amt);
    record.total_balance_destination = Some(&destination_balance + &amt);
    record.dec = Some(deploy.dec);
    record.amt = Some(amt);
    record.valid = true;
}

/// BULK_XFER expansion. Reserved: the gate never fires on mainnet, but the
/// dispatch shape is fixed so activation is a one-line table change.
fn handle_bulk_transfer<S: StateStore + ?Sized>(
    record: &mut Src20Record,
    deploy: Option<DeployRecord>,
    running: &RunningState<S>,
    store: &S,
) -> Vec<Src20Record> {
    if deploy.is_none() {
        log::info!("Invalid {} BULK_XFER - deployment limits not set", record.tick);
        return Vec::new();
    }
    let Some(holders_of) = record.holders_of.clone() else {
        log::info!("Invalid {} BULK_XFER - missing holders_of", record.tick);
        return Vec::new();
    };
    let holders_of = holders_of.to_lowercase();
    if running.deploy(&holders_of).is_none() {
        log::warn!("Invalid {} BULK_XFER - invalid holders_of", record.tick);
        return Vec::new();
    }

    let creator_balance =
        running.balance(&record.tick, &record.tick_hash, &record.creator);
    if creator_balance <= BigDecimal::zero() {
        log::info!("Invalid {} BULK_XFER - insufficient balance", record.tick);
        return Vec::new();
    }

    let amt = record.amt.clone().unwrap_or_else(BigDecimal::zero);
    let holders: Vec<String> = store
        .holders(&holders_of)
        .into_iter()
        .filter(|address| *address != record.creator)
        .collect();
    let total_send = BigDecimal::from(holders.len() as u64) * &amt;
    if total_send > creator_balance {
        let message = format!(
            "INVALID XFR {} - total_balance {} < xfer amt {}",
            record.tick, creator_balance, total_send
        );
        set_status(record, StatusCode::InsufficientBalance, message);
        return Vec::new();
    }

    let synthesized = holders
        .iter()
        .map(|holder| {
            let mut transfer = record.clone();
            transfer.op = "TRANSFER".to_owned();
            transfer.destination = holder.clone();
            transfer.total_balance_destination = Some(
                running.balance(&record.tick, &record.tick_hash, holder) + &amt,
            );
            transfer.valid = true;
            transfer
        })
        .collect();

    record.total_balance_creator = Some(&creator_balance - &total_send);
    record.status = Some(format!("New Balance: {}", &creator_balance - &total_send));
    record.valid = true;
    synthesized
}
