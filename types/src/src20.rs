// SPDX-License-Identifier: CC0-1.0

//! SRC-20 operation records, deploys, balances and status codes.

use core::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use serde::Serialize;

/// The protocol tag every SRC-20 payload must carry.
pub const PROTOCOL: &str = "SRC-20";

/// An SRC-20 operation kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Src20Op {
    /// Create a tick with immutable max/lim/dec.
    Deploy,
    /// Credit freshly minted supply to the destination.
    Mint,
    /// Move balance from creator to destination.
    Transfer,
    /// Fan a transfer out to every holder of a tick. Reserved.
    BulkTransfer,
}

impl fmt::Display for Src20Op {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match *self {
            Src20Op::Deploy => "DEPLOY",
            Src20Op::Mint => "MINT",
            Src20Op::Transfer => "TRANSFER",
            Src20Op::BulkTransfer => "BULK_XFER",
        };
        f.write_str(s)
    }
}

/// Error parsing an operation keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownOpError(pub String);

impl fmt::Display for UnknownOpError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unknown SRC-20 op: {}", self.0)
    }
}

impl std::error::Error for UnknownOpError {}

impl FromStr for Src20Op {
    type Err = UnknownOpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DEPLOY" => Ok(Src20Op::Deploy),
            "MINT" => Ok(Src20Op::Mint),
            "TRANSFER" => Ok(Src20Op::Transfer),
            "BULK_XFER" => Ok(Src20Op::BulkTransfer),
            other => Err(UnknownOpError(other.to_owned())),
        }
    }
}

/// Outcome code attached to a processed SRC-20 operation.
///
/// The code prefixes the `status` string of the stored record. Codes marked
/// invalid drop the operation from balance accounting; the clamp codes keep
/// it with an adjusted amount.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum StatusCode {
    /// A DEPLOY for the tick already exists.
    DeployExists,
    /// MINT or TRANSFER against a tick that was never deployed.
    NoDeploy,
    /// The tick is fully minted.
    OverMint,
    /// MINT or TRANSFER without an amount.
    MissingAmount,
    /// Amount clamped down to the remaining supply.
    ClampedToSupply,
    /// Amount clamped down to the per-mint cap.
    ClampedToLimit,
    /// Creator balance below the transfer amount.
    InsufficientBalance,
    /// Operation keyword not recognized or not active.
    UnsupportedOp,
    /// Amount carries more fractional digits than the deploy allows.
    DecimalOverflow,
}

impl StatusCode {
    /// Two-letter wire code.
    pub const fn code(self) -> &'static str {
        match self {
            StatusCode::DeployExists => "DE",
            StatusCode::NoDeploy => "ND",
            StatusCode::OverMint => "OM",
            StatusCode::MissingAmount => "NA",
            StatusCode::ClampedToSupply => "OMA",
            StatusCode::ClampedToLimit => "ODL",
            StatusCode::InsufficientBalance => "BB",
            StatusCode::UnsupportedOp => "UO",
            StatusCode::DecimalOverflow => "ID",
        }
    }

    /// Whether the code invalidates the operation.
    pub const fn invalidates(self) -> bool {
        !matches!(self, StatusCode::ClampedToSupply | StatusCode::ClampedToLimit)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { f.write_str(self.code()) }
}

/// A processed SRC-20 operation, valid or not.
///
/// Invalid operations are stored too; the shadow list and the `src20` table
/// keep every processed record so numbering and presentation stay
/// deterministic.
#[derive(Clone, Debug)]
pub struct Src20Record {
    /// Normalized (escaped lowercase) tick.
    pub tick: String,
    /// SHA3-256 of the lowercased tick.
    pub tick_hash: String,
    /// Protocol tag, uppercased.
    pub p: String,
    /// Operation keyword, uppercased.
    pub op: String,
    /// DEPLOY: maximum supply, floored to an integer.
    pub max: Option<BigDecimal>,
    /// DEPLOY: per-mint limit, floored to an integer.
    pub lim: Option<BigDecimal>,
    /// MINT/TRANSFER: amount, possibly clamped during processing.
    pub amt: Option<BigDecimal>,
    /// DEPLOY: fractional digits allowed, in `[0, 18]`.
    pub dec: Option<u32>,
    /// BULK_XFER: tick whose holders receive the fan-out.
    pub holders_of: Option<String>,
    /// Validation and processing outcome, `CODE: message` form.
    pub status: Option<String>,
    /// Whether the operation passed processing.
    pub valid: bool,
    /// Address that signed the operation.
    pub creator: String,
    /// Receiving address.
    pub destination: String,
    /// Height of the block containing the operation.
    pub block_height: u64,
    /// Block timestamp, Unix seconds.
    pub block_time: u64,
    /// Transaction id, hex.
    pub tx_hash: String,
    /// Position of the transaction within its block.
    pub tx_index: u32,
    /// MINT: cumulative minted total after this operation.
    pub total_minted: Option<BigDecimal>,
    /// Running creator balance after this operation.
    pub total_balance_creator: Option<BigDecimal>,
    /// Running destination balance after this operation.
    pub total_balance_destination: Option<BigDecimal>,
    /// DEPLOY metadata: free-form description.
    pub description: Option<String>,
    /// DEPLOY metadata: X / Twitter handle.
    pub x: Option<String>,
    /// DEPLOY metadata: Telegram handle.
    pub tg: Option<String>,
    /// DEPLOY metadata: web site.
    pub web: Option<String>,
    /// DEPLOY metadata: contact email.
    pub email: Option<String>,
}

impl Src20Record {
    /// The operation keyword parsed into [`Src20Op`], if recognized.
    pub fn operation(&self) -> Option<Src20Op> { self.op.parse().ok() }
}

/// The immutable parameters of an accepted DEPLOY.
#[derive(Clone, Debug, PartialEq)]
pub struct DeployRecord {
    /// Normalized tick.
    pub tick: String,
    /// SHA3-256 of the lowercased tick.
    pub tick_hash: String,
    /// Maximum supply.
    pub max: BigDecimal,
    /// Per-mint limit.
    pub lim: BigDecimal,
    /// Fractional digits allowed.
    pub dec: u32,
    /// Height of the deploying block.
    pub block_height: u64,
    /// Deploying transaction id.
    pub tx_hash: String,
}

/// DEPLOY-time metadata, upsert-merged on the optional columns.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Src20Metadata {
    /// Normalized tick.
    pub tick: String,
    /// SHA3-256 of the lowercased tick.
    pub tick_hash: String,
    /// Free-form description.
    pub description: Option<String>,
    /// X / Twitter handle.
    pub x: Option<String>,
    /// Telegram handle.
    pub tg: Option<String>,
    /// Web site.
    pub web: Option<String>,
    /// Contact email.
    pub email: Option<String>,
    /// Height of the deploying block.
    pub deploy_block: u64,
    /// Deploying transaction id.
    pub deploy_tx: String,
}

/// A persistent balance row, keyed by `tick_address`.
#[derive(Clone, Debug)]
pub struct BalanceRow {
    /// Row id: `tick` ∥ `_` ∥ `address`.
    pub id: String,
    /// Normalized tick.
    pub tick: String,
    /// SHA3-256 of the lowercased tick.
    pub tick_hash: String,
    /// Holder address.
    pub address: String,
    /// Current balance. Never negative after commit.
    pub amt: BigDecimal,
    /// Locked portion of the balance. Not yet used by any operation.
    pub locked_amt: BigDecimal,
    /// Height of the last block that touched the row.
    pub last_update: u64,
    /// Timestamp of the last block that touched the row.
    pub block_time: u64,
}

impl BalanceRow {
    /// Builds the row id for a (tick, address) pair.
    pub fn id_for(tick: &str, address: &str) -> String { format!("{}_{}", tick, address) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_round_trip() {
        for (s, op) in [
            ("deploy", Src20Op::Deploy),
            ("MINT", Src20Op::Mint),
            ("Transfer", Src20Op::Transfer),
            ("bulk_xfer", Src20Op::BulkTransfer),
        ] {
            assert_eq!(s.parse::<Src20Op>().unwrap(), op);
        }
        assert!("BURN".parse::<Src20Op>().is_err());
    }

    #[test]
    fn clamp_codes_do_not_invalidate() {
        assert!(!StatusCode::ClampedToSupply.invalidates());
        assert!(!StatusCode::ClampedToLimit.invalidates());
        assert!(StatusCode::OverMint.invalidates());
        assert!(StatusCode::InsufficientBalance.invalidates());
    }
}
