// SPDX-License-Identifier: CC0-1.0

//! Stamp records and the transaction candidates they are parsed from.

use core::fmt;

use serde::Serialize;

/// Protocol identifier assigned during classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Ident {
    /// A plain image stamp.
    Stamp,
    /// An SRC-20 fungible-token operation.
    Src20,
    /// An SRC-721 collection operation.
    Src721,
    /// Nothing recognizable.
    Unknown,
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match *self {
            Ident::Stamp => "STAMP",
            Ident::Src20 => "SRC-20",
            Ident::Src721 => "SRC-721",
            Ident::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Outcome of base64 handling for a stamp payload.
///
/// Mapping payloads never went through base64 at all, which is a distinct
/// state from a string that failed to decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Base64Validity {
    /// The string satisfied the active decoding rules.
    Valid,
    /// The string failed charset or length validation.
    Invalid,
    /// There was no base64 string to judge.
    NotApplicable,
}

/// A transaction surfaced by the upstream metadata layer.
///
/// Fields the upstream may provide directly (`cpid`, `asset_longname`,
/// `description`) can also appear inside the payload mapping; the mapping
/// value wins when both are present.
#[derive(Clone, Debug)]
pub struct Candidate {
    /// Height of the block containing the transaction.
    pub block_height: u64,
    /// Block timestamp, Unix seconds.
    pub block_time: u64,
    /// Position of the transaction within its block.
    pub tx_index: u32,
    /// Transaction id, hex.
    pub tx_hash: String,
    /// Funding address.
    pub source: String,
    /// First non-source output address, if any.
    pub destination: String,
    /// Whether the transaction burns a recognized multisig key.
    pub keyburn: bool,
    /// Whether every output of the transaction is OP_RETURN.
    pub op_return: bool,
    /// Raw payload bytes from the metadata layer.
    pub data: Vec<u8>,
    /// Upstream-assigned asset identifier.
    pub cpid: Option<String>,
    /// Upstream subasset name.
    pub asset_longname: Option<String>,
    /// Upstream description field.
    pub description: Option<String>,
}

/// A fully classified stamp, immutable once the parse completes.
#[derive(Clone, Debug, Serialize)]
pub struct StampRecord {
    /// Assigned stamp number. Positive for BTC stamps, negative for cursed,
    /// absent for unnumbered records.
    pub stamp_number: Option<i64>,
    /// Height of the block containing the transaction.
    pub block_height: u64,
    /// Block timestamp, Unix seconds.
    pub block_time: u64,
    /// Position of the transaction within its block.
    pub tx_index: u32,
    /// Transaction id, hex.
    pub tx_hash: String,
    /// Asset identifier: upstream-provided, the asset longname for cursed
    /// reissues, or the derived base62 digest.
    pub cpid: String,
    /// Address that created the stamp.
    pub creator: String,
    /// Address the stamp was sent to.
    pub destination: String,
    /// Protocol classification.
    pub ident: Ident,
    /// Whether the record counts as a numbered BTC stamp.
    pub is_btc_stamp: bool,
    /// Whether the record is cursed (recorded but outside BTC numbering).
    pub is_cursed: bool,
    /// Base64 handling outcome.
    pub is_valid_base64: Base64Validity,
    /// The original base64 string, when the payload carried one.
    pub stamp_base64: Option<String>,
    /// Decoded token JSON for SRC-20/SRC-721 records.
    pub src_data: Option<serde_json::Value>,
    /// File suffix the artifact was stored under.
    pub file_suffix: Option<String>,
    /// MIME type derived from the suffix.
    pub mime_type: Option<String>,
    /// Content hash of the stored artifact.
    pub file_hash: Option<String>,
    /// Public URL of the stored artifact.
    pub stamp_url: Option<String>,
    /// Keyburn flag carried over from the transaction.
    pub keyburn: bool,
}

/// The slice of a stamp that same-block processing needs to see.
///
/// Only numbered BTC stamps enter this list; it drives reissue detection
/// and SRC-721 asset lookups within the block.
#[derive(Clone, Debug)]
pub struct ValidStamp {
    /// Assigned stamp number.
    pub stamp_number: i64,
    /// Transaction id, hex.
    pub tx_hash: String,
    /// Asset identifier.
    pub cpid: String,
    /// Base64 handling outcome.
    pub is_valid_base64: Base64Validity,
    /// The original base64 string, when present.
    pub stamp_base64: Option<String>,
    /// Whether the record is cursed.
    pub is_cursed: bool,
    /// Decoded token JSON, when present.
    pub src_data: Option<serde_json::Value>,
}
