// SPDX-License-Identifier: CC0-1.0

//! Data model and consensus primitives for the stamp protocol indexer.
//!
//! Everything in this crate is pure data or pure functions over data. The
//! activation table, the decimal rules and the tick normalization here are
//! consensus: two indexers that disagree on any of them will diverge on
//! stamp numbering and on the per-block ledger hash.

mod error;

pub mod decimal;
pub mod gate;
pub mod src20;
pub mod stamp;
pub mod tick;

#[doc(inline)]
pub use self::{
    gate::{enabled, Feature},
    src20::{BalanceRow, DeployRecord, Src20Metadata, Src20Op, Src20Record, StatusCode},
    stamp::{Base64Validity, Candidate, Ident, StampRecord, ValidStamp},
};
