// SPDX-License-Identifier: CC0-1.0

//! The stampd indexing engine.
//!
//! Turns an ordered stream of candidate transactions into derived consensus
//! state: numbered stamps, SRC-20 balances and the per-block hashes other
//! indexers can be compared against.
//!
//! The engine is single-writer by construction. Blocks go through
//! [`pipeline::Indexer::process_block`] strictly in height order and
//! transactions within a block in `tx_index` order; every consensus branch
//! consults the activation gate with the height passed down explicitly.
//! Decoding and validation failures downgrade individual records and never
//! abort a block. Only consistency violations (a balance driven negative, a
//! failed integrity check) surface as [`Error`].

mod error;

pub mod balances;
pub mod codec;
pub mod ledger;
pub mod messages;
pub mod pipeline;
pub mod src20;
pub mod store;

pub use crate::error::Error;
pub use crate::pipeline::{Block, BlockSummary, Indexer};

/// Crate-specific Result type.
///
/// Shorthand for `std::result::Result` with our crate-specific [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;
