// SPDX-License-Identifier: CC0-1.0

//! Fatal indexing errors.
//!
//! Everything recoverable (bad base64, malformed JSON, rejected SRC-20
//! operations) is folded into record status during processing. What is left
//! here stops the block from committing.

use core::fmt;

use bigdecimal::BigDecimal;

/// A consistency violation. The current block must not be committed.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A balance commit would take a (tick, address) row below zero.
    NegativeBalance {
        /// Tick of the offending row.
        tick: String,
        /// Address of the offending row.
        address: String,
        /// The balance the commit would have produced.
        amount: BigDecimal,
    },
    /// The store failed its startup integrity check.
    IntegrityCheck(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::NegativeBalance { ref tick, ref address, ref amount } => write!(
                f,
                "balance for address {} in tick {} would go negative ({})",
                address, tick, amount
            ),
            Error::IntegrityCheck(ref msg) => write!(f, "integrity check failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}
