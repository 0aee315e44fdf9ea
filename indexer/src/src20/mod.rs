// SPDX-License-Identifier: CC0-1.0

//! The SRC-20 fungible-token subsystem.
//!
//! Three stages, run in order for every candidate payload:
//!
//! 1. [`check_format`] decides whether the payload is SRC-20 shaped at all.
//!    Failing here excludes the transaction from stamping entirely.
//! 2. [`validate`] normalizes fields and accumulates structured errors into
//!    the record's status. A failing record is still stored and still
//!    occupies its place in the shadow list.
//! 3. [`processor::process`] dispatches DEPLOY/MINT/TRANSFER against prior
//!    state and computes running balances without committing rows.

mod format;
pub mod processor;
pub mod svg;
mod validate;

pub use format::check_format;
pub use processor::{process, OpContext, ProcessOutcome};
pub use validate::{validate, Validated};
