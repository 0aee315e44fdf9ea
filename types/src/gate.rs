// SPDX-License-Identifier: CC0-1.0

//! The protocol activation gate.
//!
//! Every consensus-sensitive branch in the indexer asks this table whether a
//! feature is live at a given block height. The table is part of the
//! protocol, not configuration: changing an entry forks the chain of derived
//! state.
//!
//! Gates that were originally expressed as strict inequalities are
//! normalized here to `height >= activation`, so the predicate is uniform.

use core::fmt;

/// A consensus feature with a fixed mainnet activation height.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Feature {
    /// `asset_longname` participates in the block-messages hash.
    Subassets,
    /// `memo` participates in the block-messages hash.
    EnhancedSends,
    /// Base64 padding repair stops; strings must decode as given.
    Base64RepairEnd,
    /// The metadata layer stops carrying SRC-20 operations.
    Src20End,
    /// The `BMN` file signature is recognized.
    Bmn,
    /// MIME sniffing left-strips leading whitespace first.
    StripWhitespace,
    /// Strict base64 charset validation; numeric digit-stripping ends.
    P2wsh,
    /// BULK_XFER dispatch. Reserved, never activates.
    BulkTransfers,
}

impl Feature {
    /// The mainnet block height at which the feature becomes active.
    pub const fn activation_height(self) -> u64 {
        match self {
            Feature::Subassets => 467_417,
            Feature::EnhancedSends => 489_956,
            Feature::Base64RepairEnd => 784_551,
            Feature::Src20End => 796_000,
            Feature::Bmn => 793_069,
            Feature::StripWhitespace => 797_201,
            Feature::P2wsh => 833_000,
            Feature::BulkTransfers => u64::MAX,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match *self {
            Feature::Subassets => "subassets",
            Feature::EnhancedSends => "enhanced_sends",
            Feature::Base64RepairEnd => "base64_repair_end",
            Feature::Src20End => "src20_end",
            Feature::Bmn => "bmn",
            Feature::StripWhitespace => "strip_whitespace",
            Feature::P2wsh => "p2wsh",
            Feature::BulkTransfers => "bulk_transfers",
        };
        f.write_str(s)
    }
}

/// Returns `true` if `feature` is active at `height`.
pub const fn enabled(feature: Feature, height: u64) -> bool {
    height >= feature.activation_height()
}
