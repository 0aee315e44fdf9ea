// SPDX-License-Identifier: CC0-1.0

//! Fixed-precision decimal handling for SRC-20 numeric fields.
//!
//! Amounts are arbitrary-precision base-10 fractions. The parser rejects
//! scientific notation outright: `1e3` never becomes `1000`, at any block
//! height. Quantization always rounds down.

use core::fmt;
use std::str::FromStr;

use bigdecimal::{BigDecimal, RoundingMode, Zero};

use crate::error::write_err;

/// The largest number of fractional digits a DEPLOY may allow.
pub const MAX_DECIMALS: u32 = 18;

/// Upper bound for every SRC-20 numeric field: 2^64 - 1.
pub fn max_numeric() -> BigDecimal { BigDecimal::from(u64::MAX) }

/// Error parsing an SRC-20 numeric field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseAmountError {
    /// The literal contains `e` or `E`.
    ScientificNotation(String),
    /// The literal is not a plain base-10 number.
    Invalid(String),
}

impl fmt::Display for ParseAmountError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::ScientificNotation(ref s) =>
                write!(f, "scientific notation not allowed in incoming value: {}", s),
            Self::Invalid(ref s) => write!(f, "not a valid decimal: {}", s),
        }
    }
}

impl std::error::Error for ParseAmountError {}

/// Parses a numeric field literal.
///
/// Any occurrence of `e`/`E` is rejected before the value is even looked at,
/// so `1e3`, `1E-2` and `e` all fail the same way.
pub fn parse_amount(s: &str) -> Result<BigDecimal, ParseAmountError> {
    if s.contains(['e', 'E']) {
        return Err(ParseAmountError::ScientificNotation(s.to_owned()));
    }
    BigDecimal::from_str(s.trim()).map_err(|_| ParseAmountError::Invalid(s.to_owned()))
}

/// Quantizes to an integer, rounding towards zero.
pub fn floor_to_integer(d: &BigDecimal) -> BigDecimal { d.with_scale_round(0, RoundingMode::Down) }

/// Number of significant fractional digits once trailing zeros are stripped.
pub fn fractional_digits(d: &BigDecimal) -> u32 {
    let count = d.normalized().fractional_digit_count();
    if count < 0 {
        0
    } else {
        count as u32
    }
}

/// Whether `d` lies in the permitted `[0, 2^64 - 1]` range.
pub fn in_numeric_range(d: &BigDecimal) -> bool {
    *d >= BigDecimal::zero() && *d <= max_numeric()
}

/// Canonical ledger rendering of an amount.
///
/// Trailing zeros are stripped, integers carry no decimal point and zero is
/// always `"0"`. This string feeds the per-block ledger hash.
pub fn format_amount(d: &BigDecimal) -> String {
    let normalized = d.normalized();
    let s = normalized.to_string();
    if !s.contains('.') {
        return s;
    }
    let trimmed = s.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-" {
        "0".to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// Error converting a `dec` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecimalsOutOfRange {
    /// The offending value, as given.
    pub value: String,
}

impl fmt::Display for DecimalsOutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_err!(f, "dec must be an integer in [0, {}]", MAX_DECIMALS; self.value)
    }
}

impl std::error::Error for DecimalsOutOfRange {}

/// Parses a `dec` field: decimal digits only, value in `[0, 18]`.
pub fn parse_decimals(s: &str) -> Result<u32, DecimalsOutOfRange> {
    let err = || DecimalsOutOfRange { value: s.to_owned() };
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(err());
    }
    let value: u32 = s.parse().map_err(|_| err())?;
    if value > MAX_DECIMALS {
        return Err(err());
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> BigDecimal { parse_amount(s).unwrap() }

    #[test]
    fn rejects_scientific_notation() {
        for s in ["1e3", "1E3", "2.5e-2", "e", "1e"] {
            assert!(matches!(parse_amount(s), Err(ParseAmountError::ScientificNotation(_))));
        }
    }

    #[test]
    fn rejects_garbage() {
        for s in ["", "abc", "1.2.3", "NaN", "inf"] {
            assert!(parse_amount(s).is_err(), "{} should not parse", s);
        }
    }

    #[test]
    fn floor_rounds_down() {
        assert_eq!(floor_to_integer(&dec("21.99")), dec("21"));
        assert_eq!(floor_to_integer(&dec("21000000")), dec("21000000"));
        assert_eq!(floor_to_integer(&dec("0.9")), dec("0"));
    }

    #[test]
    fn fractional_digit_counting() {
        assert_eq!(fractional_digits(&dec("1.230")), 2);
        assert_eq!(fractional_digits(&dec("100")), 0);
        assert_eq!(fractional_digits(&dec("0.000000000000000001")), 18);
    }

    #[test]
    fn numeric_range_bounds() {
        assert!(in_numeric_range(&dec("0")));
        assert!(in_numeric_range(&dec("18446744073709551615")));
        assert!(!in_numeric_range(&dec("18446744073709551616")));
        assert!(!in_numeric_range(&dec("-1")));
    }

    #[test]
    fn ledger_formatting() {
        assert_eq!(format_amount(&dec("1000")), "1000");
        assert_eq!(format_amount(&dec("100.500")), "100.5");
        assert_eq!(format_amount(&dec("0.000")), "0");
        assert_eq!(format_amount(&dec("0.100")), "0.1");
    }

    #[test]
    fn decimals_field() {
        assert_eq!(parse_decimals("0"), Ok(0));
        assert_eq!(parse_decimals("18"), Ok(18));
        assert!(parse_decimals("19").is_err());
        assert!(parse_decimals("18.0").is_err());
        assert!(parse_decimals("-1").is_err());
    }
}
