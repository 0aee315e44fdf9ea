// SPDX-License-Identifier: CC0-1.0

//! First-pass SRC-20 field validation and normalization.
//!
//! Runs after [`super::check_format`] accepted the payload as a stamp.
//! Errors collected here do not affect stamp numbering; they invalidate the
//! token operation and end up in its `status` column.

use std::sync::OnceLock;

use bigdecimal::BigDecimal;
use regex::Regex;
use serde_json::{Map, Value};
use types::decimal::{floor_to_integer, MAX_DECIMALS};
use types::tick::{normalize_tick, tick_hash};

fn num_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]*(\.[0-9]*)?$").expect("valid regex"))
}

fn dec_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]+$").expect("valid regex"))
}

/// The outcome of first-pass validation.
///
/// Fields are normalized (tick escaped lowercase, keywords uppercased,
/// `max`/`lim` floored to integers). Every rule violation adds one entry to
/// `errors` and extends `status`; the record is built either way.
#[derive(Clone, Debug, Default)]
pub struct Validated {
    /// Normalized tick.
    pub tick: Option<String>,
    /// SHA3-256 of the lowercased tick.
    pub tick_hash: Option<String>,
    /// Protocol tag, uppercased.
    pub p: Option<String>,
    /// Operation keyword, uppercased.
    pub op: Option<String>,
    /// BULK_XFER target tick, uppercased.
    pub holders_of: Option<String>,
    /// Maximum supply, floored.
    pub max: Option<BigDecimal>,
    /// Per-mint limit, floored.
    pub lim: Option<BigDecimal>,
    /// Operation amount.
    pub amt: Option<BigDecimal>,
    /// Fractional digits allowed, in `[0, 18]`.
    pub dec: Option<u32>,
    /// Accumulated `key: message` status text.
    pub status: Option<String>,
    /// Individual validation errors.
    pub errors: Vec<String>,
}

impl Validated {
    /// Whether no validation rule fired.
    pub fn is_valid(&self) -> bool { self.errors.is_empty() }

    fn push_error(&mut self, key: &str, message: &str) {
        let error = format!("{}: {}", key, message);
        match self.status {
            Some(ref mut status) => {
                status.push_str(", ");
                status.push_str(&error);
            }
            None => self.status = Some(error.clone()),
        }
        self.errors.push(error);
    }
}

fn literal_of(value: &Value) -> Option<String> {
    match *value {
        Value::String(ref s) => Some(s.clone()),
        Value::Number(ref n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty(map: &Map<String, Value>, key: &str) -> Option<Value> {
    match map.get(key) {
        None => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(v) => Some(v.clone()),
    }
}

/// Validates and normalizes an SRC-20 mapping.
pub fn validate(map: &Map<String, Value>) -> Validated {
    let mut out = Validated::default();

    if let Some(value) = non_empty(map, "tick") {
        if let Some(raw) = value.as_str() {
            out.tick = Some(normalize_tick(raw));
            out.tick_hash = Some(tick_hash(raw));
        }
    }

    for key in ["p", "op", "holders_of"] {
        let Some(value) = non_empty(map, key) else { continue };
        let upper = match value.as_str() {
            Some(s) => Some(s.to_uppercase()),
            None => {
                out.push_error(key, &format!("NN: INVALID VALUE for {}", key));
                continue;
            }
        };
        match key {
            "p" => out.p = upper,
            "op" => out.op = upper,
            _ => out.holders_of = upper,
        }
    }

    for key in ["max", "lim", "amt"] {
        let Some(value) = non_empty(map, key) else { continue };
        let parsed = literal_of(&value)
            .filter(|literal| num_pattern().is_match(literal))
            .and_then(|literal| literal.parse::<BigDecimal>().ok());
        match parsed {
            Some(parsed) => {
                let parsed =
                    if key == "amt" { parsed } else { floor_to_integer(&parsed) };
                match key {
                    "max" => out.max = Some(parsed),
                    "lim" => out.lim = Some(parsed),
                    _ => out.amt = Some(parsed),
                }
            }
            None => out.push_error(key, &format!("NN: INVALID NUM for {}", key)),
        }
    }

    if let Some(value) = non_empty(map, "dec") {
        let parsed = literal_of(&value)
            .filter(|literal| dec_pattern().is_match(literal))
            .and_then(|literal| literal.parse::<u32>().ok())
            .filter(|dec| *dec <= MAX_DECIMALS);
        match parsed {
            Some(dec) => out.dec = Some(dec),
            None => out.push_error("dec", "NN: INVALID DEC VAL dec"),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(json: &str) -> Map<String, Value> {
        match serde_json::from_str(json).unwrap() {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn normalizes_a_deploy() {
        let v = validate(&map(
            r#"{"p":"src-20","op":"deploy","tick":"DOGS","max":"1000.7","lim":"100","dec":"0"}"#,
        ));
        assert!(v.is_valid());
        assert_eq!(v.tick.as_deref(), Some("dogs"));
        assert_eq!(v.p.as_deref(), Some("SRC-20"));
        assert_eq!(v.op.as_deref(), Some("DEPLOY"));
        assert_eq!(v.max, Some(BigDecimal::from(1000)));
        assert_eq!(v.lim, Some(BigDecimal::from(100)));
        assert_eq!(v.dec, Some(0));
    }

    #[test]
    fn tick_hash_ignores_case() {
        let upper = validate(&map(r#"{"tick":"DOGS"}"#));
        let lower = validate(&map(r#"{"tick":"dogs"}"#));
        assert_eq!(upper.tick_hash, lower.tick_hash);
    }

    #[test]
    fn bad_numbers_accumulate_status() {
        let v = validate(&map(r#"{"op":"mint","tick":"a","amt":"12,5","dec":"19"}"#));
        assert!(!v.is_valid());
        let status = v.status.unwrap();
        assert!(status.contains("amt: NN: INVALID NUM for amt"), "{}", status);
        assert!(status.contains("dec: NN: INVALID DEC VAL dec"), "{}", status);
    }

    #[test]
    fn dec_nineteen_is_rejected() {
        let v = validate(&map(r#"{"op":"deploy","tick":"a","dec":"19"}"#));
        assert!(!v.is_valid());
        assert_eq!(v.dec, None);
    }

    #[test]
    fn empty_strings_become_absent() {
        let v = validate(&map(r#"{"op":"mint","tick":"a","amt":""}"#));
        assert!(v.is_valid());
        assert_eq!(v.amt, None);
    }

    #[test]
    fn amt_keeps_fractional_digits() {
        let v = validate(&map(r#"{"amt":"1.23"}"#));
        assert_eq!(v.amt, Some("1.23".parse().unwrap()));
    }
}
