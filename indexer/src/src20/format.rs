// SPDX-License-Identifier: CC0-1.0

//! The SRC-20 format check.
//!
//! Decides inclusion as a stamp. Anything rejected here never reaches
//! numbering, which makes these rules consensus for stamp identity, not
//! just for token accounting.

use serde_json::{Map, Value};
use types::decimal::{in_numeric_range, parse_amount};
use types::tick::{is_valid_tick, repair_mojibake};
use types::{enabled, Feature};

use crate::codec::Payload;

const DEPLOY_KEYS: &[&str] = &["op", "tick", "max", "lim"];
const TRANSFER_OR_MINT_KEYS: &[&str] = &["op", "tick", "amt"];
const BULK_XFER_KEYS: &[&str] = &["op", "tick", "amt", "destinations"];

/// Checks whether a payload is a well-formed SRC-20 (or SRC-721) mapping.
///
/// SRC-721 payloads pass through untouched. For SRC-20 the tick is repaired
/// and pattern-checked, and every numeric field of a matched operation key
/// set must be a plain number inside `[0, 2^64 - 1]`. Scientific notation
/// is rejected at every height; before `p2wsh`, string values are first
/// stripped to digits and `.`.
///
/// Returns the mapping (tick repaired in place) or `None` for exclusion.
pub fn check_format(payload: &Payload, tx_hash: &str, height: u64) -> Option<Map<String, Value>> {
    let mut map = match *payload {
        Payload::Mapping(ref map) => map.clone(),
        Payload::Text(ref text) => parse_object(text)?,
        Payload::Binary(ref bytes) => parse_object(std::str::from_utf8(bytes).ok()?)?,
    };

    let p = map.get("p").and_then(Value::as_str)?.to_lowercase();
    if p == "src-721" {
        return Some(map);
    }
    if p != "src-20" {
        return None;
    }

    let tick = repair_mojibake(map.get("tick").and_then(Value::as_str).unwrap_or(""));
    if !is_valid_tick(&tick) {
        log::warn!("EXCLUSION: did not match tick pattern: {:?} {}", tick, tx_hash);
        return None;
    }
    map.insert("tick".to_owned(), Value::String(tick));

    let groups: [(&[&str], &[&str]); 3] = [
        (DEPLOY_KEYS, &["max", "lim"]),
        (TRANSFER_OR_MINT_KEYS, &["amt"]),
        (BULK_XFER_KEYS, &["amt"]),
    ];
    for (required, numeric) in groups {
        if !required.iter().all(|key| map.contains_key(*key)) {
            continue;
        }
        for field in numeric {
            let value = map.get(*field)?;
            if !numeric_field_ok(field, value, height, tx_hash) {
                return None;
            }
        }
    }
    Some(map)
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => None,
        Err(e) => {
            log::warn!("EXCLUSION: JSON decode error: {}", e);
            None
        }
    }
}

fn numeric_field_ok(field: &str, value: &Value, height: u64, tx_hash: &str) -> bool {
    let literal = match *value {
        Value::String(ref s) => s.clone(),
        Value::Number(ref n) => n.to_string(),
        _ => {
            log::warn!("EXCLUSION: {} not a string or number: {}", field, tx_hash);
            return false;
        }
    };
    if literal.contains(['e', 'E']) {
        log::warn!("EXCLUSION: Scientific notation not allowed in incoming value: {}", literal);
        return false;
    }
    if matches!(*value, Value::String(_)) && literal.is_empty() {
        // An empty string has always counted as zero.
        return true;
    }
    let literal = if !enabled(Feature::P2wsh, height) && matches!(*value, Value::String(_)) {
        literal.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect()
    } else {
        literal
    };
    let parsed = match parse_amount(&literal) {
        Ok(parsed) => parsed,
        Err(e) => {
            log::warn!("EXCLUSION: {} not a valid decimal: {} {}", field, e, tx_hash);
            return false;
        }
    };
    if !in_numeric_range(&parsed) {
        log::warn!("EXCLUSION: {} not in range: {} {}", field, literal, tx_hash);
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: u64 = Feature::P2wsh.activation_height();

    fn payload(json: &str) -> Payload { Payload::Text(json.to_owned()) }

    #[test]
    fn accepts_a_plain_deploy() {
        let map = check_format(
            &payload(r#"{"p":"src-20","op":"deploy","tick":"dogs","max":"1000","lim":"100"}"#),
            "tx",
            H,
        )
        .unwrap();
        assert_eq!(map["tick"], Value::String("dogs".into()));
    }

    #[test]
    fn rejects_wrong_protocol() {
        assert!(check_format(&payload(r#"{"p":"brc-20","op":"mint"}"#), "tx", H).is_none());
        assert!(check_format(&payload(r#"{"op":"mint"}"#), "tx", H).is_none());
    }

    #[test]
    fn src721_passes_through() {
        let map =
            check_format(&payload(r#"{"p":"SRC-721","op":"mint","tick":"x"}"#), "tx", H).unwrap();
        assert_eq!(map["p"], Value::String("SRC-721".into()));
    }

    #[test]
    fn rejects_bad_ticks() {
        for tick in ["toolong", "", "a b"] {
            let json = format!(r#"{{"p":"src-20","op":"mint","tick":"{}","amt":"1"}}"#, tick);
            assert!(check_format(&payload(&json), "tx", H).is_none(), "tick {:?}", tick);
        }
    }

    #[test]
    fn rejects_scientific_notation_everywhere() {
        for json in [
            r#"{"p":"src-20","op":"mint","tick":"a","amt":"1e3"}"#,
            r#"{"p":"src-20","op":"mint","tick":"a","amt":1e3}"#,
            r#"{"p":"src-20","op":"deploy","tick":"a","max":"1E2","lim":"1"}"#,
        ] {
            assert!(check_format(&payload(json), "tx", H).is_none(), "{}", json);
            assert!(check_format(&payload(json), "tx", 1).is_none(), "{}", json);
        }
    }

    #[test]
    fn range_boundaries() {
        let max = r#"{"p":"src-20","op":"mint","tick":"a","amt":"18446744073709551615"}"#;
        assert!(check_format(&payload(max), "tx", H).is_some());
        let over = r#"{"p":"src-20","op":"mint","tick":"a","amt":"18446744073709551616"}"#;
        assert!(check_format(&payload(over), "tx", H).is_none());
        let negative = r#"{"p":"src-20","op":"mint","tick":"a","amt":-1}"#;
        assert!(check_format(&payload(negative), "tx", H).is_none());
    }

    #[test]
    fn digit_stripping_is_height_gated() {
        let json = r#"{"p":"src-20","op":"mint","tick":"a","amt":"1,000"}"#;
        // Before p2wsh the comma is stripped and the value parses.
        assert!(check_format(&payload(json), "tx", H - 1).is_some());
        // From p2wsh the raw string must parse as-is.
        assert!(check_format(&payload(json), "tx", H).is_none());
    }

    #[test]
    fn unmatched_key_sets_skip_numeric_checks() {
        // No amt key at all: neither transfer nor mint key set matches.
        let json = r#"{"p":"src-20","op":"mint","tick":"a"}"#;
        assert!(check_format(&payload(json), "tx", H).is_some());
    }

    #[test]
    fn mojibake_ticks_are_repaired() {
        // UTF-8 "ö" read as latin-1 arrives as two code points.
        let json = "{\"p\":\"src-20\",\"op\":\"mint\",\"tick\":\"d\u{c3}\u{b6}g\",\"amt\":\"1\"}";
        let map = check_format(&payload(json), "tx", H).unwrap();
        assert_eq!(map["tick"], Value::String("d\u{f6}g".into()));
    }
}
