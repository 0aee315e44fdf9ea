// SPDX-License-Identifier: CC0-1.0

//! Tick normalization and hashing.
//!
//! A tick is a token symbol of at most five code points. Stored ticks are
//! lowercased with non-ASCII code points escaped; the tick hash is SHA3-256
//! (the NIST final, not Keccak) over the lowercased but *unescaped* form.

use sha3::{Digest, Sha3_256};

/// Maximum tick length, in code points.
pub const MAX_TICK_LENGTH: usize = 5;

const TICK_PUNCTUATION: &str = "!@#$%^&*()_+-=[]{};':\"\\|,.<>/?~`";

fn tick_char_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || TICK_PUNCTUATION.contains(c) || (c as u32) >= 0x80
}

/// Checks a tick against the character class and length rule.
///
/// The check runs on the raw (mojibake-repaired) tick, before lowercasing.
pub fn is_valid_tick(tick: &str) -> bool {
    let len = tick.chars().count();
    len > 0 && len <= MAX_TICK_LENGTH && tick.chars().all(tick_char_allowed)
}

/// Normalizes a tick for storage: lowercase, then escape non-ASCII.
pub fn normalize_tick(tick: &str) -> String { escape_non_ascii(&tick.to_lowercase()) }

/// SHA3-256 hex digest of the lowercased tick.
pub fn tick_hash(tick: &str) -> String {
    let digest = Sha3_256::digest(tick.to_lowercase().as_bytes());
    hex::encode(digest)
}

/// Escapes a string the way Python's `unicode_escape` codec does.
///
/// Printable ASCII passes through, `\` and the common control characters get
/// their two-character escapes, everything else becomes `\xHH`, `\uHHHH` or
/// `\UHHHHHHHH` depending on the code point.
pub fn escape_non_ascii(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        let cp = c as u32;
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ if (0x20..0x7f).contains(&cp) => out.push(c),
            _ if cp <= 0xff => out.push_str(&format!("\\x{:02x}", cp)),
            _ if cp <= 0xffff => out.push_str(&format!("\\u{:04x}", cp)),
            _ => out.push_str(&format!("\\U{:08x}", cp)),
        }
    }
    out
}

/// Decodes `\xHH`, `\uHHHH` and `\UHHHHHHHH` escapes back to code points.
///
/// Unknown escapes are kept verbatim. This is the inverse of
/// [`escape_non_ascii`] and is applied before a tick enters the canonical
/// ledger string.
pub fn decode_unicode_escapes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('x') => push_hex_escape(&mut out, &mut chars, 2, "\\x"),
            Some('u') => push_hex_escape(&mut out, &mut chars, 4, "\\u"),
            Some('U') => push_hex_escape(&mut out, &mut chars, 8, "\\U"),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn push_hex_escape(
    out: &mut String,
    chars: &mut std::iter::Peekable<std::str::Chars>,
    width: usize,
    prefix: &str,
) {
    let mut digits = String::with_capacity(width);
    while digits.len() < width {
        match chars.peek() {
            Some(&c) if c.is_ascii_hexdigit() => {
                digits.push(c);
                chars.next();
            }
            _ => break,
        }
    }
    let decoded = if digits.len() == width {
        u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32)
    } else {
        None
    };
    match decoded {
        Some(c) => out.push(c),
        None => {
            out.push_str(prefix);
            out.push_str(&digits);
        }
    }
}

/// Repairs latin-1 mojibake: a string whose code points are really UTF-8
/// bytes is re-decoded; anything else passes through unchanged.
pub fn repair_mojibake(s: &str) -> String {
    if s.is_ascii() || s.chars().any(|c| (c as u32) > 0xff) {
        return s.to_owned();
    }
    let bytes: Vec<u8> = s.chars().map(|c| c as u32 as u8).collect();
    String::from_utf8(bytes).unwrap_or_else(|_| s.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_length_rule() {
        assert!(is_valid_tick("dogs"));
        assert!(is_valid_tick("kevin"));
        assert!(!is_valid_tick("toolong"));
        assert!(!is_valid_tick(""));
    }

    #[test]
    fn tick_character_class() {
        assert!(is_valid_tick("a.b!"));
        assert!(is_valid_tick("\u{1f525}")); // single emoji
        assert!(!is_valid_tick("a b")); // space is not allowed
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in ["DOGS", "dogs", "D\u{f6}G"] {
            let once = normalize_tick(raw);
            assert_eq!(normalize_tick(&once), once);
        }
    }

    #[test]
    fn hash_is_over_unescaped_lowercase() {
        // The escaped storage form must not change the hash.
        assert_eq!(tick_hash("D\u{f6}G"), tick_hash("d\u{f6}g"));
        assert_ne!(tick_hash("d\u{f6}g"), tick_hash("d\\xf6g"));
    }

    #[test]
    fn known_tick_hash() {
        // SHA3-256("kevin"), NIST padding. Distinguishes SHA3 from Keccak.
        assert_eq!(
            tick_hash("KEVIN"),
            "9769ee76c3860c370f0914c472886a25f39d34cd9f1a3fe7751df92b3d439409"
        );
    }

    #[test]
    fn escape_round_trip() {
        for raw in ["d\u{f6}g", "\u{1f525}ire", "a\\b", "tab\there"] {
            let escaped = escape_non_ascii(raw);
            assert!(escaped.is_ascii());
            assert_eq!(decode_unicode_escapes(&escaped), raw);
        }
    }

    #[test]
    fn mojibake_repair() {
        // "ö" encoded as UTF-8 then read back as latin-1 gives "Ã¶".
        assert_eq!(repair_mojibake("\u{c3}\u{b6}"), "\u{f6}");
        assert_eq!(repair_mojibake("plain"), "plain");
        assert_eq!(repair_mojibake("\u{1f525}"), "\u{1f525}");
    }
}
