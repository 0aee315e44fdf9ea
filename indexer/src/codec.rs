// SPDX-License-Identifier: CC0-1.0

//! Payload decoding: base64 in its two historical modes, MIME sniffing and
//! the zlib+MessagePack unwrapper.
//!
//! Every decision in here is height-gated consensus. The repair decoder, the
//! whitespace stripping and the `BMN` signature each changed classification
//! at a fixed block; the gate table in `stampd-types` is the single source
//! for those heights.

use std::io::Read;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use serde_json::{Map, Value};
use types::{enabled, Base64Validity, Feature, Ident};

/// Decoder matching the permissive historical behavior: padding optional,
/// non-zero trailing bits tolerated.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decompressed payloads larger than this are treated as undecodable.
const MAX_INFLATED_LEN: usize = 16 * 1024 * 1024;

/// A payload at some stage of decoding.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// A JSON object, either given directly or recovered from bytes.
    Mapping(Map<String, Value>),
    /// UTF-8 text that is not a JSON object.
    Text(String),
    /// Raw bytes.
    Binary(Vec<u8>),
}

impl Payload {
    /// The payload as bytes, serializing mappings as compact JSON.
    pub fn to_bytes(&self) -> Vec<u8> {
        match *self {
            Payload::Mapping(ref map) =>
                serde_json::to_string(&Value::Object(map.clone())).unwrap_or_default().into_bytes(),
            Payload::Text(ref s) => s.as_bytes().to_vec(),
            Payload::Binary(ref b) => b.clone(),
        }
    }

    /// Whether there is nothing to store.
    pub fn is_empty(&self) -> bool {
        match *self {
            Payload::Mapping(ref map) => map.is_empty(),
            Payload::Text(ref s) => s.is_empty(),
            Payload::Binary(ref b) => b.is_empty(),
        }
    }
}

/// Checks RFC 4648 well-formedness: standard alphabet, length a multiple of
/// four, at most two `=` and only at the end.
pub fn is_well_formed_base64(s: &str) -> bool {
    if s.is_empty() || s.len() % 4 != 0 {
        return false;
    }
    let bytes = s.as_bytes();
    let pad = bytes.iter().rev().take_while(|&&b| b == b'=').count();
    if pad > 2 {
        return false;
    }
    bytes[..bytes.len() - pad]
        .iter()
        .all(|&b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/')
}

/// Decodes a stamp's base64 string under the rules active at `height`.
///
/// Three eras:
///
/// * through `base64_repair_end - 1`: missing padding is repaired before
///   decoding;
/// * up to `p2wsh`: strict decode, no repair;
/// * from `p2wsh`: the string must pass charset/length validation first.
pub fn decode_base64(s: &str, height: u64) -> (Option<Vec<u8>>, Base64Validity) {
    let mut validated = false;
    if enabled(Feature::P2wsh, height) {
        if !is_well_formed_base64(s) {
            log::info!("EXCLUSION: BASE64 DECODE_FAIL invalid string: {}", s);
            return (None, Base64Validity::Invalid);
        }
        validated = true;
    }

    if !enabled(Feature::Base64RepairEnd, height) {
        return match decode_with_repair(s) {
            Some(data) => (Some(data), Base64Validity::Valid),
            None => (None, Base64Validity::NotApplicable),
        };
    }

    match STANDARD.decode(s) {
        Ok(data) => (Some(data), Base64Validity::Valid),
        Err(e) => {
            log::info!("EXCLUSION: BASE64 DECODE_FAIL base64 image string: {}", e);
            if validated {
                (None, Base64Validity::Valid)
            } else {
                (None, Base64Validity::NotApplicable)
            }
        }
    }
}

/// Pads to a multiple of four and decodes leniently. This "repaired" many
/// early stamps into corrupted images, which is why it is height-capped.
fn decode_with_repair(s: &str) -> Option<Vec<u8>> {
    let mut padded = s.to_owned();
    let missing = padded.len() % 4;
    if missing != 0 {
        padded.push_str(&"=".repeat(4 - missing));
    }
    match LENIENT.decode(&padded) {
        Ok(data) => Some(data),
        Err(e) => {
            log::info!("EXCLUSION: BASE64 DECODE_FAIL base64 image string: {}", e);
            None
        }
    }
}

fn strip_leading_whitespace(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c))
        .unwrap_or(data.len());
    &data[start..]
}

fn is_zlib(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0x78 && (u16::from_be_bytes([data[0], data[1]]) % 31 == 0)
}

/// Determines the file suffix for decoded payload bytes.
///
/// Probe order: the `BMN` signature (gated), a JSON parse of the raw bytes,
/// the zlib header, then the signature sniffer over input that is
/// left-stripped of ASCII whitespace once `strip_whitespace` is active.
/// The suffix is the MIME subtype, e.g. `png` or `svg+xml`.
pub fn file_suffix(data: &[u8], height: u64) -> String {
    if enabled(Feature::Bmn, height) && data.len() >= 3 && &data[..3] == b"BMN" {
        return "bmn".to_owned();
    }
    if let Ok(text) = std::str::from_utf8(data) {
        if serde_json::from_str::<Value>(text).is_ok() {
            return "json".to_owned();
        }
    }
    let sniffed = if enabled(Feature::StripWhitespace, height) {
        strip_leading_whitespace(data)
    } else {
        data
    };
    if is_zlib(sniffed) {
        return "zlib".to_owned();
    }
    if let Some(kind) = infer::get(sniffed) {
        return subtype(kind.mime_type()).to_owned();
    }
    match std::str::from_utf8(sniffed) {
        Ok(text) if looks_like_markup(text) => "svg+xml".to_owned(),
        Ok(_) => "plain".to_owned(),
        Err(_) => "octet-stream".to_owned(),
    }
}

fn subtype(mime: &str) -> &str { mime.rsplit('/').next().unwrap_or(mime) }

fn looks_like_markup(text: &str) -> bool {
    let trimmed = text.trim_start();
    trimmed.starts_with("<svg") || trimmed.starts_with("<?xml")
}

/// MIME type recorded for a stored artifact, by suffix.
pub fn mime_type_for_suffix(suffix: &str) -> Option<&'static str> {
    let mime = match suffix {
        "svg" | "svg+xml" => "image/svg+xml",
        "png" => "image/png",
        "gif" => "image/gif",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "bmp" => "image/bmp",
        "html" => "text/html",
        "json" => "application/json",
        "bmn" | "octet-stream" => "application/octet-stream",
        "plain" => "text/plain",
        _ => return None,
    };
    Some(mime)
}

/// Extracts the protocol ident from a payload mapping.
///
/// Keys are matched case-insensitively (last occurrence wins) and the `p`
/// value case-insensitively against the supported sub-protocols.
pub fn extract_ident(map: &Map<String, Value>) -> (Ident, Option<&'static str>) {
    let p = map
        .iter()
        .filter(|(k, _)| k.eq_ignore_ascii_case("p"))
        .last()
        .and_then(|(_, v)| v.as_str())
        .map(|p| p.to_uppercase());
    match p.as_deref() {
        Some("SRC-20") => (Ident::Src20, Some("json")),
        Some("SRC-721") => (Ident::Src721, Some("json")),
        _ => (Ident::Unknown, None),
    }
}

struct CountingReader<R> {
    inner: R,
    consumed: usize,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.consumed += n;
        Ok(n)
    }
}

enum UnwrapError {
    Zlib,
    MessagePack,
    NotJsonCompatible,
}

fn try_zlib_unwrap(data: &[u8]) -> Result<String, UnwrapError> {
    let mut inflated = Vec::new();
    let mut decoder = flate2::bufread::ZlibDecoder::new(data).take(MAX_INFLATED_LEN as u64 + 1);
    decoder.read_to_end(&mut inflated).map_err(|_| UnwrapError::Zlib)?;
    if inflated.len() > MAX_INFLATED_LEN {
        return Err(UnwrapError::Zlib);
    }

    let mut reader = CountingReader { inner: inflated.as_slice(), consumed: 0 };
    let mut de = rmp_serde::Deserializer::new(&mut reader);
    let value: Value =
        serde::Deserialize::deserialize(&mut de).map_err(|_| UnwrapError::NotJsonCompatible)?;
    if reader.consumed != inflated.len() {
        return Err(UnwrapError::MessagePack);
    }
    serde_json::to_string(&value).map_err(|_| UnwrapError::NotJsonCompatible)
}

/// Unwraps a zlib-compressed MessagePack payload into its JSON form and
/// re-runs protocol-ident extraction on the result.
///
/// Any failure along the way leaves the payload as opaque `zlib` bytes.
pub fn zlib_unwrap(data: &[u8], _height: u64) -> (Ident, String, Payload) {
    match try_zlib_unwrap(data) {
        Ok(json) => {
            let (ident, suffix, payload) = match serde_json::from_str::<Value>(&json) {
                Ok(Value::Object(map)) => {
                    let (ident, _) = extract_ident(&map);
                    (ident, "json", Payload::Mapping(map))
                }
                _ => (Ident::Unknown, "json", Payload::Text(json)),
            };
            (ident, suffix.to_owned(), payload)
        }
        Err(UnwrapError::Zlib) => {
            log::info!("EXCLUSION: Error decompressing zlib data");
            (Ident::Unknown, "zlib".to_owned(), Payload::Binary(data.to_vec()))
        }
        Err(UnwrapError::MessagePack) => {
            log::info!("EXCLUSION: Error decoding MessagePack data");
            (Ident::Unknown, "zlib".to_owned(), Payload::Binary(data.to_vec()))
        }
        Err(UnwrapError::NotJsonCompatible) => {
            log::info!("EXCLUSION: The decoded data is not JSON-compatible");
            (Ident::Unknown, "zlib".to_owned(), Payload::Binary(data.to_vec()))
        }
    }
}

/// Classifies a decoded payload into an ident and file suffix.
///
/// Bytes that are valid UTF-8 are considered as text first; text that
/// parses as a JSON object goes through ident extraction; anything else is
/// sniffed for a file type, with `zlib` streams unwrapped in place. The
/// returned payload may differ from the input (bytes promoted to text or to
/// a mapping).
pub fn classify(payload: Payload, height: u64) -> (Ident, Option<String>, Payload) {
    let payload = match payload {
        Payload::Binary(bytes) => match String::from_utf8(bytes) {
            Ok(text) => Payload::Text(text),
            Err(e) => Payload::Binary(e.into_bytes()),
        },
        other => other,
    };

    match payload {
        Payload::Mapping(map) => {
            let (ident, suffix) = extract_ident(&map);
            (ident, suffix.map(str::to_owned), Payload::Mapping(map))
        }
        Payload::Text(text) => {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&text) {
                let (ident, suffix) = extract_ident(&map);
                return (ident, suffix.map(str::to_owned), Payload::Mapping(map));
            }
            if text.is_empty() {
                return (Ident::Unknown, None, Payload::Text(text));
            }
            let suffix = file_suffix(text.as_bytes(), height);
            (Ident::Stamp, Some(suffix), Payload::Text(text))
        }
        Payload::Binary(bytes) => {
            if bytes.is_empty() {
                return (Ident::Unknown, None, Payload::Binary(bytes));
            }
            let suffix = file_suffix(&bytes, height);
            if suffix == "zlib" {
                let (ident, suffix, payload) = zlib_unwrap(&bytes, height);
                (ident, Some(suffix), payload)
            } else {
                (Ident::Stamp, Some(suffix), Payload::Binary(bytes))
            }
        }
    }
}
