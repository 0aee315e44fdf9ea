// SPDX-License-Identifier: CC0-1.0

//! The stamp classification pipeline.
//!
//! One [`Indexer::process_block`] call takes a block's candidate
//! transactions in `tx_index` order through payload extraction, cpid
//! assignment, reissue detection, classification, numbering and artifact
//! emission, then runs the accumulated SRC-20 operations and folds their
//! effects into balances. The return value carries the block's three
//! consensus artifacts: the balance string, its ledger hash and the
//! block-messages hash.

use std::collections::HashMap;

use bigdecimal::BigDecimal;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use types::{
    enabled, Base64Validity, Candidate, Feature, Ident, Src20Metadata, Src20Record, StampRecord,
    ValidStamp,
};

use crate::codec::{self, Payload};
use crate::messages::BlockMessages;
use crate::src20::{self, svg, OpContext};
use crate::store::{BlobStore, BlockRow, StateStore};
use crate::{balances, ledger, Result};

/// Suffixes that disqualify a record from BTC-stamp numbering.
const INVALID_BTC_STAMP_SUFFIX: [&str; 6] =
    ["plain", "octet-stream", "js", "css", "x-empty", "json"];

/// A block's worth of candidate transactions.
#[derive(Clone, Debug)]
pub struct Block {
    /// Block height.
    pub height: u64,
    /// Block timestamp, Unix seconds.
    pub time: u64,
    /// Candidate transactions, processed in `tx_index` order.
    pub transactions: Vec<Candidate>,
}

/// What processing a block produced.
#[derive(Clone, Debug)]
pub struct BlockSummary {
    /// Block height.
    pub height: u64,
    /// Block timestamp, Unix seconds.
    pub time: u64,
    /// Stamp records written.
    pub stamps: usize,
    /// SRC-20 operations processed (valid and invalid).
    pub src20_ops: usize,
    /// Canonical balance string over the rows this block touched.
    pub balance_string: String,
    /// SHA-256 of the balance string.
    pub ledger_hash: String,
    /// SHA-256 of the block-messages stream.
    pub messages_hash: String,
}

/// The indexing engine: a state store, a blob store and the pipeline
/// between them.
#[derive(Debug)]
pub struct Indexer<S, B> {
    /// Persistent derived state.
    pub store: S,
    /// Artifact storage.
    pub blob: B,
    domain: String,
}

struct ParsedStamp {
    prevalidated: Option<Map<String, Value>>,
}

impl<S: StateStore, B: BlobStore> Indexer<S, B> {
    /// Creates an engine writing artifact URLs under `domain`.
    pub fn new(store: S, blob: B, domain: &str) -> Self {
        Indexer { store, blob, domain: domain.to_owned() }
    }

    /// Processes one block. Blocks must arrive in height order.
    ///
    /// # Errors
    ///
    /// Only consistency violations escape; every decoding or validation
    /// problem is recorded on the affected record instead.
    pub fn process_block(&mut self, block: &Block) -> Result<BlockSummary> {
        let mut messages = BlockMessages::new(block.height);
        let mut valid_stamps: Vec<ValidStamp> = Vec::new();
        let mut prevalidated: Vec<(Map<String, Value>, OpContext)> = Vec::new();
        let mut stamps = 0usize;

        let mut transactions: Vec<&Candidate> = block.transactions.iter().collect();
        transactions.sort_by_key(|tx| tx.tx_index);

        for tx in transactions {
            if let Some(parsed) = self.parse_stamp(tx, &mut valid_stamps, &mut messages) {
                stamps += 1;
                if let Some(map) = parsed.prevalidated {
                    let ctx = OpContext {
                        creator: tx.source.clone(),
                        destination: tx.destination.clone(),
                        block_height: block.height,
                        block_time: block.time,
                        tx_hash: tx.tx_hash.clone(),
                        tx_index: tx.tx_index,
                    };
                    prevalidated.push((map, ctx));
                }
            }
        }

        let mut shadow: Vec<Src20Record> = Vec::new();
        let mut mint_cache: HashMap<String, BigDecimal> = HashMap::new();
        for (map, ctx) in &prevalidated {
            let outcome = src20::process(&self.store, &shadow, &mut mint_cache, map, ctx);
            self.record_src20(&outcome.record, &mut messages);
            if let Some(ref meta) = outcome.metadata {
                messages.record("insert", "src20_metadata", &metadata_bindings(meta));
                self.store.upsert_metadata(meta);
            }
            shadow.push(outcome.record);
            for synthesized in outcome.synthesized {
                self.record_src20(&synthesized, &mut messages);
                shadow.push(synthesized);
            }
        }

        let mut updates = balances::fold(&shadow);
        balances::commit(&mut self.store, &mut updates, block.height, block.time)?;
        let balance_string = ledger::canonical_balance_string(&updates);
        let ledger_hash = ledger::ledger_hash(&balance_string);
        let messages_hash = messages.digest();

        self.store.insert_block(&BlockRow {
            height: block.height,
            time: block.time,
            ledger_hash: ledger_hash.clone(),
            balance_string: balance_string.clone(),
            messages_hash: messages_hash.clone(),
            indexed: true,
        });

        Ok(BlockSummary {
            height: block.height,
            time: block.time,
            stamps,
            src20_ops: shadow.len(),
            balance_string,
            ledger_hash,
            messages_hash,
        })
    }

    fn record_src20(&mut self, record: &Src20Record, messages: &mut BlockMessages) {
        messages.record("insert", "src20", &src20_bindings(record));
        self.store.insert_src20(record);
        if record.valid {
            messages.record("insert", "src20_valid", &src20_bindings(record));
            self.store.insert_src20_valid(record);
        }
    }

    /// Parses one candidate into a stamp record, or drops it.
    fn parse_stamp(
        &mut self,
        tx: &Candidate,
        valid_stamps: &mut Vec<ValidStamp>,
        messages: &mut BlockMessages,
    ) -> Option<ParsedStamp> {
        let height = tx.block_height;
        let mapping = payload_mapping(&tx.data)?;

        // Payload extraction. A description always wins; without one, a
        // mapping carrying a supported protocol tag is its own payload.
        let embedded = !mapping.contains_key("description")
            && codec::extract_ident(&mapping).0 != Ident::Unknown;
        let (mut payload, stamp_base64, description_mime, validity) = if embedded {
            (
                Payload::Mapping(mapping.clone()),
                None,
                None,
                Base64Validity::NotApplicable,
            )
        } else {
            let description =
                field_str(&mapping, "description").or_else(|| tx.description.clone())?;
            let (base64_string, mime) = parse_description(&description)?;
            let (decoded, decoded_validity) = codec::decode_base64(&base64_string, height);
            (
                Payload::Binary(decoded.unwrap_or_default()),
                Some(base64_string),
                mime,
                decoded_validity,
            )
        };

        // CPID assignment.
        let upstream_cpid = field_str(&mapping, "cpid").or_else(|| tx.cpid.clone());
        let mut cpid = upstream_cpid.unwrap_or_else(|| base62_cpid(&tx.tx_hash, height));
        let asset_longname =
            field_str(&mapping, "asset_longname").or_else(|| tx.asset_longname.clone());

        // Reissue check, against history and against this block.
        if self.store.cpid_is_numbered(&cpid) || valid_stamps.iter().any(|v| v.cpid == cpid) {
            log::info!("EXCLUSION: reissue of {} dropped from numbering", cpid);
            return None;
        }

        // Identification.
        let (ident, mut suffix, classified) = codec::classify(payload, height);
        payload = classified;

        let mut is_btc_stamp = false;
        let mut src_data = None;
        let mut prevalidated = None;

        // SRC-20 branch.
        if ident == Ident::Src20 && !enabled(Feature::Src20End, height) {
            match src20::check_format(&payload, &tx.tx_hash, height) {
                Some(map) => {
                    is_btc_stamp = true;
                    src_data = Some(Value::Object(map.clone()));
                    payload = Payload::Binary(svg::build_src20_svg(&self.store, &map));
                    suffix = Some("svg".to_owned());
                    prevalidated = Some(map);
                }
                None => return None,
            }
        }

        // SRC-721 branch.
        payload = match payload {
            Payload::Mapping(map)
                if ident == Ident::Src721 && enabled(Feature::P2wsh, height) =>
            {
                is_btc_stamp = true;
                src_data = Some(Value::Object(map.clone()));
                suffix = Some("svg".to_owned());
                Payload::Binary(svg::build_src721_svg(&map))
            }
            other => other,
        };

        // Cursed vs BTC rules.
        let mut is_cursed = false;
        let suffix_invalid =
            suffix.as_deref().map_or(false, |s| INVALID_BTC_STAMP_SUFFIX.contains(&s));
        if ident != Ident::Unknown
            && asset_longname.is_none()
            && cpid.starts_with('A')
            && !tx.op_return
            && !suffix_invalid
        {
            is_btc_stamp = true;
        } else if let Some(longname) = asset_longname {
            cpid = longname;
            is_cursed = true;
            is_btc_stamp = false;
        } else if suffix_invalid || !cpid.starts_with('A') || tx.op_return {
            is_btc_stamp = false;
            is_cursed = true;
        }

        // Numbering: one draw per classification, never reordered.
        let stamp_number = if is_btc_stamp {
            Some(self.store.next_stamp_number(false))
        } else if is_cursed {
            Some(self.store.next_stamp_number(true))
        } else {
            None
        };

        if is_btc_stamp {
            valid_stamps.push(ValidStamp {
                stamp_number: stamp_number.unwrap_or_default(),
                tx_hash: tx.tx_hash.clone(),
                cpid: cpid.clone(),
                is_valid_base64: validity,
                stamp_base64: stamp_base64.clone(),
                is_cursed,
                src_data: src_data.clone(),
            });
        }

        let mime_type = description_mime.or_else(|| {
            suffix.as_deref().and_then(codec::mime_type_for_suffix).map(str::to_owned)
        });

        // Artifact emission.
        let mut file_hash = None;
        let mut stamp_url = None;
        if let Some(ref sfx) = suffix {
            if !payload.is_empty() {
                let filename = format!("{}.{}", tx.tx_hash, sfx);
                match self.blob.store(&filename, &payload.to_bytes(), mime_type.as_deref()) {
                    Ok(hash) => {
                        file_hash = Some(hash);
                        stamp_url =
                            Some(format!("https://{}/stamps/{}", self.domain, filename));
                    }
                    Err(e) => log::warn!("artifact store failed for {}: {}", filename, e),
                }
            }
        }

        let record = StampRecord {
            stamp_number,
            block_height: height,
            block_time: tx.block_time,
            tx_index: tx.tx_index,
            tx_hash: tx.tx_hash.clone(),
            cpid,
            creator: tx.source.clone(),
            destination: tx.destination.clone(),
            ident,
            is_btc_stamp,
            is_cursed,
            is_valid_base64: validity,
            stamp_base64,
            src_data,
            file_suffix: suffix,
            mime_type,
            file_hash,
            stamp_url,
            keyburn: tx.keyburn,
        };
        messages.record("insert", "stamps", &stamp_bindings(&record));
        self.store.insert_stamp(&record);

        Some(ParsedStamp { prevalidated })
    }
}

/// Coerces raw payload bytes into a JSON mapping.
///
/// Falls back to the legacy quote repair (single quotes to double quotes,
/// `None` to `null`) that early metadata rows need.
fn payload_mapping(data: &[u8]) -> Option<Map<String, Value>> {
    let text = std::str::from_utf8(data).ok()?;
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) {
        return Some(map);
    }
    let repaired = text.replace('\'', "\"").replace("None", "null");
    match serde_json::from_str::<Value>(&repaired) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn field_str(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_owned)
}

/// Splits a `STAMP:` description into the base64 string and an optional
/// MIME prefix (`<mime>;base64,<data>`).
fn parse_description(description: &str) -> Option<(String, Option<String>)> {
    let lower = description.to_lowercase();
    let start = lower.find("stamp:")? + "stamp:".len();
    let rest = description[start..].trim();
    if rest.is_empty() {
        return None;
    }
    match rest.split_once(";base64,") {
        Some((mime, data)) => Some((data.to_owned(), Some(mime.to_owned()))),
        None => Some((rest.to_owned(), None)),
    }
}

const BASE62_ALPHABET: &[u8; 62] =
    b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

fn base62_encode(digest: &[u8]) -> String {
    let mut digits: Vec<u8> = digest.to_vec();
    let mut out: Vec<char> = Vec::new();
    while digits.iter().any(|&d| d != 0) {
        let mut remainder: u32 = 0;
        let mut quotient: Vec<u8> = Vec::with_capacity(digits.len());
        for &d in &digits {
            let accumulator = remainder * 256 + u32::from(d);
            let q = accumulator / 62;
            remainder = accumulator % 62;
            if !(quotient.is_empty() && q == 0) {
                quotient.push(q as u8);
            }
        }
        out.push(char::from(BASE62_ALPHABET[remainder as usize]));
        digits = quotient;
    }
    if out.is_empty() {
        out.push(char::from(BASE62_ALPHABET[0]));
    }
    out.reverse();
    out.into_iter().collect()
}

/// Derives the 20-character base62 cpid for a transaction without an
/// upstream asset: the base62 rendering of `SHA-256(tx_hash | height)`,
/// big endian, truncated.
pub fn base62_cpid(tx_hash: &str, block_height: u64) -> String {
    let digest = Sha256::digest(format!("{}|{}", tx_hash, block_height).as_bytes());
    let encoded = base62_encode(&digest);
    encoded.chars().take(20).collect()
}

fn stamp_bindings(record: &StampRecord) -> Vec<(String, Value)> {
    let number = match record.stamp_number {
        Some(n) => Value::from(n),
        None => Value::Null,
    };
    vec![
        ("block_index".to_owned(), Value::from(record.block_height)),
        ("cpid".to_owned(), Value::from(record.cpid.clone())),
        ("creator".to_owned(), Value::from(record.creator.clone())),
        ("destination".to_owned(), Value::from(record.destination.clone())),
        ("ident".to_owned(), Value::from(record.ident.to_string())),
        ("stamp".to_owned(), number),
        ("tx_hash".to_owned(), Value::from(record.tx_hash.clone())),
        ("tx_index".to_owned(), Value::from(record.tx_index)),
    ]
}

fn src20_bindings(record: &Src20Record) -> Vec<(String, Value)> {
    let decimal = |d: &Option<BigDecimal>| match d {
        Some(d) => Value::from(d.to_string()),
        None => Value::Null,
    };
    vec![
        ("amt".to_owned(), decimal(&record.amt)),
        ("block_index".to_owned(), Value::from(record.block_height)),
        ("creator".to_owned(), Value::from(record.creator.clone())),
        ("destination".to_owned(), Value::from(record.destination.clone())),
        ("lim".to_owned(), decimal(&record.lim)),
        ("max".to_owned(), decimal(&record.max)),
        ("op".to_owned(), Value::from(record.op.clone())),
        ("p".to_owned(), Value::from(record.p.clone())),
        ("status".to_owned(), record.status.clone().map_or(Value::Null, Value::from)),
        ("tick".to_owned(), Value::from(record.tick.clone())),
        ("tick_hash".to_owned(), Value::from(record.tick_hash.clone())),
        ("tx_hash".to_owned(), Value::from(record.tx_hash.clone())),
        ("tx_index".to_owned(), Value::from(record.tx_index)),
        ("valid".to_owned(), Value::from(record.valid)),
    ]
}

fn metadata_bindings(meta: &Src20Metadata) -> Vec<(String, Value)> {
    let optional = |v: &Option<String>| v.clone().map_or(Value::Null, Value::from);
    vec![
        ("deploy_block_index".to_owned(), Value::from(meta.deploy_block)),
        ("deploy_tx_hash".to_owned(), Value::from(meta.deploy_tx.clone())),
        ("description".to_owned(), optional(&meta.description)),
        ("email".to_owned(), optional(&meta.email)),
        ("tg".to_owned(), optional(&meta.tg)),
        ("tick".to_owned(), Value::from(meta.tick.clone())),
        ("tick_hash".to_owned(), Value::from(meta.tick_hash.clone())),
        ("web".to_owned(), optional(&meta.web)),
        ("x".to_owned(), optional(&meta.x)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base62_cpid_matches_reference() {
        assert_eq!(base62_cpid("deadbeef", 790_000), "Rx7urPoH54xemGomsY1l");
    }

    #[test]
    fn base62_cpid_is_prefix_stable() {
        let digest = Sha256::digest("deadbeef|790000".as_bytes());
        let full = base62_encode(&digest);
        assert!(full.starts_with("Rx7urPoH54xemGomsY1l"));
        assert_eq!(base62_cpid("deadbeef", 790_000).len(), 20);
    }

    #[test]
    fn base62_zero_digest() {
        assert_eq!(base62_encode(&[0u8; 32]), "0");
    }

    #[test]
    fn description_parsing() {
        assert_eq!(
            parse_description("STAMP:aGVsbG8="),
            Some(("aGVsbG8=".to_owned(), None))
        );
        assert_eq!(
            parse_description("stamp:image/png;base64,aGVsbG8="),
            Some(("aGVsbG8=".to_owned(), Some("image/png".to_owned())))
        );
        assert_eq!(parse_description("no prefix here"), None);
        assert_eq!(parse_description("STAMP:"), None);
    }

    #[test]
    fn payload_mapping_repairs_legacy_quotes() {
        let map = payload_mapping(b"{'p': 'SRC-20', 'tick': None}").unwrap();
        assert_eq!(map["p"], Value::String("SRC-20".into()));
        assert_eq!(map["tick"], Value::Null);
    }

    #[test]
    fn payload_mapping_rejects_non_objects() {
        assert!(payload_mapping(b"[1,2,3]").is_none());
        assert!(payload_mapping(b"not json at all").is_none());
        assert!(payload_mapping(&[0xff, 0xfe]).is_none());
    }
}
