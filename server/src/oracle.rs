// SPDX-License-Identifier: CC0-1.0

//! Cross-validation against an external SRC-20 ledger oracle.
//!
//! The oracle serves, per block, its own ledger hash and the balance string
//! it was computed from. A mismatch is diagnostic output first; it only
//! becomes fatal under `--strict-validation`.

use std::collections::BTreeSet;

use anyhow::bail;
use indexer::BlockSummary;
use serde_json::Value;

/// Client for the optional ledger oracle.
#[derive(Clone, Debug)]
pub struct OracleClient {
    url_template: String,
}

/// One block's worth of oracle data.
#[derive(Clone, Debug)]
pub struct OracleData {
    /// The oracle's ledger hash.
    pub hash: Option<String>,
    /// The oracle's canonical balance string.
    pub balance_data: Option<String>,
}

impl OracleClient {
    /// Creates a client. `url_template` carries a `{block_index}`
    /// placeholder.
    pub fn new(url_template: &str) -> Self {
        OracleClient { url_template: url_template.to_owned() }
    }

    fn fetch(&self, height: u64) -> Result<OracleData, minreq::Error> {
        let url = self.url_template.replace("{block_index}", &height.to_string());
        let response = minreq::get(&url).with_timeout(5).send()?;
        let value: Value = response.json()?;
        let data = value.get("data").cloned().unwrap_or(Value::Null);
        Ok(OracleData {
            hash: data.get("hash").and_then(Value::as_str).map(str::to_owned),
            balance_data: data
                .get("balance_data")
                .and_then(Value::as_str)
                .map(str::to_owned),
        })
    }

    /// Compares a block's local ledger hash against the oracle.
    ///
    /// Unreachable oracles and mismatches warn and continue; under
    /// `strict` a mismatch aborts instead.
    pub fn validate(&self, summary: &BlockSummary, strict: bool) -> anyhow::Result<()> {
        let data = match self.fetch(summary.height) {
            Ok(data) => data,
            Err(e) => {
                log::warn!("oracle unreachable for block {}: {}", summary.height, e);
                return Ok(());
            }
        };
        match data.hash {
            Some(ref hash) if *hash == summary.ledger_hash => {
                log::debug!("oracle hash matches at block {}", summary.height);
                Ok(())
            }
            Some(ref hash) => {
                log::warn!(
                    "oracle ledger hash mismatch at block {}: local {} oracle {}",
                    summary.height,
                    summary.ledger_hash,
                    hash
                );
                report_differences(&summary.balance_string, data.balance_data.as_deref());
                if strict {
                    bail!("oracle ledger hash mismatch at block {}", summary.height);
                }
                Ok(())
            }
            None => {
                log::warn!("oracle returned no hash for block {}", summary.height);
                Ok(())
            }
        }
    }
}

fn report_differences(local: &str, oracle: Option<&str>) {
    let Some(oracle) = oracle else {
        log::warn!("oracle returned no balance data to diff against");
        return;
    };
    let local_entries: BTreeSet<&str> = local.split(';').filter(|e| !e.is_empty()).collect();
    let oracle_entries: BTreeSet<&str> = oracle.split(';').filter(|e| !e.is_empty()).collect();
    for entry in local_entries.difference(&oracle_entries) {
        log::warn!("entry only in local ledger: {}", entry);
    }
    for entry in oracle_entries.difference(&local_entries) {
        log::warn!("entry only in oracle ledger: {}", entry);
    }
    if local_entries == oracle_entries {
        log::warn!("no entry differences found despite hash mismatch");
    }
}
