// SPDX-License-Identifier: CC0-1.0

//! JSON-RPC clients: the upstream metadata layer and Bitcoin Core.
//!
//! The follower is the only consumer. Candidate transactions arrive fully
//! parsed from the metadata layer; Bitcoin Core is consulted for the chain
//! tip alone.

use core::fmt;

use base64::Engine as _;
use indexer::pipeline::Block;
use serde_json::{json, Value};
use types::Candidate;

/// An upstream RPC failure. Retried with capped backoff by the follower.
#[derive(Debug)]
pub enum UpstreamError {
    /// Transport-level failure.
    Http(minreq::Error),
    /// The server answered with a JSON-RPC error object.
    Rpc {
        /// Error code from the response.
        code: i64,
        /// Error message from the response.
        message: String,
    },
    /// The response body did not have the expected shape.
    Shape(String),
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            UpstreamError::Http(ref e) => write!(f, "transport error: {}", e),
            UpstreamError::Rpc { code, ref message } =>
                write!(f, "RPC error response: {} {}", code, message),
            UpstreamError::Shape(ref what) => write!(f, "unexpected response shape: {}", what),
        }
    }
}

impl std::error::Error for UpstreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            UpstreamError::Http(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<minreq::Error> for UpstreamError {
    fn from(e: minreq::Error) -> Self { UpstreamError::Http(e) }
}

/// A minimal JSON-RPC 2.0 client over HTTP.
#[derive(Clone, Debug)]
pub struct JsonRpcClient {
    url: String,
    auth_header: Option<String>,
}

impl JsonRpcClient {
    /// Creates a client, with HTTP basic auth when a user is given.
    pub fn new(url: &str, user: Option<&str>, password: Option<&str>) -> Self {
        let auth_header = user.map(|user| {
            let credentials = format!("{}:{}", user, password.unwrap_or(""));
            format!("Basic {}", base64::engine::general_purpose::STANDARD.encode(credentials))
        });
        JsonRpcClient { url: url.to_owned(), auth_header }
    }

    /// Calls `method` and returns the `result` member.
    pub fn call(&self, method: &str, params: Value) -> Result<Value, UpstreamError> {
        let body = json!({ "jsonrpc": "2.0", "id": 0, "method": method, "params": params });
        let mut request = minreq::post(&self.url)
            .with_header("Content-Type", "application/json")
            .with_json(&body)?;
        if let Some(ref auth) = self.auth_header {
            request = request.with_header("Authorization", auth.clone());
        }
        log::debug!(target: "stampd", "request: {} {}", self.url, method);
        let response = request.send()?;
        let value: Value = response.json()?;
        if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
            return Err(UpstreamError::Rpc {
                code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_owned(),
            });
        }
        value
            .get("result")
            .cloned()
            .ok_or_else(|| UpstreamError::Shape("missing result".to_owned()))
    }
}

/// Bitcoin Core, consulted for the chain tip.
#[derive(Clone, Debug)]
pub struct CoreClient {
    rpc: JsonRpcClient,
}

impl CoreClient {
    /// Creates a client for `getblockcount`.
    pub fn new(url: &str, user: Option<&str>, password: Option<&str>) -> Self {
        CoreClient { rpc: JsonRpcClient::new(url, user, password) }
    }

    /// Current chain tip height.
    pub fn block_count(&self) -> Result<u64, UpstreamError> {
        self.rpc
            .call("getblockcount", json!([]))?
            .as_u64()
            .ok_or_else(|| UpstreamError::Shape("getblockcount not a u64".to_owned()))
    }
}

/// The upstream metadata layer: the source of candidate transactions.
#[derive(Clone, Debug)]
pub struct UpstreamClient {
    rpc: JsonRpcClient,
}

impl UpstreamClient {
    /// Creates a client for `get_transactions`.
    pub fn new(url: &str) -> Self { UpstreamClient { rpc: JsonRpcClient::new(url, None, None) } }

    /// Fetches the candidate transactions of one block.
    pub fn transactions(&self, height: u64) -> Result<Block, UpstreamError> {
        let result =
            self.rpc.call("get_transactions", json!({ "block_height": height }))?;
        parse_block(height, &result)
    }
}

fn parse_block(height: u64, result: &Value) -> Result<Block, UpstreamError> {
    let time = result
        .get("block_time")
        .and_then(Value::as_u64)
        .ok_or_else(|| UpstreamError::Shape("missing block_time".to_owned()))?;
    let rows = result
        .get("transactions")
        .and_then(Value::as_array)
        .ok_or_else(|| UpstreamError::Shape("missing transactions".to_owned()))?;

    let mut transactions = Vec::with_capacity(rows.len());
    for row in rows {
        // Rows without a payload never become stamps; skip them here.
        let Some(data) = row.get("data").and_then(Value::as_str) else { continue };
        transactions.push(Candidate {
            block_height: height,
            block_time: time,
            tx_index: row
                .get("tx_index")
                .and_then(Value::as_u64)
                .ok_or_else(|| UpstreamError::Shape("missing tx_index".to_owned()))?
                as u32,
            tx_hash: field(row, "tx_hash")?,
            source: field(row, "source")?,
            destination: row
                .get("destination")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned(),
            keyburn: row.get("keyburn").and_then(Value::as_bool).unwrap_or(false),
            op_return: row.get("op_return").and_then(Value::as_bool).unwrap_or(false),
            data: data.as_bytes().to_vec(),
            cpid: optional(row, "cpid"),
            asset_longname: optional(row, "asset_longname"),
            description: optional(row, "description"),
        });
    }
    Ok(Block { height, time, transactions })
}

fn field(row: &Value, key: &str) -> Result<String, UpstreamError> {
    row.get(key)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| UpstreamError::Shape(format!("missing {}", key)))
}

fn optional(row: &Value, key: &str) -> Option<String> {
    row.get(key).and_then(Value::as_str).map(str::to_owned)
}
