// SPDX-License-Identifier: CC0-1.0

//! Daemon configuration.
//!
//! Everything comes from `STAMPD_*` environment variables with CLI flags
//! layered on top. Consensus parameters are *not* configuration; they live
//! in the activation table of `stampd-types`.

use core::fmt;
use std::env;
use std::time::Duration;

/// First mainnet block the indexer cares about.
pub const DEFAULT_START_HEIGHT: u64 = 779_652;

const DEFAULT_LOCK_PORT: u16 = 8553;
const DEFAULT_POLL_INTERVAL: f64 = 0.5;

/// A configuration problem. Fatal at startup, exit code 1.
#[derive(Debug)]
pub struct ConfigError(pub String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "configuration error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

/// Resolved daemon configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Upstream metadata-layer JSON-RPC endpoint.
    pub upstream_url: String,
    /// Bitcoin Core JSON-RPC endpoint.
    pub backend_url: String,
    /// Bitcoin Core RPC user.
    pub backend_user: Option<String>,
    /// Bitcoin Core RPC password. Required before the follower may start.
    pub backend_password: Option<String>,
    /// Optional SRC-20 oracle URL with a `{block_index}` placeholder.
    pub oracle_url: Option<String>,
    /// Domain the artifact URLs are built under.
    pub domain: String,
    /// Sleep between tip polls.
    pub poll_interval: Duration,
    /// Port for the exclusive pid-bound lock socket.
    pub lock_port: u16,
    /// Height to start indexing from when the store is empty.
    pub start_height: u64,
    /// Escalate an oracle ledger-hash mismatch to a fatal error.
    pub strict_validation: bool,
}

fn var(name: &str) -> Option<String> { env::var(name).ok().filter(|v| !v.is_empty()) }

impl Config {
    /// Loads configuration from the environment.
    pub fn from_env(strict_validation: bool) -> Result<Config, ConfigError> {
        let upstream_url =
            var("STAMPD_UPSTREAM_URL").unwrap_or_else(|| "http://localhost:4000/rpc".to_owned());
        let backend_url =
            var("STAMPD_BACKEND_URL").unwrap_or_else(|| "http://localhost:8332".to_owned());

        let poll_interval = match var("STAMPD_POLL_INTERVAL") {
            Some(raw) => raw
                .parse::<f64>()
                .ok()
                .filter(|secs| *secs > 0.0)
                .map(Duration::from_secs_f64)
                .ok_or_else(|| {
                    ConfigError(format!("invalid STAMPD_POLL_INTERVAL: {}", raw))
                })?,
            None => Duration::from_secs_f64(DEFAULT_POLL_INTERVAL),
        };

        let lock_port = match var("STAMPD_LOCK_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .ok()
                .filter(|port| *port > 1)
                .ok_or_else(|| ConfigError(format!("invalid STAMPD_LOCK_PORT: {}", raw)))?,
            None => DEFAULT_LOCK_PORT,
        };

        let start_height = match var("STAMPD_START_BLOCK") {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| ConfigError(format!("invalid STAMPD_START_BLOCK: {}", raw)))?,
            None => DEFAULT_START_HEIGHT,
        };

        Ok(Config {
            upstream_url,
            backend_url,
            backend_user: var("STAMPD_BACKEND_USER"),
            backend_password: var("STAMPD_BACKEND_PASSWORD"),
            oracle_url: var("STAMPD_ORACLE_URL"),
            domain: var("STAMPD_DOMAIN").unwrap_or_else(|| "localhost".to_owned()),
            poll_interval,
            lock_port,
            start_height,
            strict_validation,
        })
    }

    /// Checks the parts the follower cannot run without.
    pub fn require_backend_auth(&self) -> Result<(), ConfigError> {
        if self.backend_password.is_none() {
            return Err(ConfigError(
                "backend RPC password not set (use STAMPD_BACKEND_PASSWORD)".to_owned(),
            ));
        }
        Ok(())
    }
}
