// SPDX-License-Identifier: CC0-1.0

//! The block follower.
//!
//! Strictly height-ordered: the tip is polled, every missing block is
//! fetched from the metadata layer and run through the engine, and the
//! loop sleeps one poll interval when it is caught up. Upstream failures
//! are retried with capped exponential backoff; exhaustion leaves the
//! block unadvanced. Shutdown is cooperative and lands on a block
//! boundary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use indexer::store::{MemoryBlobStore, MemoryStore, StateStore};
use indexer::Indexer;

use crate::config::Config;
use crate::oracle::OracleClient;
use crate::upstream::{CoreClient, UpstreamClient, UpstreamError};

const MAX_ATTEMPTS: u32 = 5;
const BASE_DELAY: Duration = Duration::from_secs(1);

/// Retries `op` with exponential backoff: base 1 s, doubling, five
/// attempts in total.
pub fn with_backoff<T>(
    what: &str,
    mut op: impl FnMut() -> Result<T, UpstreamError>,
) -> Result<T, UpstreamError> {
    let mut delay = BASE_DELAY;
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= MAX_ATTEMPTS => {
                log::warn!("{} failed after {} attempts: {}", what, attempt, e);
                return Err(e);
            }
            Err(e) => {
                log::warn!("{} failed (attempt {}): {}, retrying in {:?}", what, attempt, e, delay);
                thread::sleep(delay);
                delay *= 2;
                attempt += 1;
            }
        }
    }
}

/// The follower loop and its collaborators.
pub struct Follower {
    config: Config,
    core: CoreClient,
    upstream: UpstreamClient,
    oracle: Option<OracleClient>,
    shutdown: Arc<AtomicBool>,
}

impl std::fmt::Debug for Follower {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Follower").field("config", &self.config).finish_non_exhaustive()
    }
}

impl Follower {
    /// Wires a follower up from configuration.
    pub fn new(config: Config, shutdown: Arc<AtomicBool>) -> Self {
        let core = CoreClient::new(
            &config.backend_url,
            config.backend_user.as_deref(),
            config.backend_password.as_deref(),
        );
        let upstream = UpstreamClient::new(&config.upstream_url);
        let oracle = config.oracle_url.as_deref().map(OracleClient::new);
        Follower { config, core, upstream, oracle, shutdown }
    }

    /// Runs until shutdown is requested.
    ///
    /// # Errors
    ///
    /// Consistency errors from the engine and strict-mode oracle
    /// mismatches; both mean the current block was not committed.
    pub fn run(
        &self,
        engine: &mut Indexer<MemoryStore, MemoryBlobStore>,
    ) -> anyhow::Result<()> {
        let mut next = engine
            .store
            .last_indexed()
            .map(|height| height + 1)
            .unwrap_or(self.config.start_height);
        log::info!("following the chain from block {}", next);

        while !self.shutdown.load(Ordering::SeqCst) {
            let tip = match with_backoff("getblockcount", || self.core.block_count()) {
                Ok(tip) => tip,
                Err(_) => {
                    thread::sleep(self.config.poll_interval);
                    continue;
                }
            };

            while next <= tip && !self.shutdown.load(Ordering::SeqCst) {
                let block =
                    match with_backoff("get_transactions", || self.upstream.transactions(next)) {
                        Ok(block) => block,
                        Err(_) => {
                            // The block is not advanced; try again after a
                            // poll interval.
                            thread::sleep(self.config.poll_interval);
                            break;
                        }
                    };
                let summary = engine.process_block(&block)?;
                log::info!(
                    "block {}: {} stamps, {} SRC-20 ops, ledger {}",
                    summary.height,
                    summary.stamps,
                    summary.src20_ops,
                    summary.ledger_hash
                );
                if let Some(ref oracle) = self.oracle {
                    oracle.validate(&summary, self.config.strict_validation)?;
                }
                next = summary.height + 1;
            }

            thread::sleep(self.config.poll_interval);
        }

        log::info!("shutdown requested, stopped at block boundary {}", next);
        Ok(())
    }
}
