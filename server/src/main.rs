// SPDX-License-Identifier: CC0-1.0

//! The stampd daemon.
//!
//! Exit codes: 0 success, 1 configuration error, 2 lock acquisition
//! failure, 3 database integrity failure.

use std::path::Path;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{arg, ArgMatches, Command};
use indexer::store::{MemoryBlobStore, MemoryStore, StateStore as _};
use indexer::Indexer;

mod config;
mod follower;
mod lock;
mod oracle;
mod upstream;

use crate::config::Config;
use crate::follower::Follower;

fn main() {
    env_logger::init();

    let cmd = Command::new("stampd")
        .about("Consensus indexer for the Bitcoin stamp protocol")
        .subcommand_required(true)
        .arg(
            arg!(--"strict-validation" "Treat an oracle ledger-hash mismatch as fatal")
                .global(true),
        )
        .subcommand(
            Command::new("server")
                .about("Run the indexer")
                .subcommand_required(true)
                .subcommand(Command::new("start").about("Follow the chain from the last committed block")),
        )
        .subcommand(
            Command::new("reparse")
                .about("Re-derive all state from upstream data")
                .arg(arg!(--block <HEIGHT> "Start the replay at this height").required(false)),
        )
        .subcommand(
            Command::new("kickstart")
                .about("Catch up against a local bitcoind")
                .arg(arg!(--"bitcoind-dir" <PATH> "Path to the bitcoind data directory")
                    .required(true)),
        )
        .subcommand(Command::new("debug-config").about("Print the resolved configuration"));

    let matches = cmd.get_matches();
    if let Err(e) = run(&matches) {
        log::error!("{:#}", e);
        eprintln!("stampd: {:#}", e);
        process::exit(exit_code(&e));
    }
}

fn exit_code(e: &anyhow::Error) -> i32 {
    if e.downcast_ref::<lock::LockError>().is_some() {
        2
    } else if e.downcast_ref::<indexer::Error>().is_some() {
        3
    } else {
        1
    }
}

fn run(matches: &ArgMatches) -> Result<()> {
    let strict = matches.get_flag("strict-validation");
    let config = Config::from_env(strict)?;

    match matches.subcommand() {
        Some(("server", sub)) => match sub.subcommand() {
            Some(("start", _)) => serve(config, None),
            _ => unreachable!("subcommand_required"),
        },
        Some(("reparse", sub)) => {
            let start = sub
                .get_one::<String>("block")
                .map(|raw| {
                    raw.parse::<u64>().with_context(|| format!("invalid --block value: {}", raw))
                })
                .transpose()?;
            serve(config, start)
        }
        Some(("kickstart", sub)) => {
            let dir = sub.get_one::<String>("bitcoind-dir").expect("required arg");
            if !Path::new(dir).is_dir() {
                return Err(config::ConfigError(format!(
                    "bitcoind data directory not found: {}",
                    dir
                ))
                .into());
            }
            serve(config, None)
        }
        Some(("debug-config", _)) => {
            println!("{:#?}", config);
            Ok(())
        }
        _ => unreachable!("subcommand_required"),
    }
}

/// Brings the daemon up and runs the follower until shutdown.
fn serve(mut config: Config, start_override: Option<u64>) -> Result<()> {
    config.require_backend_auth()?;
    if let Some(start) = start_override {
        config.start_height = start;
    }

    let _lock = lock::acquire(config.lock_port)?;

    let store = MemoryStore::new();
    store.verify_integrity()?;
    let mut engine = Indexer::new(store, MemoryBlobStore::new(), &config.domain);

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    ctrlc::set_handler(move || {
        log::info!("received shutdown signal");
        flag.store(true, Ordering::SeqCst);
    })
    .context("installing the signal handler")?;

    let follower = Follower::new(config, shutdown);
    follower.run(&mut engine)
}
