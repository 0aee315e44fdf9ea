// SPDX-License-Identifier: CC0-1.0

//! The exclusive instance lock.
//!
//! Two indexers writing the same derived state corrupt it silently, so at
//! most one may run. Binding a localhost port is the lock: it is released
//! by the OS no matter how the process dies.

use core::fmt;
use std::net::{Ipv4Addr, TcpListener};

/// Failure to acquire the instance lock. Fatal at startup, exit code 2.
#[derive(Debug)]
pub struct LockError {
    /// The lock port that could not be bound.
    pub port: u16,
    source: std::io::Error,
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "another indexer instance appears to be running (cannot bind 127.0.0.1:{}): {}",
            self.port, self.source
        )
    }
}

impl std::error::Error for LockError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> { Some(&self.source) }
}

/// The held lock. Dropping it releases the port.
#[derive(Debug)]
pub struct Lock {
    _listener: TcpListener,
}

/// Acquires the exclusive lock on `port`.
pub fn acquire(port: u16) -> Result<Lock, LockError> {
    match TcpListener::bind((Ipv4Addr::LOCALHOST, port)) {
        Ok(listener) => {
            log::debug!("lock acquired on 127.0.0.1:{}", port);
            Ok(Lock { _listener: listener })
        }
        Err(source) => Err(LockError { port, source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_while_held() {
        let first = acquire(0).ok().and_then(|lock| {
            // Port 0 picks a free port; rebind the concrete one.
            lock._listener.local_addr().ok().map(|addr| (lock, addr.port()))
        });
        let (held, port) = first.expect("bind an ephemeral port");
        assert!(acquire(port).is_err());
        drop(held);
        assert!(acquire(port).is_ok());
    }
}
