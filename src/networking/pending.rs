// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! The pending-request table: demultiplexes inbound RESPs to the probe that
//! sent the matching REQ, keyed by nonce.

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::{oneshot, Mutex};

use crate::core::types::{Nonce, RespMsg};

/// Pending-table errors.
#[derive(Debug, Error)]
pub enum PendingError {
    /// A second probe tried to register the same nonce before the first was
    /// resolved. Nonces are 128-bit and freshly generated per probe, so this
    /// only happens on a bug in the caller; we reject rather than silently
    /// overwrite the earlier waiter.
    #[error("duplicate nonce")]
    DuplicateNonce,
}

struct PendingEntry {
    tx: oneshot::Sender<RespMsg>,
}

/// Table of in-flight probes awaiting a RESP, keyed by nonce.
pub struct PendingTable {
    inner: Mutex<HashMap<Nonce, PendingEntry>>,
}

impl Default for PendingTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingTable {
    /// An empty table.
    pub fn new() -> Self {
        Self { inner: Mutex::new(HashMap::new()) }
    }

    /// Register a nonce, returning the receiver half the caller awaits.
    ///
    /// Errors if `nonce` is already registered rather than displacing the
    /// existing waiter.
    pub async fn register(&self, nonce: Nonce) -> Result<oneshot::Receiver<RespMsg>, PendingError> {
        let (tx, rx) = oneshot::channel();
        let mut guard = self.inner.lock().await;
        if guard.contains_key(&nonce) {
            return Err(PendingError::DuplicateNonce);
        }
        guard.insert(nonce, PendingEntry { tx });
        Ok(rx)
    }

    /// Deliver `resp` to the waiter for its nonce, if one is still registered.
    ///
    /// Returns `true` if a waiter was found (whether or not it was still
    /// listening — the receiver may have been dropped on timeout).
    pub async fn complete(&self, nonce: &Nonce, resp: RespMsg) -> bool {
        let entry = self.inner.lock().await.remove(nonce);
        match entry {
            Some(entry) => {
                let _ = entry.tx.send(resp);
                true
            }
            None => false,
        }
    }

    /// Remove a registration without completing it, e.g. after a timeout.
    ///
    /// Safe to call even if the entry was already removed by [`Self::complete`];
    /// every caller removes on exactly one of its exit paths.
    pub async fn cancel(&self, nonce: &Nonce) {
        self.inner.lock().await.remove(nonce);
    }

    /// Number of in-flight registrations. Test/diagnostic use.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}
