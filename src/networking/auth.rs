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

//! Trust-on-first-use peer key cache: the first verify key seen for a
//! [`PeerId`] is pinned; later RESPs from the same id must match it.

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::Mutex;

use crate::core::signing;
use crate::core::types::PeerId;

/// Authentication failures.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A RESP claimed signing but carried no `vk`/`sig`, or `vk` was not 32 bytes.
    #[error("malformed key material")]
    Malformed,
    /// `vk` differed from the key pinned for this peer on first contact.
    #[error("verify key does not match the one pinned for this peer")]
    KeyMismatch,
    /// The signature did not verify under the (matching) pinned key.
    #[error("signature verification failed")]
    BadSignature,
}

/// TOFU cache of peer id -> 32-byte Ed25519 verify key.
pub struct PeerKeyCache {
    inner: Mutex<HashMap<PeerId, [u8; 32]>>,
}

impl Default for PeerKeyCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerKeyCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self { inner: Mutex::new(HashMap::new()) }
    }

    /// Verify `sig` over `payload` as claimed by `peer`.
    ///
    /// On first contact with `peer`, `vk` is trusted and pinned. On every
    /// later contact, `vk` must match the pinned key exactly.
    pub async fn verify(
        &self,
        peer: PeerId,
        vk: &[u8],
        payload: &[u8],
        sig: &[u8],
    ) -> Result<(), AuthError> {
        let vk_arr: [u8; 32] = vk.try_into().map_err(|_| AuthError::Malformed)?;

        let mut guard = self.inner.lock().await;
        match guard.get(&peer) {
            Some(pinned) if *pinned != vk_arr => return Err(AuthError::KeyMismatch),
            Some(_) => {
                drop(guard);
                signing::verify(&vk_arr, payload, sig).map_err(|_| AuthError::BadSignature)
            }
            None => {
                signing::verify(&vk_arr, payload, sig).map_err(|_| AuthError::BadSignature)?;
                guard.insert(peer, vk_arr);
                Ok(())
            }
        }
    }

    /// Number of pinned peers. Test/diagnostic use.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::signing::SigningKeyMaterial;
    use ring::rand::SystemRandom;

    #[tokio::test]
    async fn first_contact_pins_and_accepts() {
        let rng = SystemRandom::new();
        let peer = PeerId::generate(&rng);
        let key = SigningKeyMaterial::generate_ephemeral().unwrap();
        let payload = b"nonce;from;1;2";
        let sig = key.sign(payload);

        let cache = PeerKeyCache::new();
        let result = cache.verify(peer, &key.verify_key_bytes(), payload, &sig).await;
        assert!(result.is_ok());
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn second_contact_with_different_key_is_rejected() {
        let rng = SystemRandom::new();
        let peer = PeerId::generate(&rng);
        let key_a = SigningKeyMaterial::generate_ephemeral().unwrap();
        let key_b = SigningKeyMaterial::generate_ephemeral().unwrap();
        let payload = b"nonce;from;1;2";

        let cache = PeerKeyCache::new();
        cache.verify(peer, &key_a.verify_key_bytes(), payload, &key_a.sign(payload)).await.unwrap();

        let sig_b = key_b.sign(payload);
        let result = cache.verify(peer, &key_b.verify_key_bytes(), payload, &sig_b).await;
        assert!(matches!(result, Err(AuthError::KeyMismatch)));
    }

    #[tokio::test]
    async fn tampered_signature_under_pinned_key_is_rejected() {
        let rng = SystemRandom::new();
        let peer = PeerId::generate(&rng);
        let key = SigningKeyMaterial::generate_ephemeral().unwrap();
        let sig = key.sign(b"nonce;from;1;2");

        let cache = PeerKeyCache::new();
        let result = cache.verify(peer, &key.verify_key_bytes(), b"nonce;from;1;3", &sig).await;
        assert!(matches!(result, Err(AuthError::BadSignature)));
    }
}
