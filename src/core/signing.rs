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

//! Ed25519 detached signatures over the canonical RESP payload (see [`super::codec`]).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::fs;
use std::io::Write;
use std::path::Path;

use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair, UnparsedPublicKey, ED25519};
use thiserror::Error;
use zeroize::Zeroize;

/// Signing/verification errors.
#[derive(Debug, Error)]
pub enum SigningError {
    /// Key material could not be read, parsed, or written.
    #[error("key material")]
    Key,
    /// Signature failed to verify.
    #[error("bad signature")]
    BadSignature,
}

/// A node's own signing key material: keypair plus its raw 32-byte verify key.
pub struct SigningKeyMaterial {
    keypair: Ed25519KeyPair,
    verify_key: [u8; 32],
}

impl SigningKeyMaterial {
    /// Load a PKCS#8-encoded key from `path`, or generate and persist a fresh one.
    ///
    /// The key is written with an atomic write-then-rename, matching the
    /// durability pattern used elsewhere for small sensitive files; unlike a
    /// long-lived validator key this implementation does not encrypt it at
    /// rest (see `DESIGN.md`).
    pub fn load_or_create(path: &Path) -> Result<Self, SigningError> {
        if path.exists() {
            let mut bytes = fs::read(path).map_err(|_| SigningError::Key)?;
            let result = Self::from_pkcs8(&bytes);
            bytes.zeroize();
            return result;
        }

        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).map_err(|_| SigningError::Key)?;
        atomic_write(path, pkcs8.as_ref())?;
        Self::from_pkcs8(pkcs8.as_ref())
    }

    /// Generate a fresh, unpersisted key (useful for tests and ephemeral nodes).
    pub fn generate_ephemeral() -> Result<Self, SigningError> {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).map_err(|_| SigningError::Key)?;
        Self::from_pkcs8(pkcs8.as_ref())
    }

    fn from_pkcs8(bytes: &[u8]) -> Result<Self, SigningError> {
        let keypair = Ed25519KeyPair::from_pkcs8(bytes).map_err(|_| SigningError::Key)?;
        let mut verify_key = [0u8; 32];
        verify_key.copy_from_slice(keypair.public_key().as_ref());
        Ok(Self { keypair, verify_key })
    }

    /// Raw 32-byte Ed25519 verify key.
    pub fn verify_key_bytes(&self) -> [u8; 32] {
        self.verify_key
    }

    /// Sign `payload`, returning the 64-byte detached signature.
    pub fn sign(&self, payload: &[u8]) -> Vec<u8> {
        self.keypair.sign(payload).as_ref().to_vec()
    }
}

fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), SigningError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|_| SigningError::Key)?;
    }
    let mut tmp = path.to_path_buf();
    tmp.set_extension("tmp");
    {
        let mut f = fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&tmp)
            .map_err(|_| SigningError::Key)?;
        f.write_all(bytes).map_err(|_| SigningError::Key)?;
        let _ = f.sync_all();
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600));
    }
    fs::rename(&tmp, path).map_err(|_| SigningError::Key)
}

/// Verify `sig` over `payload` under the raw 32-byte verify key `vk`.
///
/// Fails if `vk` is not a valid curve point or `sig` does not verify.
pub fn verify(vk: &[u8], payload: &[u8], sig: &[u8]) -> Result<(), SigningError> {
    let key = UnparsedPublicKey::new(&ED25519, vk);
    key.verify(payload, sig).map_err(|_| SigningError::BadSignature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_succeeds() {
        let key = SigningKeyMaterial::generate_ephemeral().unwrap();
        let payload = b"nonce;from;1;2";
        let sig = key.sign(payload);
        assert!(verify(&key.verify_key_bytes(), payload, &sig).is_ok());
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let key = SigningKeyMaterial::generate_ephemeral().unwrap();
        let sig = key.sign(b"nonce;from;1;2");
        assert!(verify(&key.verify_key_bytes(), b"nonce;from;1;3", &sig).is_err());
    }

    #[test]
    fn load_or_create_persists_and_reloads_identical_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signing.key");

        let first = SigningKeyMaterial::load_or_create(&path).unwrap();
        let second = SigningKeyMaterial::load_or_create(&path).unwrap();
        assert_eq!(first.verify_key_bytes(), second.verify_key_bytes());
    }
}
