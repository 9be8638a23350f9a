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

//! Wire-level data model: peer identity, nonces, and REQ/RESP messages.

use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A UDP endpoint identifying a peer by address, not identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerAddress {
    /// Hostname or IP literal.
    pub host: String,
    /// UDP port.
    pub port: u16,
}

/// Error parsing a `host:port` peer address.
#[derive(Debug, Error)]
#[error("invalid peer address")]
pub struct PeerAddressParseError;

impl PeerAddress {
    /// Resolve to a concrete [`SocketAddr`] (takes the first result).
    pub fn to_socket_addr(&self) -> std::io::Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses"))
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for PeerAddress {
    type Err = PeerAddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s.rsplit_once(':').ok_or(PeerAddressParseError)?;
        let port: u16 = port.parse().map_err(|_| PeerAddressParseError)?;
        if host.is_empty() {
            return Err(PeerAddressParseError);
        }
        Ok(PeerAddress { host: host.to_string(), port })
    }
}

fn random_hex16(rng: &SystemRandom) -> [u8; 16] {
    let mut buf = [0u8; 16];
    // SystemRandom::fill only fails on catastrophic OS RNG failure; there is no
    // sane fallback, so treat it as unrecoverable.
    rng.fill(&mut buf).expect("system RNG unavailable");
    buf
}

/// A 128-bit identifier rendered as 32 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(pub [u8; 16]);

/// Error parsing a hex-encoded 128-bit identifier.
#[derive(Debug, Error)]
#[error("malformed hex identifier")]
pub struct HexIdParseError;

impl PeerId {
    /// Generate a fresh random identifier.
    pub fn generate(rng: &SystemRandom) -> Self {
        PeerId(random_hex16(rng))
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self)
    }
}

impl FromStr for PeerId {
    type Err = HexIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| HexIdParseError)?;
        let arr: [u8; 16] = bytes.try_into().map_err(|_| HexIdParseError)?;
        Ok(PeerId(arr))
    }
}

/// A fresh per-probe nonce, 128 bits rendered as 32 hex characters.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Nonce(pub [u8; 16]);

impl Nonce {
    /// Generate a fresh random nonce.
    pub fn generate(rng: &SystemRandom) -> Self {
        Nonce(random_hex16(rng))
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce({})", self)
    }
}

impl FromStr for Nonce {
    type Err = HexIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| HexIdParseError)?;
        let arr: [u8; 16] = bytes.try_into().map_err(|_| HexIdParseError)?;
        Ok(Nonce(arr))
    }
}

/// A probe request.
#[derive(Clone, Debug, PartialEq)]
pub struct ReqMsg {
    /// Probe nonce, echoed back by the responder.
    pub nonce: Option<Nonce>,
    /// Originator identity.
    pub from: Option<PeerId>,
    /// Sender's wall time at send (informational only, see design notes).
    pub ts: f64,
}

/// A probe response.
#[derive(Clone, Debug, PartialEq)]
pub struct RespMsg {
    /// Echoed probe nonce.
    pub nonce: Option<Nonce>,
    /// Responder identity.
    pub from: PeerId,
    /// Responder's wall time at receipt of the REQ.
    pub t1: f64,
    /// Responder's wall time just before sending this RESP.
    pub t2: f64,
    /// Detached signature over the canonical `nonce;from;t1;t2` payload, if signing is enabled.
    pub sig: Option<Vec<u8>>,
    /// Responder's verify key, if signing is enabled.
    pub vk: Option<Vec<u8>>,
}

/// A wire-level message.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    /// Probe request.
    Req(ReqMsg),
    /// Probe response.
    Resp(RespMsg),
}

/// One retained `(theta, delta)` observation for a peer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    /// Estimated offset of the peer's clock relative to ours, seconds.
    pub theta: f64,
    /// Estimated round-trip delay, seconds.
    pub delta: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_address_parses_host_port() {
        let a: PeerAddress = "10.0.0.1:4510".parse().unwrap();
        assert_eq!(a.host, "10.0.0.1");
        assert_eq!(a.port, 4510);
    }

    #[test]
    fn peer_address_rejects_missing_port() {
        assert!("10.0.0.1".parse::<PeerAddress>().is_err());
    }

    #[test]
    fn peer_id_roundtrips_through_hex() {
        let rng = SystemRandom::new();
        let id = PeerId::generate(&rng);
        let s = id.to_string();
        assert_eq!(s.len(), 32);
        let back: PeerId = s.parse().unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn nonces_are_distinct() {
        let rng = SystemRandom::new();
        let a = Nonce::generate(&rng);
        let b = Nonce::generate(&rng);
        assert_ne!(a, b);
    }
}
