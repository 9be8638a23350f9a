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

//! Compact textual wire codec: `key=value` pairs joined by `;`.
//!
//! Encoding always emits fields in canonical order. Decoding tolerates any
//! field order (it simply collects `key=value` pairs) but the signed payload
//! for RESP verification is always rebuilt in canonical order regardless of
//! how the message arrived on the wire.

use std::collections::HashMap;

use thiserror::Error;

use super::types::{Message, Nonce, PeerId, ReqMsg, RespMsg};

/// Decode failure. Never surfaced to callers beyond a debug log (see responder/prober).
#[derive(Debug, Error)]
pub enum CodecError {
    /// The payload was not valid UTF-8 `key=value;...` text.
    #[error("malformed payload")]
    Malformed,
    /// A required field was missing or a value failed to parse.
    #[error("missing or invalid field: {0}")]
    Field(&'static str),
    /// The `type` tag was neither REQ nor RESP.
    #[error("unknown message type")]
    UnknownType,
}

fn parse_fields(s: &str) -> HashMap<&str, &str> {
    let mut out = HashMap::new();
    for part in s.split(';') {
        if part.is_empty() {
            continue;
        }
        if let Some((k, v)) = part.split_once('=') {
            out.insert(k, v);
        }
    }
    out
}

fn parse_f64(fields: &HashMap<&str, &str>, key: &'static str) -> Result<f64, CodecError> {
    fields
        .get(key)
        .ok_or(CodecError::Field(key))?
        .parse::<f64>()
        .map_err(|_| CodecError::Field(key))
}

fn parse_hex_bytes(v: &str) -> Result<Vec<u8>, CodecError> {
    hex::decode(v).map_err(|_| CodecError::Field("hex"))
}

/// Encode a message to its wire representation.
pub fn encode(msg: &Message) -> String {
    match msg {
        Message::Req(req) => {
            let mut out = String::from("type=REQ");
            if let Some(nonce) = &req.nonce {
                out.push_str(&format!(";nonce={nonce}"));
            }
            if let Some(from) = &req.from {
                out.push_str(&format!(";from={from}"));
            }
            out.push_str(&format!(";ts={}", req.ts));
            out
        }
        Message::Resp(resp) => {
            let mut out = String::from("type=RESP");
            if let Some(nonce) = &resp.nonce {
                out.push_str(&format!(";nonce={nonce}"));
            }
            out.push_str(&format!(";from={}", resp.from));
            out.push_str(&format!(";t1={}", resp.t1));
            out.push_str(&format!(";t2={}", resp.t2));
            if let (Some(sig), Some(vk)) = (&resp.sig, &resp.vk) {
                out.push_str(&format!(";sig={}", hex::encode(sig)));
                out.push_str(&format!(";vk={}", hex::encode(vk)));
            }
            out
        }
    }
}

/// Decode a datagram payload into a [`Message`].
pub fn decode(bytes: &[u8]) -> Result<Message, CodecError> {
    let s = std::str::from_utf8(bytes).map_err(|_| CodecError::Malformed)?;
    let fields = parse_fields(s);

    match fields.get("type").copied() {
        Some("REQ") => {
            let nonce = fields.get("nonce").and_then(|v| v.parse::<Nonce>().ok());
            let from = fields.get("from").and_then(|v| v.parse::<PeerId>().ok());
            let ts = parse_f64(&fields, "ts")?;
            Ok(Message::Req(ReqMsg { nonce, from, ts }))
        }
        Some("RESP") => {
            let nonce = fields.get("nonce").and_then(|v| v.parse::<Nonce>().ok());
            let from = fields
                .get("from")
                .ok_or(CodecError::Field("from"))?
                .parse::<PeerId>()
                .map_err(|_| CodecError::Field("from"))?;
            let t1 = parse_f64(&fields, "t1")?;
            let t2 = parse_f64(&fields, "t2")?;
            let sig = match fields.get("sig") {
                Some(v) => Some(parse_hex_bytes(v)?),
                None => None,
            };
            let vk = match fields.get("vk") {
                Some(v) => Some(parse_hex_bytes(v)?),
                None => None,
            };
            Ok(Message::Resp(RespMsg { nonce, from, t1, t2, sig, vk }))
        }
        Some(_) => Err(CodecError::UnknownType),
        None => Err(CodecError::Malformed),
    }
}

/// Build the canonical signed payload: `nonce;from;t1;t2`, no `type`, no `sig`/`vk`.
///
/// This is re-derived on both sides (signer and verifier) from the structured
/// fields rather than taken verbatim off the wire, so field order on the wire
/// never affects verification.
pub fn signed_payload(nonce: Option<Nonce>, from: PeerId, t1: f64, t2: f64) -> Vec<u8> {
    let nonce_str = nonce.map(|n| n.to_string()).unwrap_or_default();
    format!("{nonce_str};{from};{t1};{t2}").into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ring::rand::SystemRandom;

    #[test]
    fn req_roundtrips() {
        let rng = SystemRandom::new();
        let req = ReqMsg {
            nonce: Some(Nonce::generate(&rng)),
            from: Some(PeerId::generate(&rng)),
            ts: 1234.5,
        };
        let wire = encode(&Message::Req(req.clone()));
        let decoded = decode(wire.as_bytes()).unwrap();
        assert_eq!(decoded, Message::Req(req));
    }

    #[test]
    fn resp_roundtrips_with_signature() {
        let rng = SystemRandom::new();
        let resp = RespMsg {
            nonce: Some(Nonce::generate(&rng)),
            from: PeerId::generate(&rng),
            t1: 1.0,
            t2: 2.5,
            sig: Some(vec![0xab, 0xcd]),
            vk: Some(vec![0x01, 0x02, 0x03]),
        };
        let wire = encode(&Message::Resp(resp.clone()));
        let decoded = decode(wire.as_bytes()).unwrap();
        assert_eq!(decoded, Message::Resp(resp));
    }

    #[test]
    fn resp_roundtrips_without_signature() {
        let rng = SystemRandom::new();
        let resp = RespMsg {
            nonce: Some(Nonce::generate(&rng)),
            from: PeerId::generate(&rng),
            t1: 1.0,
            t2: 2.5,
            sig: None,
            vk: None,
        };
        let wire = encode(&Message::Resp(resp.clone()));
        let decoded = decode(wire.as_bytes()).unwrap();
        assert_eq!(decoded, Message::Resp(resp));
    }

    #[test]
    fn decode_rejects_garbage_without_panicking() {
        assert!(decode(b"\xff\xfe not utf8").is_err());
        assert!(decode(b"type=BOGUS;nonce=abc").is_err());
        assert!(decode(b"type=REQ").is_err()); // missing ts
        assert!(decode(b"").is_err());
    }

    #[test]
    fn signed_payload_is_field_order_independent_of_wire_order() {
        let rng = SystemRandom::new();
        let nonce = Nonce::generate(&rng);
        let from = PeerId::generate(&rng);

        let wire_a = format!("type=RESP;nonce={nonce};from={from};t1=1;t2=2");
        let wire_b = format!("type=RESP;t2=2;t1=1;from={from};nonce={nonce}");

        let (Message::Resp(a), Message::Resp(b)) =
            (decode(wire_a.as_bytes()).unwrap(), decode(wire_b.as_bytes()).unwrap())
        else {
            panic!("expected RESP");
        };

        let payload_a = signed_payload(a.nonce, a.from, a.t1, a.t2);
        let payload_b = signed_payload(b.nonce, b.from, b.t1, b.t2);
        assert_eq!(payload_a, payload_b);
    }
}
