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

//! End-to-end scenarios over real loopback UDP sockets: a node probing a
//! handful of synthetic peers that answer (or don't) according to the
//! scenario under test.

use std::sync::Arc;
use std::time::Duration;

use ring::rand::SystemRandom;
use tokio::net::UdpSocket;

use clocksync::core::codec;
use clocksync::core::signing::SigningKeyMaterial;
use clocksync::core::time::SystemClock;
use clocksync::core::types::{Message, PeerId, RespMsg};
use clocksync::networking::auth::PeerKeyCache;
use clocksync::networking::pending::PendingTable;
use clocksync::networking::prober::probe_peer_best_of;

/// Spawn a synthetic peer that answers every REQ it sees with a fixed
/// `(t1, t2)` pair, optionally signed, until the returned handle is dropped.
async fn spawn_fixed_responder(
    t1: f64,
    t2: f64,
    signing: Option<Arc<SigningKeyMaterial>>,
) -> (std::net::SocketAddr, PeerId, tokio::task::JoinHandle<()>) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let rng = SystemRandom::new();
    let id = PeerId::generate(&rng);

    let handle = tokio::spawn(async move {
        let mut buf = [0u8; 2048];
        loop {
            let (n, from) = match socket.recv_from(&mut buf).await {
                Ok(v) => v,
                Err(_) => return,
            };
            let Ok(Message::Req(req)) = codec::decode(&buf[..n]) else { continue };

            let (sig, vk) = match &signing {
                Some(key) => {
                    let payload = codec::signed_payload(req.nonce, id, t1, t2);
                    (Some(key.sign(&payload)), Some(key.verify_key_bytes().to_vec()))
                }
                None => (None, None),
            };
            let resp = Message::Resp(RespMsg { nonce: req.nonce, from: id, t1, t2, sig, vk });
            let wire = codec::encode(&resp);
            let _ = socket.send_to(wire.as_bytes(), from).await;
        }
    });

    (addr, id, handle)
}

/// A peer that never answers, to exercise timeout handling.
async fn spawn_silent_peer() -> std::net::SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    // Leak the socket for the test's lifetime so the port stays bound and
    // connection-refused ICMP doesn't short-circuit the timeout.
    std::mem::forget(socket);
    addr
}

#[tokio::test]
async fn s1_single_peer_perfect_link_recovers_offset() {
    let clock = SystemClock::new();
    let rng = SystemRandom::new();
    let own_id = PeerId::generate(&rng);

    let t0 = clock.wall_now();
    let (addr, _id, _handle) = spawn_fixed_responder(t0 + 10.0, t0 + 10.0, None).await;

    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let pending = PendingTable::new();

    let (sample, _attempted, _errors) = probe_peer_best_of(
        &socket,
        addr,
        own_id,
        &clock,
        &pending,
        None,
        false,
        1,
        Duration::from_secs(2),
    )
    .await;

    let sample = sample.expect("expected a sample");
    assert!((sample.theta - 10.0).abs() < 0.5, "theta = {}", sample.theta);
}

#[tokio::test]
async fn s5_timeout_resilience_only_counts_responding_peers() {
    let clock = SystemClock::new();
    let rng = SystemRandom::new();
    let own_id = PeerId::generate(&rng);

    let t0 = clock.wall_now();
    let mut responders = Vec::new();
    for _ in 0..5 {
        responders.push(spawn_fixed_responder(t0 + 2.0, t0 + 2.0, None).await);
    }
    let mut silent = Vec::new();
    for _ in 0..5 {
        silent.push(spawn_silent_peer().await);
    }

    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let pending = Arc::new(PendingTable::new());

    let mut samples = Vec::new();
    for (addr, _, _) in &responders {
        let (sample, _, _) = probe_peer_best_of(
            &socket,
            *addr,
            own_id,
            &clock,
            &pending,
            None,
            false,
            1,
            Duration::from_millis(500),
        )
        .await;
        samples.push(sample.expect("responding peer should produce a sample"));
    }

    for addr in &silent {
        let (sample, _, errors) = probe_peer_best_of(
            &socket,
            *addr,
            own_id,
            &clock,
            &pending,
            None,
            false,
            1,
            Duration::from_millis(300),
        )
        .await;
        assert!(sample.is_none());
        assert!(!errors.is_empty());
    }

    let mut offset = 0.0_f64;
    for s in &samples {
        offset = clocksync::core::aggregate::ema_update(offset, s.theta, 0.3);
    }
    // Five consistent theta=2.0 samples folded one at a time through the same
    // EMA used by Node::round; matches the spec's single-round worked example.
    assert!((offset - 0.6).abs() < 0.05, "offset = {offset}");
}

#[tokio::test]
async fn s6_tampered_signature_is_rejected_by_auth_cache() {
    let clock = SystemClock::new();
    let rng = SystemRandom::new();
    let own_id = PeerId::generate(&rng);
    let key = Arc::new(SigningKeyMaterial::generate_ephemeral().unwrap());

    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let peer_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let peer_addr = peer_socket.local_addr().unwrap();
    let peer_id = PeerId::generate(&rng);

    // A responder that signs a payload for different timestamps than the
    // ones it reports, simulating a bit-flipped payload in transit.
    let signing_key = key.clone();
    tokio::spawn(async move {
        let mut buf = [0u8; 2048];
        let (n, from) = peer_socket.recv_from(&mut buf).await.unwrap();
        let Message::Req(req) = codec::decode(&buf[..n]).unwrap() else { panic!() };
        let t1 = 1.0;
        let t2 = 2.0;
        let payload = codec::signed_payload(req.nonce, peer_id, t1, 999.0); // tampered
        let sig = signing_key.sign(&payload);
        let resp = Message::Resp(RespMsg {
            nonce: req.nonce,
            from: peer_id,
            t1,
            t2,
            sig: Some(sig),
            vk: Some(signing_key.verify_key_bytes().to_vec()),
        });
        let wire = codec::encode(&resp);
        let _ = peer_socket.send_to(wire.as_bytes(), from).await;
    });

    let pending = PendingTable::new();
    let auth = PeerKeyCache::new();

    let (sample, _attempted, errors) = probe_peer_best_of(
        &socket,
        peer_addr,
        own_id,
        &clock,
        &pending,
        Some(&auth),
        true,
        1,
        Duration::from_secs(2),
    )
    .await;

    assert!(sample.is_none());
    assert!(!errors.is_empty());
}
