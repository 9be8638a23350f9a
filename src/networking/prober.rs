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

//! Per-peer probing: send a REQ, await the matching RESP, turn the four
//! timestamps into a [`Sample`], and keep the best (minimum-delay) of up to
//! `samples_per_peer` attempts.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ring::rand::SystemRandom;
use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::debug;

use crate::core::codec;
use crate::core::time::Clock;
use crate::core::types::{Message, Nonce, PeerId, ReqMsg, Sample};
use crate::networking::auth::PeerKeyCache;
use crate::networking::pending::PendingTable;

/// A local wall-clock jump larger than this during a single round trip
/// invalidates the sample rather than silently corrupting the estimate.
const CLOCK_JUMP_THRESHOLD_SECS: f64 = 0.5;

/// Why a single probe attempt produced no usable sample.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Sending the REQ failed at the socket layer.
    #[error("send failed")]
    Send,
    /// No RESP arrived before the timeout.
    #[error("timed out waiting for response")]
    Timeout,
    /// The peer's own registration collided with an in-flight nonce.
    #[error("nonce already pending")]
    NoncePending,
    /// The local wall clock jumped during the round trip.
    #[error("local clock jumped mid-probe")]
    ClockJump,
    /// The four-timestamp formula implied a negative round-trip delay.
    #[error("negative delay")]
    NegativeDelay,
    /// Signature verification or TOFU key pinning failed.
    #[error("authentication failed")]
    AuthFailure,
}

/// One probe attempt: send REQ, await RESP, validate, compute the sample.
#[allow(clippy::too_many_arguments)]
pub async fn probe_once(
    socket: &UdpSocket,
    peer_addr: SocketAddr,
    own_id: PeerId,
    clock: &dyn Clock,
    pending: &PendingTable,
    auth: Option<&PeerKeyCache>,
    require_signed: bool,
    timeout: Duration,
) -> Result<Sample, ProbeError> {
    let rng = SystemRandom::new();
    let nonce = Nonce::generate(&rng);

    let t0_wall = clock.wall_now();
    let t0_mono = clock.mono_now();

    let rx = pending.register(nonce).await.map_err(|_| ProbeError::NoncePending)?;

    let req = Message::Req(ReqMsg { nonce: Some(nonce), from: Some(own_id), ts: t0_wall });
    let wire = codec::encode(&req);
    if socket.send_to(wire.as_bytes(), peer_addr).await.is_err() {
        pending.cancel(&nonce).await;
        return Err(ProbeError::Send);
    }

    let resp = match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(resp)) => resp,
        Ok(Err(_)) | Err(_) => {
            pending.cancel(&nonce).await;
            return Err(ProbeError::Timeout);
        }
    };

    let t3_wall = clock.wall_now();
    let t3_mono = clock.mono_now();

    let wall_elapsed = t3_wall - t0_wall;
    let mono_elapsed = t3_mono - t0_mono;
    if (wall_elapsed - mono_elapsed).abs() > CLOCK_JUMP_THRESHOLD_SECS {
        return Err(ProbeError::ClockJump);
    }

    match (&resp.sig, &resp.vk) {
        (Some(sig), Some(vk)) => {
            if let Some(cache) = auth {
                let payload = codec::signed_payload(resp.nonce, resp.from, resp.t1, resp.t2);
                cache
                    .verify(resp.from, vk, &payload, sig)
                    .await
                    .map_err(|_| ProbeError::AuthFailure)?;
            }
        }
        _ if require_signed => return Err(ProbeError::AuthFailure),
        _ => {}
    }

    let (theta, delta) =
        crate::core::aggregate::four_timestamp(t0_wall, resp.t1, resp.t2, t3_wall);
    if delta < 0.0 {
        return Err(ProbeError::NegativeDelay);
    }

    Ok(Sample { theta, delta })
}

/// Probe `peer_addr` up to `samples_per_peer` times, keeping the minimum-delay
/// sample. Returns `None` if every attempt failed.
#[allow(clippy::too_many_arguments)]
pub async fn probe_peer_best_of(
    socket: &UdpSocket,
    peer_addr: SocketAddr,
    own_id: PeerId,
    clock: &dyn Clock,
    pending: &PendingTable,
    auth: Option<&PeerKeyCache>,
    require_signed: bool,
    samples_per_peer: usize,
    timeout: Duration,
) -> (Option<Sample>, usize, Vec<ProbeError>) {
    let mut best: Option<Sample> = None;
    let mut attempted = 0usize;
    let mut errors = Vec::new();

    for _ in 0..samples_per_peer {
        attempted += 1;
        match probe_once(socket, peer_addr, own_id, clock, pending, auth, require_signed, timeout)
            .await
        {
            Ok(sample) => {
                best = Some(match best {
                    Some(current) if current.delta <= sample.delta => current,
                    _ => sample,
                });
            }
            Err(e) => {
                debug!(peer = %peer_addr, error = %e, "probe attempt failed");
                errors.push(e);
            }
        }
    }

    (best, attempted, errors)
}
