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

//! Node lifecycle: binds the UDP socket, answers inbound REQs, and runs the
//! round loop that probes peers, aggregates samples, and updates the offset.

use std::sync::Arc;
use std::time::Duration;

use ring::rand::{SecureRandom, SystemRandom};
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::core::aggregate;
use crate::core::codec;
use crate::core::signing::SigningKeyMaterial;
use crate::core::time::Clock;
use crate::core::types::{Message, PeerAddress, PeerId, Sample};
use crate::monitoring::metrics::Metrics;
use crate::networking::auth::PeerKeyCache;
use crate::networking::pending::PendingTable;
use crate::networking::prober::{probe_peer_best_of, ProbeError};
use crate::networking::responder::Responder;
use crate::networking::transport::{self, MAX_DATAGRAM_SIZE};

/// Node construction/runtime errors.
#[derive(Debug, Error)]
pub enum NodeError {
    /// The UDP socket could not be bound.
    #[error("transport")]
    Transport,
    /// The signing key could not be loaded or generated.
    #[error("signing key")]
    Signing,
}

/// The node's mutable view of its own clock relative to the network.
pub struct NodeState {
    offset: Mutex<f64>,
}

impl Default for NodeState {
    fn default() -> Self {
        Self { offset: Mutex::new(0.0) }
    }
}

impl NodeState {
    /// Current smoothed offset estimate, seconds.
    pub async fn offset(&self) -> f64 {
        *self.offset.lock().await
    }

    async fn set_offset(&self, value: f64) {
        *self.offset.lock().await = value;
    }

    /// The node's best estimate of network time: local wall time plus offset.
    ///
    /// Not guaranteed monotonic — each round's update can move it backward,
    /// by design (see `SPEC_FULL.md`).
    pub async fn network_now(&self, clock: &dyn Clock) -> f64 {
        clock.wall_now() + self.offset().await
    }
}

/// A running clock-sync node: owns the socket and drives both the responder
/// and the prober sides of the protocol.
pub struct Node {
    id: PeerId,
    socket: Arc<UdpSocket>,
    clock: Arc<dyn Clock>,
    settings: Settings,
    pending: Arc<PendingTable>,
    auth: Arc<PeerKeyCache>,
    responder: Responder,
    state: Arc<NodeState>,
    metrics: Arc<Metrics>,
}

impl Node {
    /// Bind the UDP socket and assemble a node ready to [`Node::run`].
    pub async fn bind(
        settings: Settings,
        metrics: Arc<Metrics>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, NodeError> {
        let socket = transport::bind(&settings.host, settings.port)
            .await
            .map_err(|_| NodeError::Transport)?;

        let rng = SystemRandom::new();
        let id = PeerId::generate(&rng);

        let signing = if settings.signing_enabled {
            let key = match &settings.signing_key_path {
                Some(path) => SigningKeyMaterial::load_or_create(path),
                None => SigningKeyMaterial::generate_ephemeral(),
            }
            .map_err(|_| NodeError::Signing)?;
            Some(Arc::new(key))
        } else {
            None
        };

        metrics.peers_configured.set(settings.peers.len() as i64);

        let responder = Responder::new(id, clock.clone(), signing);

        Ok(Self {
            id,
            socket: Arc::new(socket),
            clock,
            settings,
            pending: Arc::new(PendingTable::new()),
            auth: Arc::new(PeerKeyCache::new()),
            responder,
            state: Arc::new(NodeState::default()),
            metrics,
        })
    }

    /// This node's randomly generated identity.
    pub fn id(&self) -> PeerId {
        self.id
    }

    /// Shared handle to the offset/`network_now` view.
    pub fn state(&self) -> Arc<NodeState> {
        self.state.clone()
    }

    /// Run the recv loop and round loop until `shutdown` reports `true`.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let recv_handle = {
            let node = self.clone();
            let mut shutdown = shutdown.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = node.recv_loop() => {}
                    _ = shutdown.changed() => {}
                }
            })
        };

        loop {
            if *shutdown.borrow() {
                break;
            }
            self.round().await;
            self.metrics.rounds_total.inc();

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs_f64(self.settings.round_interval_secs)) => {}
                _ = shutdown.changed() => {}
            }
        }

        recv_handle.abort();
    }

    async fn recv_loop(&self) {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            let (n, from) = match self.socket.recv_from(&mut buf).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "recv_from failed");
                    continue;
                }
            };

            match codec::decode(&buf[..n]) {
                Ok(Message::Req(req)) => {
                    self.metrics.responder_requests_total.inc();
                    let resp = self.responder.handle(&req);
                    let wire = codec::encode(&resp);
                    if let Err(e) = self.socket.send_to(wire.as_bytes(), from).await {
                        warn!(error = %e, peer = %from, "failed to send RESP");
                    }
                }
                Ok(Message::Resp(resp)) => {
                    if let Some(nonce) = resp.nonce {
                        self.pending.complete(&nonce, resp).await;
                    } else {
                        debug!(peer = %from, "dropping RESP without a nonce");
                    }
                }
                Err(e) => {
                    debug!(peer = %from, error = %e, "dropping malformed datagram");
                }
            }
        }
    }

    async fn round(&self) {
        if self.settings.peers.is_empty() {
            return;
        }

        let rng = SystemRandom::new();
        let chosen = choose_peers(&self.settings.peers, self.settings.per_round_peer_count, &rng);

        let probes = chosen.into_iter().map(|peer| {
            let socket = self.socket.clone();
            let clock = self.clock.clone();
            let pending = self.pending.clone();
            let auth = self.auth.clone();
            let own_id = self.id;
            let require_signed = self.settings.signing_enabled;
            let samples_per_peer = self.settings.samples_per_peer;
            let timeout = Duration::from_secs_f64(self.settings.request_timeout_secs);
            async move {
                let addr = match peer.to_socket_addr() {
                    Ok(a) => a,
                    Err(_) => return (None, Vec::new()),
                };
                let (best, _attempted, errors) = probe_peer_best_of(
                    &socket,
                    addr,
                    own_id,
                    clock.as_ref(),
                    &pending,
                    Some(&auth),
                    require_signed,
                    samples_per_peer,
                    timeout,
                )
                .await;
                (best, errors)
            }
        });

        let results: Vec<(Option<Sample>, Vec<ProbeError>)> = futures::future::join_all(probes).await;
        let mut samples: Vec<Sample> = Vec::with_capacity(results.len());
        for (sample, errors) in results {
            if let Some(s) = sample {
                samples.push(s);
            }
            for e in errors {
                match e {
                    ProbeError::Timeout => self.metrics.probe_timeouts_total.inc(),
                    ProbeError::AuthFailure => self.metrics.probe_auth_failures_total.inc(),
                    ProbeError::ClockJump => self.metrics.probe_clock_jumps_total.inc(),
                    ProbeError::NegativeDelay => self.metrics.probe_negative_delay_total.inc(),
                    ProbeError::Send | ProbeError::NoncePending => {}
                }
            }
        }
        self.metrics.samples_collected_total.inc_by(samples.len() as u64);

        if let Some((theta_star, accepted)) =
            aggregate::aggregate_round(&samples, self.settings.min_samples_for_update, self.settings.trim_ratio)
        {
            let old = self.state.offset().await;
            let new = aggregate::ema_update(old, theta_star, self.settings.ema_alpha);
            self.state.set_offset(new).await;
            self.metrics.round_updates_total.inc();
            self.metrics.samples_accepted_total.inc_by(accepted as u64);
            self.metrics.offset_seconds.set(new);
            info!(round.peers = self.settings.peers.len(), round.samples = samples.len(), round.accepted = accepted, round.offset = new, "round updated offset");
        } else {
            debug!(round.samples = samples.len(), "round produced no update");
        }
    }
}

/// Pick up to `k` distinct peers from `peers` uniformly at random via a
/// partial Fisher-Yates shuffle, drawing indices with rejection sampling so
/// no index is favored by modulo bias.
fn choose_peers(peers: &[PeerAddress], k: usize, rng: &SystemRandom) -> Vec<PeerAddress> {
    let n = peers.len();
    let k = k.min(n);
    let mut pool: Vec<PeerAddress> = peers.to_vec();

    for i in 0..k {
        let j = i + uniform_below(rng, (n - i) as u32) as usize;
        pool.swap(i, j);
    }

    pool.truncate(k);
    pool
}

/// Uniform random integer in `[0, bound)` via rejection sampling over `u32`.
fn uniform_below(rng: &SystemRandom, bound: u32) -> u32 {
    if bound == 0 {
        return 0;
    }
    let limit = u32::MAX - (u32::MAX % bound);
    loop {
        let mut buf = [0u8; 4];
        rng.fill(&mut buf).expect("system RNG unavailable");
        let candidate = u32::from_le_bytes(buf);
        if candidate < limit {
            return candidate % bound;
        }
    }
}
