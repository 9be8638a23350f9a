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

//! Prometheus metrics for the clock sync daemon.

use prometheus::{Gauge, IntCounter, IntGauge, Registry};
use thiserror::Error;

/// Metrics errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A metric failed to construct or register (e.g. name collision).
    #[error("prometheus registration failed")]
    Prom,
}

/// All process metrics, registered against a private [`Registry`].
#[derive(Clone)]
pub struct Metrics {
    /// Registry the HTTP exporter serves.
    pub registry: Registry,

    /// Sync rounds completed, whether or not they produced an update.
    pub rounds_total: IntCounter,
    /// Rounds in which the offset was actually updated.
    pub round_updates_total: IntCounter,
    /// Raw samples collected across all probes.
    pub samples_collected_total: IntCounter,
    /// Samples that survived the delay filter and trim into the final median.
    pub samples_accepted_total: IntCounter,
    /// Probes that never received a RESP before their timeout.
    pub probe_timeouts_total: IntCounter,
    /// RESPs rejected by signature or TOFU key-mismatch.
    pub probe_auth_failures_total: IntCounter,
    /// Probes aborted because the local clock jumped mid-flight.
    pub probe_clock_jumps_total: IntCounter,
    /// RESPs discarded for an implied negative round-trip delay.
    pub probe_negative_delay_total: IntCounter,
    /// Current smoothed offset estimate, seconds.
    pub offset_seconds: Gauge,
    /// Number of statically configured peers.
    pub peers_configured: IntGauge,
    /// REQs this node has answered as a responder.
    pub responder_requests_total: IntCounter,
}

impl Metrics {
    /// Construct and register the full metric set.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let rounds_total =
            IntCounter::new("clocksync_rounds_total", "Sync rounds completed")
                .map_err(|_| MetricsError::Prom)?;
        let round_updates_total = IntCounter::new(
            "clocksync_round_updates_total",
            "Rounds in which the offset was updated",
        )
        .map_err(|_| MetricsError::Prom)?;
        let samples_collected_total = IntCounter::new(
            "clocksync_samples_collected_total",
            "Raw samples collected across all probes",
        )
        .map_err(|_| MetricsError::Prom)?;
        let samples_accepted_total = IntCounter::new(
            "clocksync_samples_accepted_total",
            "Samples surviving the delay filter and trim",
        )
        .map_err(|_| MetricsError::Prom)?;
        let probe_timeouts_total = IntCounter::new(
            "clocksync_probe_timeouts_total",
            "Probes that never received a RESP in time",
        )
        .map_err(|_| MetricsError::Prom)?;
        let probe_auth_failures_total = IntCounter::new(
            "clocksync_probe_auth_failures_total",
            "RESPs rejected by signature or TOFU key mismatch",
        )
        .map_err(|_| MetricsError::Prom)?;
        let probe_clock_jumps_total = IntCounter::new(
            "clocksync_probe_clock_jumps_total",
            "Probes aborted by a local clock jump",
        )
        .map_err(|_| MetricsError::Prom)?;
        let probe_negative_delay_total = IntCounter::new(
            "clocksync_probe_negative_delay_total",
            "RESPs discarded for an implied negative delay",
        )
        .map_err(|_| MetricsError::Prom)?;
        let offset_seconds = Gauge::new("clocksync_offset_seconds", "Current smoothed offset")
            .map_err(|_| MetricsError::Prom)?;
        let peers_configured =
            IntGauge::new("clocksync_peers_configured", "Statically configured peer count")
                .map_err(|_| MetricsError::Prom)?;
        let responder_requests_total = IntCounter::new(
            "clocksync_responder_requests_total",
            "REQs answered as a responder",
        )
        .map_err(|_| MetricsError::Prom)?;

        registry.register(Box::new(rounds_total.clone())).map_err(|_| MetricsError::Prom)?;
        registry.register(Box::new(round_updates_total.clone())).map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(samples_collected_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(samples_accepted_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry.register(Box::new(probe_timeouts_total.clone())).map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(probe_auth_failures_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(probe_clock_jumps_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(probe_negative_delay_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry.register(Box::new(offset_seconds.clone())).map_err(|_| MetricsError::Prom)?;
        registry.register(Box::new(peers_configured.clone())).map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(responder_requests_total.clone()))
            .map_err(|_| MetricsError::Prom)?;

        Ok(Self {
            registry,
            rounds_total,
            round_updates_total,
            samples_collected_total,
            samples_accepted_total,
            probe_timeouts_total,
            probe_auth_failures_total,
            probe_clock_jumps_total,
            probe_negative_delay_total,
            offset_seconds,
            peers_configured,
            responder_requests_total,
        })
    }
}
