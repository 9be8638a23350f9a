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

//! Configuration: defaults → optional TOML file → CLI overlay → validated [`Settings`].

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::PeerAddress;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {0}")]
    Read(String),
    /// The config file was not valid TOML.
    #[error("failed to parse config file {0}")]
    Parse(String),
    /// A peer entry was not a valid `host:port`.
    #[error("invalid --peer value: {0}")]
    BadPeer(String),
    /// `port` was not set by either the config file or `--port`.
    #[error("missing required port (set --port or config.node.port)")]
    MissingPort,
    /// `ema_alpha` was outside `(0, 1]`.
    #[error("ema_alpha must be in (0, 1], got {0}")]
    BadEmaAlpha(f64),
    /// `trim_ratio` was outside `[0, 0.5)`.
    #[error("trim_ratio must be in [0, 0.5), got {0}")]
    BadTrimRatio(f64),
    /// `port` was `0`.
    #[error("port must be nonzero")]
    BadPort,
    /// No peers were configured, by file or by `--peer`.
    #[error("at least one peer must be configured")]
    NoPeers,
}

/// Command-line surface (see SPEC_FULL.md §10.2).
#[derive(Parser, Debug, Clone)]
#[command(name = "clocksyncd", about = "Peer-to-peer clock synchronization daemon")]
pub struct Cli {
    /// Optional TOML configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Bind host.
    #[arg(long)]
    pub host: Option<String>,

    /// Bind port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Static peer, `host:port`. May be repeated.
    #[arg(long = "peer", value_name = "HOST:PORT")]
    pub peers: Vec<String>,

    /// Max probes per peer per round.
    #[arg(long)]
    pub samples_per_peer: Option<usize>,

    /// Max peers probed per round.
    #[arg(long)]
    pub per_round_peer_count: Option<usize>,

    /// Per-probe await timeout, seconds.
    #[arg(long)]
    pub request_timeout_secs: Option<f64>,

    /// Inter-round sleep, seconds.
    #[arg(long)]
    pub round_interval_secs: Option<f64>,

    /// EMA weight on the new estimate, in `(0, 1]`.
    #[arg(long)]
    pub ema_alpha: Option<f64>,

    /// Fraction trimmed from each end before taking the median.
    #[arg(long)]
    pub trim_ratio: Option<f64>,

    /// Minimum surviving samples required to update the offset.
    #[arg(long)]
    pub min_samples_for_update: Option<usize>,

    /// Sign responses with an Ed25519 key.
    #[arg(long)]
    pub enable_signing: bool,

    /// Path to the signing key (PKCS#8); created if missing.
    #[arg(long)]
    pub signing_key_path: Option<PathBuf>,

    /// Bind address for the Prometheus `/metrics` HTTP exporter. Empty disables it.
    #[arg(long, env = "CLOCKSYNC_METRICS_ADDR", default_value = "127.0.0.1:9464")]
    pub metrics_addr: String,

    /// Log output format.
    #[arg(long, value_enum, default_value = "compact")]
    pub log_format: LogFormat,
}

/// Log rendering mode.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable single-line format.
    Compact,
    /// Newline-delimited JSON.
    Json,
}

/// All-optional mirror of [`Settings`], deserialized from the TOML config file.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RawSettings {
    /// Bind host.
    pub host: Option<String>,
    /// Bind port.
    pub port: Option<u16>,
    /// Static peer list.
    #[serde(default)]
    pub peers: Vec<String>,
    /// Max probes per peer per round.
    pub samples_per_peer: Option<usize>,
    /// Max peers probed per round.
    pub per_round_peer_count: Option<usize>,
    /// Per-probe await timeout, seconds.
    pub request_timeout_secs: Option<f64>,
    /// Inter-round sleep, seconds.
    pub round_interval_secs: Option<f64>,
    /// EMA weight on the new estimate.
    pub ema_alpha: Option<f64>,
    /// Fraction trimmed from each end before taking the median.
    pub trim_ratio: Option<f64>,
    /// Minimum surviving samples required to update the offset.
    pub min_samples_for_update: Option<usize>,
}

impl RawSettings {
    /// Load from a TOML file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::Read(path.display().to_string()))?;
        toml::from_str(&raw).map_err(|_| ConfigError::Parse(path.display().to_string()))
    }
}

/// Fully validated, merged node configuration.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Static peer list (immutable for the lifetime of the node).
    pub peers: Vec<PeerAddress>,
    /// Max probes per peer per round.
    pub samples_per_peer: usize,
    /// Max peers probed per round.
    pub per_round_peer_count: usize,
    /// Per-probe await timeout, seconds.
    pub request_timeout_secs: f64,
    /// Inter-round sleep, seconds.
    pub round_interval_secs: f64,
    /// EMA weight on the new estimate.
    pub ema_alpha: f64,
    /// Fraction trimmed from each end before taking the median.
    pub trim_ratio: f64,
    /// Minimum surviving samples required to update the offset.
    pub min_samples_for_update: usize,
    /// Whether responses are signed.
    pub signing_enabled: bool,
    /// Path to the signing key, if any was given.
    pub signing_key_path: Option<PathBuf>,
    /// Prometheus exporter bind address, if enabled.
    pub metrics_addr: Option<String>,
    /// Log rendering mode.
    pub log_format: LogFormat,
}

impl Settings {
    fn defaults() -> RawSettings {
        RawSettings {
            host: Some("0.0.0.0".to_string()),
            port: None,
            peers: Vec::new(),
            samples_per_peer: Some(3),
            per_round_peer_count: Some(20),
            request_timeout_secs: Some(5.0),
            round_interval_secs: Some(60.0),
            ema_alpha: Some(0.3),
            trim_ratio: Some(0.15),
            min_samples_for_update: Some(5),
        }
    }

    /// Merge defaults, an optional config file, and CLI flags; then validate.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let mut merged = Self::defaults();

        if let Some(path) = &cli.config {
            let file = RawSettings::from_file(path)?;
            merge_raw(&mut merged, file);
        }

        merge_raw(
            &mut merged,
            RawSettings {
                host: cli.host.clone(),
                port: cli.port,
                peers: cli.peers.clone(),
                samples_per_peer: cli.samples_per_peer,
                per_round_peer_count: cli.per_round_peer_count,
                request_timeout_secs: cli.request_timeout_secs,
                round_interval_secs: cli.round_interval_secs,
                ema_alpha: cli.ema_alpha,
                trim_ratio: cli.trim_ratio,
                min_samples_for_update: cli.min_samples_for_update,
            },
        );

        let port = merged.port.ok_or(ConfigError::MissingPort)?;
        if port == 0 {
            return Err(ConfigError::BadPort);
        }
        let ema_alpha = merged.ema_alpha.unwrap_or(0.3);
        if !(ema_alpha > 0.0 && ema_alpha <= 1.0) {
            return Err(ConfigError::BadEmaAlpha(ema_alpha));
        }
        let trim_ratio = merged.trim_ratio.unwrap_or(0.15);
        if !(0.0..0.5).contains(&trim_ratio) {
            return Err(ConfigError::BadTrimRatio(trim_ratio));
        }

        let mut peers = Vec::with_capacity(merged.peers.len());
        for p in &merged.peers {
            peers.push(p.parse::<PeerAddress>().map_err(|_| ConfigError::BadPeer(p.clone()))?);
        }
        peers.sort_by(|a, b| (a.host.as_str(), a.port).cmp(&(b.host.as_str(), b.port)));
        peers.dedup();
        if peers.is_empty() {
            return Err(ConfigError::NoPeers);
        }

        Ok(Settings {
            host: merged.host.unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            peers,
            samples_per_peer: merged.samples_per_peer.unwrap_or(3),
            per_round_peer_count: merged.per_round_peer_count.unwrap_or(20),
            request_timeout_secs: merged.request_timeout_secs.unwrap_or(5.0),
            round_interval_secs: merged.round_interval_secs.unwrap_or(60.0),
            ema_alpha,
            trim_ratio,
            min_samples_for_update: merged.min_samples_for_update.unwrap_or(5),
            signing_enabled: cli.enable_signing,
            signing_key_path: cli.signing_key_path.clone(),
            metrics_addr: Some(cli.metrics_addr.clone()).filter(|s| !s.is_empty()),
            log_format: cli.log_format,
        })
    }
}

/// Overlay non-`None`/non-empty fields of `overlay` onto `base`.
fn merge_raw(base: &mut RawSettings, overlay: RawSettings) {
    if overlay.host.is_some() {
        base.host = overlay.host;
    }
    if overlay.port.is_some() {
        base.port = overlay.port;
    }
    if !overlay.peers.is_empty() {
        base.peers.extend(overlay.peers);
    }
    if overlay.samples_per_peer.is_some() {
        base.samples_per_peer = overlay.samples_per_peer;
    }
    if overlay.per_round_peer_count.is_some() {
        base.per_round_peer_count = overlay.per_round_peer_count;
    }
    if overlay.request_timeout_secs.is_some() {
        base.request_timeout_secs = overlay.request_timeout_secs;
    }
    if overlay.round_interval_secs.is_some() {
        base.round_interval_secs = overlay.round_interval_secs;
    }
    if overlay.ema_alpha.is_some() {
        base.ema_alpha = overlay.ema_alpha;
    }
    if overlay.trim_ratio.is_some() {
        base.trim_ratio = overlay.trim_ratio;
    }
    if overlay.min_samples_for_update.is_some() {
        base.min_samples_for_update = overlay.min_samples_for_update;
    }
}
