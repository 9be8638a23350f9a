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

//! clocksync - a peer-to-peer clock synchronization daemon.
//!
//! This crate provides:
//! - An NTP-style four-timestamp offset/delay estimator
//! - A compact textual REQ/RESP wire protocol over UDP
//! - Optional Ed25519 response signing with trust-on-first-use peer keys
//! - Delay-based outlier filtering, trimmed-median aggregation, and EMA smoothing
//! - Prometheus metrics and structured logging

/// Configuration: defaults, TOML file, CLI overlay, validation.
pub mod config;
/// Core protocol primitives (time, wire types, codec, signing, aggregation).
pub mod core;
/// Observability (metrics, HTTP exporter).
pub mod monitoring;
/// Node lifecycle: round scheduler, offset state, socket I/O.
pub mod node;
/// UDP transport, the REQ/RESP protocol, and peer authentication.
pub mod networking;
