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

//! Minimal axum server exposing metrics in the Prometheus text format.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, TextEncoder};
use thiserror::Error;
use tracing::info;

use super::metrics::Metrics;

/// Exporter errors.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The bind address was invalid.
    #[error("invalid metrics bind address: {0}")]
    BadAddr(String),
    /// The server failed while accepting connections.
    #[error("metrics server failed")]
    Serve,
}

async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> String {
    let families = metrics.registry.gather();
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    // TextEncoder only fails on a broken writer; a Vec<u8> never is one.
    encoder.encode(&families, &mut buf).expect("prometheus text encoding");
    String::from_utf8_lossy(&buf).into_owned()
}

/// Serve `/metrics` on `addr` until the process exits.
///
/// Intended to be spawned as a background task; a failure here is logged and
/// does not bring down the sync loop.
pub async fn serve(addr: &str, metrics: Arc<Metrics>) -> Result<(), HttpError> {
    let addr: SocketAddr = addr.parse().map_err(|_| HttpError::BadAddr(addr.to_string()))?;
    let app = Router::new().route("/metrics", get(metrics_handler)).with_state(metrics);

    info!(%addr, "metrics exporter listening");
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|_| HttpError::Serve)?;
    axum::serve(listener, app).await.map_err(|_| HttpError::Serve)
}
