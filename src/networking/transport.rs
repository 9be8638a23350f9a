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

//! UDP socket setup.

use thiserror::Error;
use tokio::net::UdpSocket;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The socket could not be bound.
    #[error("failed to bind UDP socket")]
    Bind,
}

/// Bind a UDP socket on `host:port`.
pub async fn bind(host: &str, port: u16) -> Result<UdpSocket, TransportError> {
    let addr = format!("{host}:{port}");
    UdpSocket::bind(&addr).await.map_err(|_| TransportError::Bind)
}

/// Datagrams larger than this are rejected before decoding; the wire codec
/// never produces payloads anywhere close to this size.
pub const MAX_DATAGRAM_SIZE: usize = 2048;
