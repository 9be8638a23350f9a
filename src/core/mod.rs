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

//! Core protocol primitives: time sources, wire types, codec, signing, and
//! the numerical aggregation pipeline. No networking or tokio here.

/// Trimmed-median / delay-filter / EMA aggregation pipeline.
pub mod aggregate;
/// Wire codec (encode/decode, canonical signed payload).
pub mod codec;
/// Ed25519 signing and verification.
pub mod signing;
/// Wall-clock and monotonic time sources.
pub mod time;
/// Peer/probe identifiers and message types.
pub mod types;
