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

//! REQ handling: answer every well-formed REQ with a RESP carrying `t1`/`t2`,
//! signed when the node has signing enabled.

use std::sync::Arc;

use crate::core::codec;
use crate::core::signing::SigningKeyMaterial;
use crate::core::time::Clock;
use crate::core::types::{Message, PeerId, ReqMsg, RespMsg};

/// Builds RESP messages on behalf of this node's own identity.
pub struct Responder {
    id: PeerId,
    clock: Arc<dyn Clock>,
    signing: Option<Arc<SigningKeyMaterial>>,
}

impl Responder {
    /// A responder signing with `signing` if given, otherwise emitting bare RESPs.
    pub fn new(id: PeerId, clock: Arc<dyn Clock>, signing: Option<Arc<SigningKeyMaterial>>) -> Self {
        Self { id, clock, signing }
    }

    /// Build the RESP for an inbound `req`, stamping `t1` now and `t2` just
    /// before return so the wire reflects actual receipt/send times.
    pub fn handle(&self, req: &ReqMsg) -> Message {
        let t1 = self.clock.wall_now();
        let t2 = self.clock.wall_now();

        let (sig, vk) = match &self.signing {
            Some(key) => {
                let payload = codec::signed_payload(req.nonce, self.id, t1, t2);
                (Some(key.sign(&payload)), Some(key.verify_key_bytes().to_vec()))
            }
            None => (None, None),
        };

        Message::Resp(RespMsg { nonce: req.nonce, from: self.id, t1, t2, sig, vk })
    }
}
