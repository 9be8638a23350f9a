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

//! Generate (or load) a node signing key and print its verify key as hex.

use std::path::PathBuf;

use anyhow::Result;
use clocksync::core::signing::SigningKeyMaterial;

fn main() -> Result<()> {
    let out_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("clocksync.key"));

    let key = SigningKeyMaterial::load_or_create(&out_path)
        .map_err(|_| anyhow::anyhow!("failed to load or create signing key at {}", out_path.display()))?;

    println!("{}", hex::encode(key.verify_key_bytes()));
    Ok(())
}
