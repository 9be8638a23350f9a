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

//! Time sources: a wall clock that may jump, and a monotonic clock that cannot.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// A source of wall-clock and monotonic readings, seconds as `f64`.
///
/// Kept behind a trait so tests can substitute a deterministic fake without
/// touching the real system clock.
pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch. May jump forward or backward.
    fn wall_now(&self) -> f64;
    /// Seconds since an arbitrary fixed point. Never decreases.
    fn mono_now(&self) -> f64;
}

/// The real system clock.
pub struct SystemClock {
    anchor: Instant,
}

impl SystemClock {
    /// Capture the monotonic anchor now.
    pub fn new() -> Self {
        Self { anchor: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn wall_now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64()
    }

    fn mono_now(&self) -> f64 {
        self.anchor.elapsed().as_secs_f64()
    }
}
