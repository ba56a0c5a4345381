// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::control::OperatingMode;
use crate::platform::ResourceSnapshot;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A committed change of operating mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeTransition {
    /// Mode before the change.
    pub from: OperatingMode,
    /// Mode after the change.
    pub to: OperatingMode,
    /// Wall-clock time of the commit, in milliseconds since the Unix epoch.
    pub at_ms: u64,
    /// The snapshot that produced `to`.
    pub snapshot: ResourceSnapshot,
}

/// Destination for forensic records.
pub trait ForensicSink: Send + Sync {
    /// Records a transition. Must not block and must not panic.
    fn record(&self, transition: &ModeTransition);
}

/// Milliseconds since the Unix epoch, or `0` if the clock is before it.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
