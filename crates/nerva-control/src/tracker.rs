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

//! Debounced mode tracking.
//!
//! Sensors can flicker (a network class bouncing between `3g` and `4g`, a
//! visibility toggle during an app switch). The tracker merges every reading
//! into its snapshot immediately but only commits a new mode once the
//! readings have been quiet for the debounce window, or once the burst has
//! lasted [`MAX_WAIT_FACTOR`] windows.
//!
//! Time is passed in explicitly so the state machine can be tested without
//! sleeping.

use crate::analysis::classify;
use nerva_core::{OperatingMode, ResourceSnapshot, SensorReading};
use std::time::{Duration, Instant};

/// A burst of readings cannot delay a commit longer than this many windows.
pub const MAX_WAIT_FACTOR: u32 = 4;

/// A committed change of mode.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeChange {
    /// Mode before the change.
    pub from: OperatingMode,
    /// Mode after the change.
    pub to: OperatingMode,
    /// The snapshot that was classified.
    pub snapshot: ResourceSnapshot,
}

/// Debouncing state machine over a [`ResourceSnapshot`].
#[derive(Debug, Clone)]
pub struct ModeTracker {
    snapshot: ResourceSnapshot,
    committed: OperatingMode,
    window: Duration,
    burst_started: Option<Instant>,
    last_reading: Option<Instant>,
}

impl ModeTracker {
    /// Starts from an empty snapshot and the mode it classifies to.
    pub fn new(window: Duration) -> Self {
        let snapshot = ResourceSnapshot::default();
        Self {
            committed: classify(&snapshot),
            snapshot,
            window,
            burst_started: None,
            last_reading: None,
        }
    }

    /// Merges a reading received at `now`.
    pub fn ingest(&mut self, reading: &SensorReading, now: Instant) {
        self.snapshot.apply(reading);
        self.burst_started.get_or_insert(now);
        self.last_reading = Some(now);
    }

    /// When the pending readings should be evaluated, if any are pending.
    pub fn deadline(&self) -> Option<Instant> {
        let quiet = self.last_reading? + self.window;
        let capped = self.burst_started? + self.window * MAX_WAIT_FACTOR;
        Some(quiet.min(capped))
    }

    /// Evaluates pending readings if their deadline has passed.
    ///
    /// Returns a [`ModeChange`] only when the classified mode differs from
    /// the committed one.
    pub fn poll(&mut self, now: Instant) -> Option<ModeChange> {
        if now < self.deadline()? {
            return None;
        }
        self.burst_started = None;
        self.last_reading = None;

        let mode = classify(&self.snapshot);
        if mode == self.committed {
            return None;
        }
        let from = std::mem::replace(&mut self.committed, mode);
        Some(ModeChange {
            from,
            to: mode,
            snapshot: self.snapshot.clone(),
        })
    }

    /// The last committed mode.
    pub fn current(&self) -> OperatingMode {
        self.committed
    }

    /// The merged snapshot, including readings not yet committed.
    pub fn snapshot(&self) -> &ResourceSnapshot {
        &self.snapshot
    }
}
