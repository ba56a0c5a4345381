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

//! Admission-control contracts shared by the governor and its consumers.
//!
//! The permit rule lives here as a pure function so that the governor's
//! oracle and every component gating non-essential work agree on it.

pub mod mode;
pub mod tier;

pub use self::mode::OperatingMode;
pub use self::tier::{InvalidTier, PriorityTier};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A request for permission to perform work at a given tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PermitRequest {
    /// The tier of the work.
    pub tier: PriorityTier,
    /// Advisory cost estimate supplied by the caller. Carried for diagnostics;
    /// the tier alone decides the permit.
    pub estimated_complexity: f32,
}

impl PermitRequest {
    /// Creates a request for `tier` with no complexity estimate.
    pub fn new(tier: PriorityTier) -> Self {
        Self {
            tier,
            estimated_complexity: 0.0,
        }
    }

    /// Attaches a complexity estimate to the request.
    pub fn with_complexity(mut self, estimated_complexity: f32) -> Self {
        self.estimated_complexity = estimated_complexity;
        self
    }
}

/// Returns `true` if work at `tier` may run under `mode`.
///
/// | Tier | Granted under |
/// |---|---|
/// | 0, 1 | every mode |
/// | 2 | every mode except `Emergency` |
/// | 3 | `Peak` and `Balanced` only |
pub fn permits(mode: OperatingMode, tier: PriorityTier) -> bool {
    match tier {
        PriorityTier::VITAL | PriorityTier::OPERATIONAL => true,
        PriorityTier::RESILIENT => mode != OperatingMode::Emergency,
        _ => matches!(mode, OperatingMode::Peak | OperatingMode::Balanced),
    }
}

/// Read side of the governor: the current mode and the permit oracle.
///
/// Implementations must be synchronous, side-effect free and cheap enough to
/// call at any frequency.
pub trait ModeOracle: Send + Sync {
    /// Returns the last computed mode.
    fn current_mode(&self) -> OperatingMode;

    /// Decides whether the requested work may run now.
    fn consult_permit(&self, request: PermitRequest) -> bool {
        permits(self.current_mode(), request.tier)
    }
}

/// Lock-free, shareable cell holding the current mode.
///
/// The governor is the only writer; clones handed to other components are
/// read through [`ModeOracle`]. Every write bumps a generation counter stored
/// alongside the mode, so readers can order the values they observe.
#[derive(Debug, Clone)]
pub struct ModeCell {
    // generation << 8 | mode bits
    state: Arc<AtomicU64>,
}

impl ModeCell {
    /// Creates a cell holding `mode` at generation `0`.
    pub fn new(mode: OperatingMode) -> Self {
        Self {
            state: Arc::new(AtomicU64::new(u64::from(mode.to_bits()))),
        }
    }

    /// Reads the stored mode.
    pub fn get(&self) -> OperatingMode {
        self.versioned().1
    }

    /// Reads the generation and the mode in one atomic load.
    pub fn versioned(&self) -> (u64, OperatingMode) {
        let state = self.state.load(Ordering::Acquire);
        (state >> 8, OperatingMode::from_bits(state as u8))
    }

    /// Stores `mode` under a new generation, returning the previous mode.
    pub fn set(&self, mode: OperatingMode) -> OperatingMode {
        let bump = |state: u64| Some((((state >> 8) + 1) << 8) | u64::from(mode.to_bits()));
        let previous = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, bump)
            .unwrap_or_else(|state| state);
        OperatingMode::from_bits(previous as u8)
    }
}

impl Default for ModeCell {
    fn default() -> Self {
        Self::new(OperatingMode::default())
    }
}

impl ModeOracle for ModeCell {
    fn current_mode(&self) -> OperatingMode {
        self.get()
    }
}
