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

//! Device-wide operating modes.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Device-wide classification of available resources.
///
/// Exactly one mode is active at any instant. It is always derived from the
/// latest resource snapshot and never set directly by callers.
///
/// Modes are ordered by richness of available resources:
/// `Peak > Balanced > Eco > Hibernate > Emergency`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperatingMode {
    /// Charging on a fast network: everything may run.
    Peak,
    /// Nominal conditions.
    #[default]
    Balanced,
    /// Constrained network, data saver or low battery.
    Eco,
    /// The page is not visible.
    Hibernate,
    /// Critically low battery while discharging. Overrides every other mode
    /// except `Hibernate`.
    Emergency,
}

impl OperatingMode {
    /// All modes, richest first.
    pub const ALL: [OperatingMode; 5] = [
        OperatingMode::Peak,
        OperatingMode::Balanced,
        OperatingMode::Eco,
        OperatingMode::Hibernate,
        OperatingMode::Emergency,
    ];

    /// Rank of the mode by available resources (higher is richer).
    pub fn richness(self) -> u8 {
        match self {
            OperatingMode::Peak => 4,
            OperatingMode::Balanced => 3,
            OperatingMode::Eco => 2,
            OperatingMode::Hibernate => 1,
            OperatingMode::Emergency => 0,
        }
    }

    /// Stable upper-case name used in logs and forensic records.
    pub fn name(self) -> &'static str {
        match self {
            OperatingMode::Peak => "PEAK",
            OperatingMode::Balanced => "BALANCED",
            OperatingMode::Eco => "ECO",
            OperatingMode::Hibernate => "HIBERNATE",
            OperatingMode::Emergency => "EMERGENCY",
        }
    }

    /// Compact representation used for lock-free storage.
    pub(crate) fn to_bits(self) -> u8 {
        self.richness()
    }

    pub(crate) fn from_bits(bits: u8) -> Self {
        match bits {
            4 => OperatingMode::Peak,
            3 => OperatingMode::Balanced,
            2 => OperatingMode::Eco,
            1 => OperatingMode::Hibernate,
            _ => OperatingMode::Emergency,
        }
    }
}

impl PartialOrd for OperatingMode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OperatingMode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.richness().cmp(&other.richness())
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
