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

//! Priority tiers attached to every message and queued item.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error returned when a raw value does not name a priority tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("priority tier {0} is outside 0..=3")]
pub struct InvalidTier(pub u8);

/// Quality-of-service tier, `0` (most important) to `3` (least important).
///
/// The tier is validated once when it is constructed and never changes
/// afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PriorityTier(u8);

impl PriorityTier {
    /// Must never be delayed or dropped.
    pub const VITAL: Self = Self(0);
    /// Core functional flows.
    pub const OPERATIONAL: Self = Self(1);
    /// State synchronization, safe to defer.
    pub const RESILIENT: Self = Self(2);
    /// Behavioral telemetry, safe to drop.
    pub const BEHAVIORAL: Self = Self(3);

    /// Number of tiers.
    pub const COUNT: usize = 4;

    /// All tiers in drain order.
    pub const ALL: [PriorityTier; Self::COUNT] = [
        Self::VITAL,
        Self::OPERATIONAL,
        Self::RESILIENT,
        Self::BEHAVIORAL,
    ];

    /// Returns the tier for `value`, or `None` if it is out of range.
    pub fn new(value: u8) -> Option<Self> {
        ((value as usize) < Self::COUNT).then_some(Self(value))
    }

    /// Raw tier value.
    pub fn value(self) -> u8 {
        self.0
    }

    /// Index of the tier, usable for per-tier arrays.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Human-readable tier name.
    pub fn label(self) -> &'static str {
        match self.0 {
            0 => "VITAL",
            1 => "OPERATIONAL",
            2 => "RESILIENT",
            _ => "BEHAVIORAL",
        }
    }
}

impl TryFrom<u8> for PriorityTier {
    type Error = InvalidTier;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(InvalidTier(value))
    }
}

impl From<PriorityTier> for u8 {
    fn from(tier: PriorityTier) -> Self {
        tier.0
    }
}

impl fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.label(), self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_validation() {
        assert_eq!(PriorityTier::new(0), Some(PriorityTier::VITAL));
        assert_eq!(PriorityTier::new(3), Some(PriorityTier::BEHAVIORAL));
        assert_eq!(PriorityTier::new(4), None);
        assert_eq!(PriorityTier::try_from(9), Err(InvalidTier(9)));
    }

    #[test]
    fn test_tier_deserialization_rejects_out_of_range() {
        let tier: PriorityTier = serde_json::from_str("2").unwrap();
        assert_eq!(tier, PriorityTier::RESILIENT);
        assert!(serde_json::from_str::<PriorityTier>("7").is_err());
    }

    #[test]
    fn test_lower_value_means_more_important() {
        assert!(PriorityTier::VITAL < PriorityTier::BEHAVIORAL);
        assert_eq!(PriorityTier::ALL.map(|t| t.index()), [0, 1, 2, 3]);
    }
}
