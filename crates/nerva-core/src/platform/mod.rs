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

//! Provides abstractions over the host platform's resource signals.
//!
//! This module contains the resource snapshot the governor classifies, the
//! readings sensors emit to build it, and the capability flags describing
//! what the execution environment supports.

pub mod sensor;

pub use sensor::{SensorError, SensorReading, SensorSink, SensorSource};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Effective network class reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkClass {
    /// Very slow 2G.
    #[serde(rename = "slow-2g")]
    Slow2g,
    /// 2G.
    #[serde(rename = "2g")]
    TwoG,
    /// 3G.
    #[serde(rename = "3g")]
    ThreeG,
    /// 4G or better.
    #[serde(rename = "4g")]
    FourG,
}

impl NetworkClass {
    /// Returns `true` for the classes that force the device into `Eco`.
    pub fn is_constrained(self) -> bool {
        matches!(self, NetworkClass::Slow2g | NetworkClass::TwoG)
    }

    /// The class name as reported by browsers and mobile hosts.
    pub fn as_str(self) -> &'static str {
        match self {
            NetworkClass::Slow2g => "slow-2g",
            NetworkClass::TwoG => "2g",
            NetworkClass::ThreeG => "3g",
            NetworkClass::FourG => "4g",
        }
    }
}

impl FromStr for NetworkClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "slow-2g" => Ok(NetworkClass::Slow2g),
            "2g" => Ok(NetworkClass::TwoG),
            "3g" => Ok(NetworkClass::ThreeG),
            "4g" => Ok(NetworkClass::FourG),
            other => Err(format!("unknown network class `{other}`")),
        }
    }
}

impl fmt::Display for NetworkClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Merged view of the latest value reported by each sensor.
///
/// Every field is optional: a sensor that is unsupported or has not reported
/// yet leaves its fields unset, and classification treats unset fields as the
/// non-restrictive case.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    /// Battery charge in `0.0..=1.0`.
    pub battery_level: Option<f32>,
    /// Whether the device is charging.
    pub is_charging: Option<bool>,
    /// Effective network class.
    pub network_class: Option<NetworkClass>,
    /// Whether the user enabled a data-saver preference.
    pub save_data: Option<bool>,
    /// Whether the page is visible.
    pub visible: Option<bool>,
    /// Device memory hint, in gigabytes.
    pub device_memory_gb: Option<f32>,
    /// Logical processor count hint.
    pub hardware_concurrency: Option<u32>,
}

impl ResourceSnapshot {
    /// Merges `reading` into the snapshot. Only the fields owned by the
    /// reading's sensor are touched.
    pub fn apply(&mut self, reading: &SensorReading) {
        match *reading {
            SensorReading::Battery { level, charging } => {
                self.battery_level = level.is_finite().then(|| level.clamp(0.0, 1.0));
                self.is_charging = Some(charging);
            }
            SensorReading::Network { class, save_data } => {
                self.network_class = class;
                self.save_data = Some(save_data);
            }
            SensorReading::Visibility { visible } => {
                self.visible = Some(visible);
            }
            SensorReading::Device {
                memory_gb,
                concurrency,
            } => {
                self.device_memory_gb = memory_gb;
                self.hardware_concurrency = concurrency;
            }
        }
    }

    /// Returns `true` unless the page is known to be hidden.
    pub fn is_visible(&self) -> bool {
        self.visible.unwrap_or(true)
    }

    /// Returns `true` only if the device is known to be charging.
    pub fn is_charging(&self) -> bool {
        self.is_charging.unwrap_or(false)
    }

    /// Returns `true` if the battery is known, below `threshold` and discharging.
    pub fn battery_below(&self, threshold: f32) -> bool {
        matches!(self.battery_level, Some(level) if level < threshold) && !self.is_charging()
    }
}

/// Capabilities of the execution environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformCapabilities {
    /// A shared-memory segment with atomic wait/notify can be negotiated.
    pub shared_memory: bool,
    /// A fire-and-forget delivery primitive is available.
    pub beacon: bool,
}

impl PlatformCapabilities {
    /// Capabilities of a native process: everything is available.
    pub fn native() -> Self {
        Self {
            shared_memory: true,
            beacon: true,
        }
    }

    /// A locked-down environment with no optional capability.
    pub fn restricted() -> Self {
        Self {
            shared_memory: false,
            beacon: false,
        }
    }
}

impl Default for PlatformCapabilities {
    fn default() -> Self {
        Self::native()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_reading_touches_only_its_fields() {
        let mut snapshot = ResourceSnapshot::default();
        snapshot.apply(&SensorReading::Battery {
            level: 0.42,
            charging: false,
        });
        snapshot.apply(&SensorReading::Visibility { visible: true });

        assert_eq!(snapshot.battery_level, Some(0.42));
        assert_eq!(snapshot.is_charging, Some(false));
        assert_eq!(snapshot.visible, Some(true));
        assert_eq!(snapshot.network_class, None);
        assert_eq!(snapshot.save_data, None);
    }

    #[test]
    fn test_battery_level_is_clamped_and_nan_dropped() {
        let mut snapshot = ResourceSnapshot::default();
        snapshot.apply(&SensorReading::Battery {
            level: 1.7,
            charging: true,
        });
        assert_eq!(snapshot.battery_level, Some(1.0));

        snapshot.apply(&SensorReading::Battery {
            level: f32::NAN,
            charging: true,
        });
        assert_eq!(snapshot.battery_level, None);
    }

    #[test]
    fn test_missing_fields_are_non_restrictive() {
        let snapshot = ResourceSnapshot::default();
        assert!(snapshot.is_visible());
        assert!(!snapshot.battery_below(0.15));
    }

    #[test]
    fn test_network_class_parsing() {
        assert_eq!("slow-2g".parse::<NetworkClass>(), Ok(NetworkClass::Slow2g));
        assert_eq!(" 4G ".parse::<NetworkClass>(), Ok(NetworkClass::FourG));
        assert!("5g".parse::<NetworkClass>().is_err());
        assert!(NetworkClass::TwoG.is_constrained());
        assert!(!NetworkClass::ThreeG.is_constrained());
    }
}
