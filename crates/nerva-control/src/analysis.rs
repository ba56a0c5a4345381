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

//! Classification of a resource snapshot into an operating mode.
//!
//! Rules are evaluated top to bottom and the first match wins:
//!
//! 1. Page hidden: `Hibernate`.
//! 2. Battery known, below 15% and discharging: `Emergency`.
//! 3. Data saver, a 2G-class network, or battery below 30% and discharging: `Eco`.
//! 4. Charging on a 4G network: `Peak`.
//! 5. Otherwise: `Balanced`.
//!
//! Unknown fields never trigger a restrictive rule.

use nerva_core::platform::NetworkClass;
use nerva_core::{OperatingMode, ResourceSnapshot};

/// Battery level under which a discharging device enters `Emergency`.
pub const EMERGENCY_BATTERY_THRESHOLD: f32 = 0.15;
/// Battery level under which a discharging device enters `Eco`.
pub const ECO_BATTERY_THRESHOLD: f32 = 0.30;

/// Maps a snapshot to its operating mode. Pure and deterministic.
pub fn classify(snapshot: &ResourceSnapshot) -> OperatingMode {
    if !snapshot.is_visible() {
        return OperatingMode::Hibernate;
    }

    if snapshot.battery_below(EMERGENCY_BATTERY_THRESHOLD) {
        return OperatingMode::Emergency;
    }

    let constrained_network = snapshot
        .network_class
        .is_some_and(NetworkClass::is_constrained);
    if snapshot.save_data.unwrap_or(false)
        || constrained_network
        || snapshot.battery_below(ECO_BATTERY_THRESHOLD)
    {
        return OperatingMode::Eco;
    }

    if snapshot.is_charging() && snapshot.network_class == Some(NetworkClass::FourG) {
        return OperatingMode::Peak;
    }

    OperatingMode::Balanced
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> ResourceSnapshot {
        ResourceSnapshot {
            visible: Some(true),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_snapshot_is_balanced() {
        assert_eq!(classify(&ResourceSnapshot::default()), OperatingMode::Balanced);
    }

    #[test]
    fn test_hidden_page_short_circuits() {
        let s = ResourceSnapshot {
            visible: Some(false),
            battery_level: Some(0.05),
            is_charging: Some(false),
            ..Default::default()
        };
        assert_eq!(classify(&s), OperatingMode::Hibernate);
    }

    #[test]
    fn test_low_battery_discharging_is_emergency() {
        let s = ResourceSnapshot {
            battery_level: Some(0.10),
            is_charging: Some(false),
            ..snapshot()
        };
        assert_eq!(classify(&s), OperatingMode::Emergency);
    }

    #[test]
    fn test_low_battery_while_charging_is_not_restricted() {
        let s = ResourceSnapshot {
            battery_level: Some(0.10),
            is_charging: Some(true),
            network_class: Some(NetworkClass::FourG),
            ..snapshot()
        };
        assert_eq!(classify(&s), OperatingMode::Peak);
    }

    #[test]
    fn test_eco_triggers() {
        let save_data = ResourceSnapshot {
            save_data: Some(true),
            ..snapshot()
        };
        let slow = ResourceSnapshot {
            network_class: Some(NetworkClass::Slow2g),
            ..snapshot()
        };
        let two_g = ResourceSnapshot {
            network_class: Some(NetworkClass::TwoG),
            is_charging: Some(true),
            ..snapshot()
        };
        let draining = ResourceSnapshot {
            battery_level: Some(0.25),
            is_charging: Some(false),
            ..snapshot()
        };
        for s in [save_data, slow, two_g, draining] {
            assert_eq!(classify(&s), OperatingMode::Eco, "{s:?}");
        }
    }

    #[test]
    fn test_charging_on_4g_is_peak() {
        let s = ResourceSnapshot {
            is_charging: Some(true),
            network_class: Some(NetworkClass::FourG),
            ..snapshot()
        };
        assert_eq!(classify(&s), OperatingMode::Peak);
    }

    #[test]
    fn test_charging_on_3g_is_balanced() {
        let s = ResourceSnapshot {
            is_charging: Some(true),
            network_class: Some(NetworkClass::ThreeG),
            ..snapshot()
        };
        assert_eq!(classify(&s), OperatingMode::Balanced);
    }

    #[test]
    fn test_threshold_boundaries() {
        let at_emergency = ResourceSnapshot {
            battery_level: Some(EMERGENCY_BATTERY_THRESHOLD),
            is_charging: Some(false),
            ..snapshot()
        };
        assert_eq!(classify(&at_emergency), OperatingMode::Eco);

        let at_eco = ResourceSnapshot {
            battery_level: Some(ECO_BATTERY_THRESHOLD),
            is_charging: Some(false),
            ..snapshot()
        };
        assert_eq!(classify(&at_eco), OperatingMode::Balanced);
    }

    #[test]
    fn test_device_hints_do_not_influence_mode() {
        let s = ResourceSnapshot {
            device_memory_gb: Some(0.5),
            hardware_concurrency: Some(1),
            ..snapshot()
        };
        assert_eq!(classify(&s), OperatingMode::Balanced);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let s = ResourceSnapshot {
            battery_level: Some(0.2),
            is_charging: Some(false),
            network_class: Some(NetworkClass::FourG),
            ..snapshot()
        };
        let first = classify(&s);
        for _ in 0..100 {
            assert_eq!(classify(&s), first);
        }
    }
}
