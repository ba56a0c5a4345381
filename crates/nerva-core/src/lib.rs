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

//! # Nerva Core
//!
//! Foundational crate containing the types, contracts and stateless services
//! shared by every part of the runtime: operating modes and priority tiers,
//! resource snapshots and sensor contracts, the opcode registry, the message
//! bus, the shared signal segment and the transport contract.

#![warn(missing_docs)]

pub mod control;
pub mod event;
pub mod memory;
pub mod opcode;
pub mod platform;
pub mod telemetry;
pub mod transport;

pub use control::{permits, ModeCell, ModeOracle, OperatingMode, PermitRequest, PriorityTier};
pub use opcode::{CompoundOpcode, Dialect, OpcodeRegistry, Severity};
pub use platform::{PlatformCapabilities, ResourceSnapshot, SensorReading};
