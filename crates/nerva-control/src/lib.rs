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

//! # Nerva Control
//!
//! The resource governor: turns raw sensor readings into the system-wide
//! [`OperatingMode`](nerva_core::OperatingMode) and answers permit requests.
//!
//! - [`analysis`] holds the deterministic classification rules.
//! - [`tracker`] debounces sensor flicker before a mode is committed.
//! - [`observers`] fans committed modes out to interested components.
//! - [`service`] runs all of it on a background thread.

#![warn(missing_docs)]

pub mod analysis;
pub mod observers;
pub mod service;
pub mod tracker;

pub use analysis::classify;
pub use observers::{ObserverHandle, ObserverSet};
pub use service::{GovernorConfig, ResourceGovernor};
pub use tracker::{ModeChange, ModeTracker};
