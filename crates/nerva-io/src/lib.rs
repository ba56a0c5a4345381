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

//! # Nerva IO
//!
//! The backpressure membrane and everything it needs to move data off the
//! device: bounded per-tier queues, the adaptive transport that picks a
//! delivery variant per item, and the background refinement worker.

#![warn(missing_docs)]

pub mod membrane;
pub mod payload;
pub mod refine;
pub mod transport;

pub use membrane::{
    DrainOptions, DrainReport, EnqueueOutcome, ItemId, Membrane, MembraneConfig, MembraneItem,
    MembraneStats, RejectReason, TierOutcome, MIN_DRAIN_INTERVAL,
};
pub use payload::{Payload, SharedView};
pub use refine::RefineClient;
pub use transport::{AdaptiveTransport, DeliveryRoute, EndpointMap};
