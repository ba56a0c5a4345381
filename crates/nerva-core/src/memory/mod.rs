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

//! Explicitly negotiated shared memory for cross-thread signalling.
//!
//! This is the only state shared between the foreground and background
//! contexts. Every access goes through atomic load, store and notify.

mod signal;

pub use self::signal::{SignalSegment, WaitOutcome};

/// Errors raised when a caller requests a capability the platform lacks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    /// The platform cannot share memory between execution contexts.
    #[error("shared memory is not available on this platform")]
    SharedMemoryUnavailable,
    /// A segment of zero slots was requested.
    #[error("a signal segment needs at least one slot")]
    EmptySegment,
}
