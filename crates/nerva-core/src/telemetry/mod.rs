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

//! Contracts for forensic records.
//!
//! The governor emits a [`ModeTransition`] for every committed mode change
//! and hands it to a [`ForensicSink`]. `nerva-telemetry` provides the
//! bounded in-memory journal; hosts may plug in their own persistence.

mod forensics;

pub use self::forensics::{unix_millis, ForensicSink, ModeTransition};
