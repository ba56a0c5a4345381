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

//! Compression of semantic identifiers into compact integer codes.
//!
//! High-frequency telemetry cannot afford to serialize long string
//! identifiers. Callers register *dialects* (an apparatus and its
//! operations) once at bootstrap, seal the registry, and from then on every
//! message carries a 32-bit [`CompoundOpcode`]:
//!
//! ```text
//!  31    29 28   26 25          16 15                           0
//! +--------+-------+--------------+------------------------------+
//! |severity| layer |  apparatus   |          operation           |
//! +--------+-------+--------------+------------------------------+
//! ```
//!
//! Reverse lookups stay available for diagnostics. Unknown identifiers
//! resolve to sentinels instead of failing, so a misconfigured dialect never
//! breaks the telemetry path.

mod layout;
mod registry;
mod severity;

pub use self::layout::{
    CompoundOpcode, OpcodeParts, APPARATUS_BITS, APPARATUS_MASK, APPARATUS_SHIFT, LAYER_BITS,
    LAYER_MASK, LAYER_SHIFT, OPERATION_BITS, OPERATION_MASK, OPERATION_SHIFT, SEVERITY_BITS,
    SEVERITY_MASK, SEVERITY_SHIFT, UNKNOWN_CODE,
};
pub use self::registry::{
    Dialect, DialectError, OpcodeRegistry, StaticDialect, UNKNOWN_APPARATUS, UNKNOWN_OPERATION,
};
pub use self::severity::Severity;
