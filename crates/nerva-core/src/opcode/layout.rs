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

//! Bit layout of compound opcodes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Width of the severity field.
pub const SEVERITY_BITS: u32 = 3;
/// Width of the layer field.
pub const LAYER_BITS: u32 = 3;
/// Width of the apparatus field.
pub const APPARATUS_BITS: u32 = 10;
/// Width of the operation field.
pub const OPERATION_BITS: u32 = 16;

/// Offset of the operation field.
pub const OPERATION_SHIFT: u32 = 0;
/// Offset of the apparatus field.
pub const APPARATUS_SHIFT: u32 = OPERATION_SHIFT + OPERATION_BITS;
/// Offset of the layer field.
pub const LAYER_SHIFT: u32 = APPARATUS_SHIFT + APPARATUS_BITS;
/// Offset of the severity field.
pub const SEVERITY_SHIFT: u32 = LAYER_SHIFT + LAYER_BITS;

/// Mask of the severity field, before shifting.
pub const SEVERITY_MASK: u32 = (1 << SEVERITY_BITS) - 1;
/// Mask of the layer field, before shifting.
pub const LAYER_MASK: u32 = (1 << LAYER_BITS) - 1;
/// Mask of the apparatus field, before shifting.
pub const APPARATUS_MASK: u32 = (1 << APPARATUS_BITS) - 1;
/// Mask of the operation field, before shifting.
pub const OPERATION_MASK: u32 = (1 << OPERATION_BITS) - 1;

/// Reserved value of every field meaning "unknown".
pub const UNKNOWN_CODE: u32 = 0;

const _: () = assert!(SEVERITY_SHIFT + SEVERITY_BITS == 32);

/// The four fields of a compound opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpcodeParts {
    /// Severity code (3 bits).
    pub severity: u8,
    /// Layer code (3 bits).
    pub layer: u8,
    /// Apparatus code (10 bits).
    pub apparatus: u16,
    /// Operation code (16 bits).
    pub operation: u16,
}

/// A packed 32-bit opcode: severity | layer | apparatus | operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompoundOpcode(u32);

impl CompoundOpcode {
    /// Packs the four fields. Values wider than their field are truncated to it.
    pub fn pack(severity: u8, layer: u8, apparatus: u16, operation: u16) -> Self {
        let packed = ((severity as u32 & SEVERITY_MASK) << SEVERITY_SHIFT)
            | ((layer as u32 & LAYER_MASK) << LAYER_SHIFT)
            | ((apparatus as u32 & APPARATUS_MASK) << APPARATUS_SHIFT)
            | ((operation as u32 & OPERATION_MASK) << OPERATION_SHIFT);
        Self(packed)
    }

    /// Wraps an already-packed value.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The packed value.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// The packed value reinterpreted as a signed 32-bit integer, for wire
    /// formats that only carry `i32`.
    pub const fn as_i32(self) -> i32 {
        self.0 as i32
    }

    /// Severity field.
    pub fn severity(self) -> u8 {
        ((self.0 >> SEVERITY_SHIFT) & SEVERITY_MASK) as u8
    }

    /// Layer field.
    pub fn layer(self) -> u8 {
        ((self.0 >> LAYER_SHIFT) & LAYER_MASK) as u8
    }

    /// Apparatus field.
    pub fn apparatus(self) -> u16 {
        ((self.0 >> APPARATUS_SHIFT) & APPARATUS_MASK) as u16
    }

    /// Operation field.
    pub fn operation(self) -> u16 {
        ((self.0 >> OPERATION_SHIFT) & OPERATION_MASK) as u16
    }

    /// Splits the opcode back into its fields.
    pub fn unpack(self) -> OpcodeParts {
        OpcodeParts {
            severity: self.severity(),
            layer: self.layer(),
            apparatus: self.apparatus(),
            operation: self.operation(),
        }
    }
}

impl From<i32> for CompoundOpcode {
    fn from(value: i32) -> Self {
        Self(value as u32)
    }
}

impl fmt::Display for CompoundOpcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_offsets_cover_32_bits() {
        assert_eq!(OPERATION_SHIFT, 0);
        assert_eq!(APPARATUS_SHIFT, 16);
        assert_eq!(LAYER_SHIFT, 26);
        assert_eq!(SEVERITY_SHIFT, 29);
    }

    #[test]
    fn test_pack_places_each_field() {
        assert_eq!(CompoundOpcode::pack(0, 0, 0, 0xFFFF).raw(), 0x0000_FFFF);
        assert_eq!(CompoundOpcode::pack(0, 0, 0x3FF, 0).raw(), 0x03FF_0000);
        assert_eq!(CompoundOpcode::pack(0, 7, 0, 0).raw(), 0x1C00_0000);
        assert_eq!(CompoundOpcode::pack(7, 0, 0, 0).raw(), 0xE000_0000);
    }

    #[test]
    fn test_unpack_recovers_fields_at_the_edges() {
        for (severity, layer, apparatus, operation) in [
            (0, 0, 0, 0),
            (7, 7, 1023, 65535),
            (1, 6, 512, 1),
            (5, 0, 1, 40_000),
        ] {
            let code = CompoundOpcode::pack(severity, layer, apparatus, operation);
            assert_eq!(
                code.unpack(),
                OpcodeParts {
                    severity,
                    layer,
                    apparatus,
                    operation
                }
            );
        }
    }

    #[test]
    fn test_oversized_fields_are_truncated() {
        let code = CompoundOpcode::pack(9, 8, 1024, 7);
        assert_eq!(code.severity(), 1);
        assert_eq!(code.layer(), 0);
        assert_eq!(code.apparatus(), 0);
        assert_eq!(code.operation(), 7);
    }

    #[test]
    fn test_signed_view_round_trips() {
        let code = CompoundOpcode::pack(7, 1, 2, 3);
        assert!(code.as_i32() < 0);
        assert_eq!(CompoundOpcode::from(code.as_i32()), code);
        assert_eq!(code.to_string(), "0xE4020003");
    }
}
